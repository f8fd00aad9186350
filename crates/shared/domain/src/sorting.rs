//! Sort expressions accepted by list endpoints.
//!
//! A sort expression has the form `field:order`, e.g. `created_at:desc`.
//! Fields are normalised to lowercase, orders to uppercase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::SORT_SEPARATOR;
use crate::error::{DomainError, DomainResult};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum SortingOrder {
    Asc,
    Desc,
}

impl SortingOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortingOrder::Asc => "ASC",
            SortingOrder::Desc => "DESC",
        }
    }

    /// True for ascending order.
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortingOrder::Asc)
    }
}

impl FromStr for SortingOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(SortingOrder::Asc),
            "DESC" => Ok(SortingOrder::Desc),
            _ => Err(DomainError::parse("sorting order", s)),
        }
    }
}

impl fmt::Display for SortingOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `field:order` sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sorting {
    pub field: String,
    pub order: SortingOrder,
}

impl FromStr for Sorting {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        let (field, order) = s
            .split_once(SORT_SEPARATOR)
            .ok_or_else(|| DomainError::parse("sorting", s))?;

        Ok(Self {
            field: field.to_lowercase(),
            order: order.parse()?,
        })
    }
}

impl fmt::Display for Sorting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, SORT_SEPARATOR, self.order)
    }
}

impl Serialize for Sorting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Sorting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered list of sort expressions where every field appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SortingSequence(Vec<Sorting>);

impl SortingSequence {
    /// Build a sequence, rejecting repeated fields.
    pub fn new(items: Vec<Sorting>) -> DomainResult<Self> {
        let mut seen: Vec<&str> = Vec::new();
        let mut duplicates: Vec<&str> = Vec::new();

        for item in &items {
            let field = item.field.as_str();
            if seen.contains(&field) {
                if !duplicates.contains(&field) {
                    duplicates.push(field);
                }
            } else {
                seen.push(field);
            }
        }

        if !duplicates.is_empty() {
            return Err(DomainError::validation(format!(
                "found duplicate sort fields: {}",
                duplicates.join(", ")
            )));
        }

        Ok(Self(items))
    }

    /// Parse a comma separated list such as `name:asc,created_at:desc`.
    pub fn parse_list(raw: &str) -> DomainResult<Self> {
        let items = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<DomainResult<Vec<Sorting>>>()?;
        Self::new(items)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sorting> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Sorting> {
        self.0
    }
}

impl<'de> Deserialize<'de> for SortingSequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<Sorting>::deserialize(deserializer)?;
        SortingSequence::new(items).map_err(serde::de::Error::custom)
    }
}
