//! Direct value codec between typed values and DynamoDB attributes.
//!
//! DynamoDB has no native date, time or float-preserving types, so those are
//! stored as single-key maps:
//!
//! | value    | attribute                         |
//! |----------|-----------------------------------|
//! | datetime | `{"datetime": "2024-01-01T00:00:00+00:00"}` |
//! | date     | `{"date": "2024-01-01"}`          |
//! | time     | `{"time": "10:30:00"}`            |
//! | float    | `{"float": 1.5}`                  |
//!
//! Everything else maps onto S, N, BOOL, NULL, L and M.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as JsonValue};

const DATETIME_KEY: &str = "datetime";
const DATE_KEY: &str = "date";
const TIME_KEY: &str = "time";
const FLOAT_KEY: &str = "float";

/// A stored item: attribute name to value.
pub type DirectItem = BTreeMap<String, DirectValue>;

/// Raw DynamoDB item as sent and received by the SDK.
pub type AttributeMap = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    List(Vec<DirectValue>),
    Map(DirectItem),
}

impl DirectValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DirectValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DirectValue::Null)
    }

    /// Encode into a DynamoDB attribute.
    pub fn to_attribute(&self) -> AttributeValue {
        match self {
            DirectValue::Null => AttributeValue::Null(true),
            DirectValue::Bool(b) => AttributeValue::Bool(*b),
            DirectValue::Int(n) => AttributeValue::N(n.to_string()),
            DirectValue::Float(f) => wrapped(FLOAT_KEY, AttributeValue::N(f.to_string())),
            DirectValue::String(s) => AttributeValue::S(s.clone()),
            DirectValue::DateTime(dt) => wrapped(
                DATETIME_KEY,
                AttributeValue::S(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            ),
            DirectValue::Date(d) => wrapped(DATE_KEY, AttributeValue::S(d.to_string())),
            DirectValue::Time(t) => wrapped(TIME_KEY, AttributeValue::S(t.to_string())),
            DirectValue::List(items) => {
                AttributeValue::L(items.iter().map(DirectValue::to_attribute).collect())
            }
            DirectValue::Map(map) => AttributeValue::M(encode_item(map)),
        }
    }

    /// Decode a DynamoDB attribute, unwrapping the single-key typed maps.
    pub fn from_attribute(attr: &AttributeValue) -> DirectValue {
        match attr {
            AttributeValue::Null(_) => DirectValue::Null,
            AttributeValue::Bool(b) => DirectValue::Bool(*b),
            AttributeValue::S(s) => DirectValue::String(s.clone()),
            AttributeValue::N(n) => parse_number(n),
            AttributeValue::L(items) => {
                DirectValue::List(items.iter().map(DirectValue::from_attribute).collect())
            }
            AttributeValue::M(map) => unwrap_typed(map).unwrap_or_else(|| DirectValue::Map(decode_item(map))),
            AttributeValue::Ss(items) => {
                DirectValue::List(items.iter().cloned().map(DirectValue::String).collect())
            }
            AttributeValue::Ns(items) => DirectValue::List(items.iter().map(|n| parse_number(n)).collect()),
            _ => DirectValue::Null,
        }
    }

    /// JSON view of the value; dates and times become ISO strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            DirectValue::Null => JsonValue::Null,
            DirectValue::Bool(b) => JsonValue::Bool(*b),
            DirectValue::Int(n) => JsonValue::from(*n),
            DirectValue::Float(f) => Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            DirectValue::String(s) => JsonValue::String(s.clone()),
            DirectValue::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            DirectValue::Date(d) => JsonValue::String(d.to_string()),
            DirectValue::Time(t) => JsonValue::String(t.to_string()),
            DirectValue::List(items) => JsonValue::Array(items.iter().map(DirectValue::to_json).collect()),
            DirectValue::Map(map) => item_to_json(map),
        }
    }
}

fn wrapped(key: &str, value: AttributeValue) -> AttributeValue {
    AttributeValue::M(HashMap::from([(key.to_owned(), value)]))
}

fn parse_number(n: &str) -> DirectValue {
    match n.parse::<i64>() {
        Ok(i) => DirectValue::Int(i),
        Err(_) => n.parse::<f64>().map(DirectValue::Float).unwrap_or(DirectValue::Null),
    }
}

fn unwrap_typed(map: &AttributeMap) -> Option<DirectValue> {
    if map.len() != 1 {
        return None;
    }
    let (key, value) = map.iter().next()?;
    match (key.as_str(), value) {
        (DATETIME_KEY, AttributeValue::S(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| DirectValue::DateTime(dt.with_timezone(&Utc))),
        (DATE_KEY, AttributeValue::S(s)) => s.parse().ok().map(DirectValue::Date),
        (TIME_KEY, AttributeValue::S(s)) => s.parse().ok().map(DirectValue::Time),
        (FLOAT_KEY, AttributeValue::N(n)) => n.parse().ok().map(DirectValue::Float),
        _ => None,
    }
}

pub fn encode_item(item: &DirectItem) -> AttributeMap {
    item.iter()
        .map(|(k, v)| (k.clone(), v.to_attribute()))
        .collect()
}

pub fn decode_item(item: &AttributeMap) -> DirectItem {
    item.iter()
        .map(|(k, v)| (k.clone(), DirectValue::from_attribute(v)))
        .collect()
}

pub fn item_to_json(item: &DirectItem) -> JsonValue {
    JsonValue::Object(
        item.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<_, _>>(),
    )
}

impl fmt::Display for DirectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<&str> for DirectValue {
    fn from(v: &str) -> Self {
        DirectValue::String(v.to_owned())
    }
}

impl From<String> for DirectValue {
    fn from(v: String) -> Self {
        DirectValue::String(v)
    }
}

impl From<bool> for DirectValue {
    fn from(v: bool) -> Self {
        DirectValue::Bool(v)
    }
}

impl From<i64> for DirectValue {
    fn from(v: i64) -> Self {
        DirectValue::Int(v)
    }
}

impl From<i32> for DirectValue {
    fn from(v: i32) -> Self {
        DirectValue::Int(v.into())
    }
}

impl From<f64> for DirectValue {
    fn from(v: f64) -> Self {
        DirectValue::Float(v)
    }
}

impl From<DateTime<Utc>> for DirectValue {
    fn from(v: DateTime<Utc>) -> Self {
        DirectValue::DateTime(v)
    }
}

impl From<NaiveDate> for DirectValue {
    fn from(v: NaiveDate) -> Self {
        DirectValue::Date(v)
    }
}

impl From<NaiveTime> for DirectValue {
    fn from(v: NaiveTime) -> Self {
        DirectValue::Time(v)
    }
}

impl<T: Into<DirectValue>> From<Option<T>> for DirectValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(DirectValue::Null)
    }
}

impl From<Vec<DirectValue>> for DirectValue {
    fn from(v: Vec<DirectValue>) -> Self {
        DirectValue::List(v)
    }
}

impl From<DirectItem> for DirectValue {
    fn from(v: DirectItem) -> Self {
        DirectValue::Map(v)
    }
}

/// Plain JSON maps onto the untyped variants; strings stay strings.
impl From<JsonValue> for DirectValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => DirectValue::Null,
            JsonValue::Bool(b) => DirectValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => DirectValue::Int(i),
                None => n.as_f64().map(DirectValue::Float).unwrap_or(DirectValue::Null),
            },
            JsonValue::String(s) => DirectValue::String(s),
            JsonValue::Array(items) => DirectValue::List(items.into_iter().map(Into::into).collect()),
            JsonValue::Object(map) => {
                DirectValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
