//! Key and filter condition builder.
//!
//! ```ignore
//! let cond = Attr::new("pk").eq("ACCOUNT#1").and(Attr::new("sk").begins_with("ORDER#"));
//! let mut expr = ExpressionBuilder::default();
//! let key_condition = expr.condition(&cond);
//! // "#n0 = :v0 AND begins_with(#n1, :v1)"
//! ```

use std::collections::HashMap;
use std::fmt;

use aws_sdk_dynamodb::types::AttributeValue;

use super::codec::DirectValue;

/// Attribute path; dots address nested map attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr(String);

impl Attr {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn compare(self, op: CompareOp, value: impl Into<DirectValue>) -> Condition {
        Condition::Compare {
            attr: self,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<DirectValue>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    pub fn lt(self, value: impl Into<DirectValue>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<DirectValue>) -> Condition {
        self.compare(CompareOp::Lte, value)
    }

    pub fn gt(self, value: impl Into<DirectValue>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<DirectValue>) -> Condition {
        self.compare(CompareOp::Gte, value)
    }

    pub fn between(self, low: impl Into<DirectValue>, high: impl Into<DirectValue>) -> Condition {
        Condition::Between {
            attr: self,
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn begins_with(self, prefix: impl Into<DirectValue>) -> Condition {
        Condition::BeginsWith {
            attr: self,
            prefix: prefix.into(),
        }
    }

    pub fn exists(self) -> Condition {
        Condition::Exists(self)
    }

    pub fn not_exists(self) -> Condition {
        Condition::NotExists(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        attr: Attr,
        op: CompareOp,
        value: DirectValue,
    },
    Between {
        attr: Attr,
        low: DirectValue,
        high: DirectValue,
    },
    BeginsWith {
        attr: Attr,
        prefix: DirectValue,
    },
    Exists(Attr),
    NotExists(Attr),
    And(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// `other` joined to `base` when there is one.
    pub fn and_optional(base: Option<Condition>, other: Condition) -> Condition {
        match base {
            Some(base) => base.and(other),
            None => other,
        }
    }

    /// `attribute_not_exists` on every name; `None` for an empty list.
    pub fn none_exist<I, S>(names: I) -> Option<Condition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(|n| Attr::new(n).not_exists())
            .reduce(Condition::and)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { attr, op, value } => {
                write!(f, "{} {} {}", attr.0, op.symbol(), value)
            }
            Condition::Between { attr, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", attr.0, low, high)
            }
            Condition::BeginsWith { attr, prefix } => {
                write!(f, "begins_with({}, {})", attr.0, prefix)
            }
            Condition::Exists(attr) => write!(f, "attribute_exists({})", attr.0),
            Condition::NotExists(attr) => write!(f, "attribute_not_exists({})", attr.0),
            Condition::And(a, b) => write!(f, "({a} AND {b})"),
        }
    }
}

/// Collects placeholders for every expression of one request.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    next_value: usize,
}

impl ExpressionBuilder {
    /// Placeholder path for an attribute (`a.b` becomes `#n0.#n1`).
    pub fn name(&mut self, attr: &Attr) -> String {
        attr.0
            .split('.')
            .map(|segment| {
                if let Some((placeholder, _)) = self.names.iter().find(|(_, v)| *v == segment) {
                    return placeholder.clone();
                }
                let placeholder = format!("#n{}", self.names.len());
                self.names.insert(placeholder.clone(), segment.to_owned());
                placeholder
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn value(&mut self, value: &DirectValue) -> String {
        let placeholder = format!(":v{}", self.next_value);
        self.next_value += 1;
        self.values.insert(placeholder.clone(), value.to_attribute());
        placeholder
    }

    /// Bind a value under an explicit placeholder (`:name`).
    pub fn named_value(&mut self, placeholder: impl Into<String>, value: &DirectValue) {
        self.values.insert(placeholder.into(), value.to_attribute());
    }

    pub fn condition(&mut self, cond: &Condition) -> String {
        match cond {
            Condition::Compare { attr, op, value } => {
                let name = self.name(attr);
                let value = self.value(value);
                format!("{name} {} {value}", op.symbol())
            }
            Condition::Between { attr, low, high } => {
                let name = self.name(attr);
                let low = self.value(low);
                let high = self.value(high);
                format!("{name} BETWEEN {low} AND {high}")
            }
            Condition::BeginsWith { attr, prefix } => {
                let name = self.name(attr);
                let prefix = self.value(prefix);
                format!("begins_with({name}, {prefix})")
            }
            Condition::Exists(attr) => format!("attribute_exists({})", self.name(attr)),
            Condition::NotExists(attr) => format!("attribute_not_exists({})", self.name(attr)),
            Condition::And(a, b) => {
                let a = self.condition(a);
                let b = self.condition(b);
                format!("{a} AND {b}")
            }
        }
    }

    /// Comma-separated projection of attribute names.
    pub fn projection<S: AsRef<str>>(&mut self, names: &[S]) -> Option<String> {
        if names.is_empty() {
            return None;
        }
        Some(
            names
                .iter()
                .map(|n| self.name(&Attr::new(n.as_ref())))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Names and values, `None` when empty (the SDK rejects empty maps).
    pub fn into_parts(
        self,
    ) -> (
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}
