use std::fmt;

use bson::Bson;
use serde::{Deserialize, Serialize};

/// A primary key value: either an integer or a string-like identifier
/// such as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pk {
    Int(i64),
    Str(String),
}

impl Pk {
    pub fn is_int(&self) -> bool {
        matches!(self, Pk::Int(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Pk::Int(i) => Some(*i),
            Pk::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Pk::Int(_) => None,
            Pk::Str(s) => Some(s),
        }
    }

    /// Interpret a stored reference value as a key. `Null` and
    /// non-key types yield `None`.
    pub fn from_bson(value: &Bson) -> Option<Pk> {
        match value {
            Bson::Int32(i) => Some(Pk::Int(i64::from(*i))),
            Bson::Int64(i) => Some(Pk::Int(*i)),
            Bson::String(s) => Some(Pk::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            Pk::Int(i) => Bson::Int64(*i),
            Pk::Str(s) => Bson::String(s.clone()),
        }
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pk::Int(i) => write!(f, "{i}"),
            Pk::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Pk {
    fn from(i: i64) -> Self {
        Pk::Int(i)
    }
}

impl From<&str> for Pk {
    fn from(s: &str) -> Self {
        Pk::Str(s.to_string())
    }
}

impl From<String> for Pk {
    fn from(s: String) -> Self {
        Pk::Str(s)
    }
}

impl From<uuid::Uuid> for Pk {
    fn from(id: uuid::Uuid) -> Self {
        Pk::Str(id.to_string())
    }
}

impl From<Pk> for Bson {
    fn from(pk: Pk) -> Self {
        match pk {
            Pk::Int(i) => Bson::Int64(i),
            Pk::Str(s) => Bson::String(s),
        }
    }
}

/// Value equality that treats the integer widths as interchangeable.
pub(crate) fn same_value(a: &Bson, b: &Bson) -> bool {
    match (Pk::from_bson(a), Pk::from_bson(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
