use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

/// A datatype, as declared for a table field.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    String,
    /// The auto-assigned integer primary key. Exactly one field per table
    /// has this type; its value is never written by queries.
    PrimaryKey,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Integer => "INTEGER",
            Self::String => "STRING",
            Self::PrimaryKey => "PRIMARY KEY",
        })
    }
}

/// A specific value of a data type
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    String(String),
}

impl Value {
    /// Returns the value's datatype.
    pub fn datatype(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::String(_) => DataType::String,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// A row of values keyed by field name. Stored rows do not contain the
/// primary-key field; it is synthesized from the record key on read.
pub type Row = BTreeMap<String, Value>;
