use base64::Engine as _;
use serde::ser::{Serialize, SerializeMap as _, Serializer};

/// A single SQL cell as returned by the database.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Binds an identifier received as a string (path parameter, CLI argument).
    ///
    /// Canonical decimal integers are bound as `Integer` so that lookups hit
    /// integer primary keys directly; everything else is bound as `Text`.
    pub fn from_id(id: &str) -> Self {
        match id.parse::<i64>() {
            Ok(n) if n.to_string() == id => Self::Integer(n),
            _ => Self::Text(id.to_owned()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the cell as an ordinal, accepting integral floats and
    /// numeric text as SQLite's loose typing may hand either back.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Blob(bytes) => serializer
                .serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

/// One row as an ordered mapping from column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Sets `column`. A column that is already present keeps its position and
    /// takes the new value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Column names plus row values, exactly as a statement produced them.
///
/// Either half may be missing when the database answered without a result
/// set; formatting treats that as "no rows".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResponse {
    pub columns: Option<Vec<String>>,
    pub rows: Option<Vec<Vec<Value>>>,
}

impl TabularResponse {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: Some(columns),
            rows: Some(rows),
        }
    }
}

pub fn format_response(response: TabularResponse) -> Vec<Record> {
    let (Some(columns), Some(rows)) = (response.columns, response.rows) else {
        return Vec::new();
    };

    rows.into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            columns
                .iter()
                .map(|column| (column.clone(), cells.next().unwrap_or(Value::Null)))
                .collect::<Record>()
        })
        .collect()
}

pub fn format_single_response(response: TabularResponse) -> Option<Record> {
    format_response(response).into_iter().next()
}
