//! Helper module for PurpleAir's tabular responses.
//!
//! Multi-row endpoints (sensor history, sensor search) answer with a column
//! list and rows of bare values:
//!
//! ```json
//! {"fields": ["time_stamp", "humidity"], "data": [[1700000000, 41.2]]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A table of rows as returned by PurpleAir.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names, in row order.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Rows; each row has one value per field.
    #[serde(default)]
    pub data: Vec<Vec<Value>>,

    /// Averaging period of the rows, in minutes.
    /// Only present on history responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<u32>,
}

impl Table {
    /// Build a table from field names and rows.
    pub fn new(fields: &[&str], data: Vec<Vec<Value>>) -> Self {
        Table {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            data,
            average: None,
        }
    }

    /// Iterate over the rows, each addressable by field name.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.data.iter().map(move |values| Row {
            fields: &self.fields,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One row of a [Table].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    fields: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Look up a value by field name.
    /// JSON nulls and short rows read as missing.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let i = self.fields.iter().position(|f| f == field)?;
        self.values.get(i).filter(|v| !v.is_null())
    }

    pub fn f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// Integer lookup; tolerates integral values encoded as floats.
    pub fn i64(&self, field: &str) -> Option<i64> {
        let v = self.get(field)?;
        v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
    }

    pub fn str(&self, field: &str) -> Option<&'a str> {
        self.get(field).and_then(Value::as_str)
    }
}
