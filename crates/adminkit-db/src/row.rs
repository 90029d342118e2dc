//! Result rows and typed cell access.

use adminkit_core::{AdminKitError, AdminKitResult};

use crate::value::Value;

/// A single result row: column names paired with values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> AdminKitResult<T> {
        let value = self.get_value(column).ok_or_else(|| {
            AdminKitError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> AdminKitResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            AdminKitError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Converts the row into a JSON object for admin payloads.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.columns
                .iter()
                .zip(&self.values)
                .map(|(c, v)| (c.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> AdminKitResult<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> AdminKitResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(Self::from(*b)),
            // Loosely typed columns (e.g. `configuration.value`) hold digits as text.
            Value::String(s) => s.trim().parse().map_err(|_| {
                AdminKitError::DatabaseError(format!("Expected Int, got {value:?}"))
            }),
            _ => Err(AdminKitError::DatabaseError(format!(
                "Expected Int, got {value:?}"
            ))),
        }
    }
}

impl FromValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: &Value) -> AdminKitResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as Self),
            _ => Err(AdminKitError::DatabaseError(format!(
                "Expected Float, got {value:?}"
            ))),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> AdminKitResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            _ => Err(AdminKitError::DatabaseError(format!(
                "Expected Bool, got {value:?}"
            ))),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> AdminKitResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            _ => Err(AdminKitError::DatabaseError(format!(
                "Expected String, got {value:?}"
            ))),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> AdminKitResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> AdminKitResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(
            vec!["id_slide".into(), "position".into(), "title".into(), "note".into()],
            vec![Value::Int(4), Value::Int(2), Value::from("Summer"), Value::Null],
        )
    }

    #[test]
    fn test_typed_get() {
        let row = row();
        assert_eq!(row.get::<i64>("id_slide").unwrap(), 4);
        assert_eq!(row.get::<String>("title").unwrap(), "Summer");
        assert_eq!(row.get::<Option<String>>("note").unwrap(), None);
        assert_eq!(row.get_by_index::<i64>(1).unwrap(), 2);
    }

    #[test]
    fn test_missing_column() {
        let err = row().get::<i64>("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(row().get_by_index::<i64>(9).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        assert!(row().get::<i64>("title").is_err());
        assert!(row().get::<bool>("title").is_err());
    }

    #[test]
    fn test_loose_int_from_text() {
        let row = Row::new(vec!["value".into()], vec![Value::from(" 12 ")]);
        assert_eq!(row.get::<i64>("value").unwrap(), 12);
    }

    #[test]
    fn test_to_json() {
        let json = row().to_json();
        assert_eq!(json["id_slide"], serde_json::json!(4));
        assert_eq!(json["note"], serde_json::Value::Null);
    }

    #[test]
    #[should_panic(expected = "Row column count must match value count")]
    fn test_mismatched_lengths_panic() {
        let _ = Row::new(vec!["a".into()], vec![]);
    }
}
