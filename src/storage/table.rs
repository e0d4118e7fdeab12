use crate::core::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A literal stored in a row. Numbers keep their literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Number(String),
    Text(String),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared SQL type, kept verbatim.
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    indexes: BTreeSet<String>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            indexes: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn indexes(&self) -> impl Iterator<Item = &str> {
        self.indexes.iter().map(String::as_str)
    }

    /// Inserts one row. With an explicit column list, unlisted columns are `NULL`.
    pub fn insert(&mut self, columns: Option<&[String]>, values: Vec<Value>) -> StoreResult<()> {
        let row = match columns {
            None => {
                if values.len() != self.columns.len() {
                    return Err(StoreError::ExecutionError(format!(
                        "Table '{}' has {} columns but {} values were supplied",
                        self.name,
                        self.columns.len(),
                        values.len()
                    )));
                }
                values
            }
            Some(names) => {
                if names.len() != values.len() {
                    return Err(StoreError::ExecutionError(format!(
                        "INSERT into '{}' lists {} columns but {} values",
                        self.name,
                        names.len(),
                        values.len()
                    )));
                }
                let mut row = vec![Value::Null; self.columns.len()];
                for (name, value) in names.iter().zip(values) {
                    let position = self.column_position(name)?;
                    row[position] = value;
                }
                row
            }
        };

        self.rows.push(row);
        Ok(())
    }

    /// Removes every row, returning how many were deleted.
    pub fn clear(&mut self) -> usize {
        let deleted = self.rows.len();
        self.rows.clear();
        deleted
    }

    pub fn add_index(&mut self, name: impl Into<String>, if_not_exists: bool) -> StoreResult<()> {
        let name = name.into();
        if self.indexes.contains(&name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(StoreError::ExecutionError(format!(
                "Index '{}' already exists on table '{}'",
                name, self.name
            )));
        }
        self.indexes.insert(name);
        Ok(())
    }

    fn column_position(&self, name: &str) -> StoreResult<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                StoreError::ExecutionError(format!(
                    "Column '{}' does not exist in table '{}'",
                    name, self.name
                ))
            })
    }
}
