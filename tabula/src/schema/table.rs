use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use crate::schema::{Column, ColumnType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Definition of a table: a name and its ordered columns.
///
/// # Examples
///
/// ```rust
/// use tabula::schema::{Column, Table};
///
/// let users = Table::new("users")
///     .column(Column::integer("id").primary_key())
///     .column(Column::text("name"));
///
/// assert_eq!(users.column_names(), vec!["id", "name"]);
/// assert_eq!(users.primary_key().unwrap().name(), "id");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Table {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns(name: &str, columns: Vec<Column>) -> Self {
        Table {
            name: name.to_string(),
            columns,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    /// Validates the definition before a storage binds to it.
    pub(crate) fn validate(&self) -> TabulaResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("Table name cannot be empty".to_string()));
        }

        if self.columns.is_empty() {
            return Err(invalid(format!("Table '{}' has no columns", self.name)));
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.name().trim().is_empty() {
                return Err(invalid(format!(
                    "Table '{}' has a column without a name",
                    self.name
                )));
            }
            if !seen.insert(column.name()) {
                return Err(invalid(format!(
                    "Column '{}' is declared twice in table '{}'",
                    column.name(),
                    self.name
                )));
            }
            if column.is_autoincrement() && column.column_type() != ColumnType::Integer {
                return Err(invalid(format!(
                    "Autoincrement column '{}.{}' must be an INTEGER",
                    self.name,
                    column.name()
                )));
            }
            if let Some(default) = column.declared_default() {
                if !column.column_type().accepts(default) {
                    return Err(invalid(format!(
                        "Default {} does not fit column '{}.{}' of type {}",
                        default,
                        self.name,
                        column.name(),
                        column.column_type()
                    )));
                }
            }
        }

        let primary_keys = self.columns.iter().filter(|c| c.is_primary_key()).count();
        if primary_keys > 1 {
            return Err(invalid(format!(
                "Table '{}' declares {} primary key columns, at most one is allowed",
                self.name, primary_keys
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> TabulaError {
    log::error!("{}", message);
    TabulaError::new(&message, ErrorKind::InvalidSchema)
}
