use crate::common::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    /// Checks whether `value` can be stored in a column of this type.
    ///
    /// `NULL` fits every type; nullability is checked separately. Integers are
    /// accepted by `Real` columns.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Real, Value::Real(_))
                | (ColumnType::Real, Value::Integer(_))
                | (ColumnType::Text, Value::Text(_))
                | (ColumnType::Blob, Value::Blob(_))
        )
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::Real => write!(f, "REAL"),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Blob => write!(f, "BLOB"),
        }
    }
}

/// Definition of a single table column.
///
/// Columns are nullable unless marked [`not_null`](Column::not_null).
///
/// # Examples
///
/// ```rust
/// use tabula::schema::{Column, ColumnType};
///
/// let id = Column::integer("id").primary_key();
/// let name = Column::text("name").not_null().default_value("");
///
/// assert!(id.is_primary_key());
/// assert_eq!(name.column_type(), ColumnType::Text);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    autoincrement: bool,
    not_null: bool,
    default_value: Option<Value>,
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Column {
            name: name.to_string(),
            column_type,
            primary_key: false,
            autoincrement: false,
            not_null: false,
            default_value: None,
        }
    }

    pub fn integer(name: &str) -> Self {
        Column::new(name, ColumnType::Integer)
    }

    pub fn real(name: &str) -> Self {
        Column::new(name, ColumnType::Real)
    }

    pub fn text(name: &str) -> Self {
        Column::new(name, ColumnType::Text)
    }

    pub fn blob(name: &str) -> Self {
        Column::new(name, ColumnType::Blob)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as an auto-incremented primary key.
    pub fn autoincrement(mut self) -> Self {
        self.primary_key = true;
        self.autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    pub fn declared_default(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Value given to this column when a write does not provide one.
    pub(crate) fn fill_value(&self) -> Value {
        self.default_value.clone().unwrap_or(Value::Null)
    }

    /// Whether existing rows can gain this column without rebuilding the table.
    pub(crate) fn can_be_added(&self) -> bool {
        !self.primary_key && !(self.not_null && self.default_value.is_none())
    }
}
