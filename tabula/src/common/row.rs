use crate::common::{Convertible, Value};
use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use indexmap::IndexMap;

/// A row of named cell values.
///
/// Column order is the order of insertion. Rows are what [`Record`] types
/// convert to and from; the physical layout of a table is never exposed
/// through them.
///
/// [`Record`]: crate::storage::Record
///
/// # Examples
///
/// ```rust
/// use tabula::row;
///
/// let row = row! { "id" => 1, "name" => "Ann Lee" };
/// assert_eq!(row.get::<i64>("id").unwrap(), 1);
/// assert_eq!(row.get::<String>("name").unwrap(), "Ann Lee");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Row {
            columns: IndexMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Row {
            columns: IndexMap::with_capacity(capacity),
        }
    }

    /// Sets `column` to `value`, returning the previous value if any.
    pub fn put(&mut self, column: &str, value: impl Into<Value>) -> Option<Value> {
        self.columns.insert(column.to_string(), value.into())
    }

    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Reads `column` as a Rust value.
    ///
    /// # Errors
    ///
    /// `MissingRequiredField` if the row has no such column, or the
    /// conversion error of `T`.
    pub fn get<T: Convertible>(&self, column: &str) -> TabulaResult<T> {
        match self.columns.get(column) {
            Some(value) => T::from_value(value),
            None => {
                log::error!("Column '{}' is not present in row", column);
                Err(TabulaError::new(
                    &format!("Column '{}' is not present in row", column),
                    ErrorKind::MissingRequiredField,
                ))
            }
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.shift_remove(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Row {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Builds a [`Row`] from `"column" => value` pairs.
#[macro_export]
macro_rules! row {
    () => {
        $crate::common::Row::new()
    };

    ($($column:expr => $value:expr),+ $(,)?) => {
        {
            let mut row = $crate::common::Row::new();
            $(
                row.put($column, $value);
            )+
            row
        }
    };
}
