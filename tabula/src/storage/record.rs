use crate::common::Row;
use crate::errors::TabulaResult;

/// A Rust type stored as a row of one table.
///
/// The table must be part of the storage's schema. Conversions go through
/// [`Row`], so a type only names the columns of the layout it was written
/// for; columns it does not know are left to their defaults on insert and
/// kept untouched on update.
///
/// # Examples
///
/// ```rust
/// use tabula::errors::TabulaResult;
/// use tabula::{row, Record, Row};
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for User {
///     fn table_name() -> &'static str {
///         "users"
///     }
///
///     fn to_row(&self) -> TabulaResult<Row> {
///         Ok(row! { "id" => self.id, "name" => self.name.as_str() })
///     }
///
///     fn from_row(row: &Row) -> TabulaResult<Self> {
///         Ok(User {
///             id: row.get("id")?,
///             name: row.get("name")?,
///         })
///     }
/// }
/// ```
pub trait Record: Sized {
    fn table_name() -> &'static str;

    fn to_row(&self) -> TabulaResult<Row>;

    fn from_row(row: &Row) -> TabulaResult<Self>;
}
