use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use crate::schema::Table;
use indexmap::IndexMap;

/// The validated set of table definitions a storage is bound to.
///
/// Table names are unique within a schema. The schema only describes how a
/// storage reads and writes; it does not have to match the physical tables
/// until `sync_schema` is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    tables: IndexMap<String, Table>,
}

impl Schema {
    pub fn new() -> Self {
        Schema {
            tables: IndexMap::new(),
        }
    }

    /// Builds a schema from table definitions, validating each one.
    ///
    /// # Errors
    ///
    /// `InvalidSchema` if a table is malformed or two tables share a name.
    pub fn from_tables<I: IntoIterator<Item = Table>>(tables: I) -> TabulaResult<Schema> {
        let mut schema = Schema::new();
        for table in tables {
            schema.add_table(table)?;
        }
        Ok(schema)
    }

    pub(crate) fn add_table(&mut self, table: Table) -> TabulaResult<()> {
        table.validate()?;
        if self.tables.contains_key(table.name()) {
            log::error!("Table '{}' is declared twice", table.name());
            return Err(TabulaError::new(
                &format!("Table '{}' is declared twice", table.name()),
                ErrorKind::InvalidSchema,
            ));
        }
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
