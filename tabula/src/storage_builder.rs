use crate::connection::ConnectionContainer;
use crate::errors::{TabulaError, TabulaResult};
use crate::schema::Table;
use crate::storage::Storage;
use crate::storage_config::StorageConfig;
use std::sync::Arc;

/// Builder for opening a [`Storage`].
///
/// Configuration errors are captured as they happen and the first one is
/// returned from [`open`](StorageBuilder::open).
///
/// # Examples
///
/// ```rust
/// use tabula::schema::{Column, Table};
/// use tabula::Storage;
///
/// let storage = Storage::builder()
///     .filename(":memory:")
///     .table(Table::new("users").column(Column::integer("id").primary_key()))
///     .migration(0, 1, |container| {
///         container.make_storage(Vec::new())?.pragma().set_user_version(1)
///     })
///     .open()
///     .unwrap();
///
/// assert!(storage.has_migration(0, 1));
/// ```
#[derive(Default)]
pub struct StorageBuilder {
    error: Option<TabulaError>,
    config: StorageConfig,
}

impl StorageBuilder {
    /// Creates a builder for an empty memory storage.
    pub fn new() -> Self {
        StorageBuilder {
            error: None,
            config: StorageConfig::new(),
        }
    }

    /// Sets the database file. `:memory:` or an empty name selects a memory
    /// database, which is kept open for the storage's lifetime.
    pub fn filename(mut self, filename: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_filename(filename) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Keeps a file database open from `open()` until the storage is dropped
    /// instead of opening it per operation.
    pub fn open_forever(self, open_forever: bool) -> Self {
        self.config.set_open_forever(open_forever);
        self
    }

    pub fn table(mut self, table: Table) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.add_table(table) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn tables<I: IntoIterator<Item = Table>>(self, tables: I) -> Self {
        tables.into_iter().fold(self, StorageBuilder::table)
    }

    /// Registers a migration on the storage once it is open.
    pub fn migration<F>(self, from: i32, to: i32, migration: F) -> Self
    where
        F: Fn(&ConnectionContainer) -> TabulaResult<()> + Send + Sync + 'static,
    {
        self.config.add_migration(from, to, Arc::new(migration));
        self
    }

    /// Opens the storage, or returns the first configuration error.
    pub fn open(self) -> TabulaResult<Storage> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Storage::open(self.config)
    }
}
