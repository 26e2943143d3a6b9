//! Configuration collected by [`StorageBuilder`](crate::storage_builder::StorageBuilder).

use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor, MEMORY_FILENAME};
use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use crate::migration::{Migration, MigrationKey};
use crate::schema::{Schema, Table};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Settings a storage is opened with.
///
/// Cloning is cheap; clones share the same settings.
#[derive(Clone)]
pub struct StorageConfig {
    inner: Arc<StorageConfigInner>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageConfig {
    /// Creates a configuration for an empty memory storage.
    pub fn new() -> Self {
        StorageConfig {
            inner: Arc::new(StorageConfigInner::new()),
        }
    }

    /// Database file, or `:memory:`.
    pub fn filename(&self) -> String {
        self.inner.filename.read_with(|it| it.clone())
    }

    pub fn set_filename(&self, filename: &str) -> TabulaResult<()> {
        self.inner.set_filename(filename)
    }

    /// Whether the connection stays open for the storage's whole lifetime.
    pub fn open_forever(&self) -> bool {
        self.inner.open_forever.load(Ordering::Relaxed)
    }

    pub fn set_open_forever(&self, open_forever: bool) {
        self.inner.open_forever.store(open_forever, Ordering::Relaxed);
    }

    /// Adds a table definition.
    ///
    /// # Errors
    ///
    /// `InvalidSchema` if the table is malformed or already added.
    pub fn add_table(&self, table: Table) -> TabulaResult<()> {
        self.inner.add_table(table)
    }

    pub fn tables(&self) -> Vec<Table> {
        self.inner.tables.read_with(|it| it.clone())
    }

    pub fn schema(&self) -> TabulaResult<Schema> {
        Schema::from_tables(self.tables())
    }

    pub fn add_migration(&self, from: i32, to: i32, migration: Migration) {
        self.inner
            .migrations
            .write_with(|it| it.push((MigrationKey::new(from, to), migration)));
    }

    /// Migrations in the order they were added.
    pub fn migrations(&self) -> Vec<(MigrationKey, Migration)> {
        self.inner.migrations.read_with(|it| it.clone())
    }
}

struct StorageConfigInner {
    filename: Atomic<String>,
    open_forever: AtomicBool,
    tables: Atomic<Vec<Table>>,
    migrations: Atomic<Vec<(MigrationKey, Migration)>>,
}

impl StorageConfigInner {
    fn new() -> Self {
        StorageConfigInner {
            filename: atomic(MEMORY_FILENAME.to_string()),
            open_forever: AtomicBool::new(false),
            tables: atomic(Vec::new()),
            migrations: atomic(Vec::new()),
        }
    }

    fn set_filename(&self, filename: &str) -> TabulaResult<()> {
        if filename.contains('\0') {
            log::error!("Database filename cannot contain NUL characters");
            return Err(TabulaError::new(
                "Database filename cannot contain NUL characters",
                ErrorKind::ValidationError,
            ));
        }
        self.filename.write_with(|it| *it = filename.to_string());
        Ok(())
    }

    fn add_table(&self, table: Table) -> TabulaResult<()> {
        table.validate()?;
        self.tables.write_with(|tables| {
            if tables.iter().any(|t| t.name() == table.name()) {
                log::error!("Table '{}' is already configured", table.name());
                return Err(TabulaError::new(
                    &format!("Table '{}' is already configured", table.name()),
                    ErrorKind::InvalidSchema,
                ));
            }
            tables.push(table);
            Ok(())
        })
    }
}
