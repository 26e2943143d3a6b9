use crate::common::{Row, Value};
use crate::connection::{ConnectionContainer, ConnectionGuard, ConnectionHolder, Database};
use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use crate::migration::{MigrationManager, MigrationRegistry};
use crate::pragma::Pragma;
use crate::schema::{plan, Schema, SyncSchemaResult, Table};
use crate::storage::Record;
use crate::storage_builder::StorageBuilder;
use crate::storage_config::StorageConfig;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

/// A storage bound to a set of table definitions over one connection.
///
/// Every operation retains the connection for its own duration, so a
/// file-backed storage opens and closes its file on demand. Memory storages,
/// and storages opened with `open_forever`, keep the connection retained until
/// the last clone is dropped.
///
/// Cloning is cheap; clones share the connection, the schema, the registered
/// migrations and the transaction state.
///
/// # Examples
///
/// ```rust
/// use tabula::schema::{Column, SyncSchemaResult, Table};
/// use tabula::{row, Storage};
///
/// let storage = Storage::builder()
///     .table(
///         Table::new("users")
///             .column(Column::integer("id").primary_key())
///             .column(Column::text("name").not_null()),
///     )
///     .open()
///     .unwrap();
///
/// let synced = storage.sync_schema(false).unwrap();
/// assert_eq!(synced["users"], SyncSchemaResult::NewTableCreated);
///
/// let id = storage.insert_row("users", row! { "name" => "Ann Lee" }).unwrap();
/// assert_eq!(id, 1);
/// assert_eq!(storage.rows("users").unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

/// A non-owning reference to a [`Storage`].
///
/// Migration callbacks are owned by the storage they are registered on; a
/// callback that needs that storage captures a `WeakStorage` and upgrades it
/// when it runs.
#[derive(Clone)]
pub struct WeakStorage {
    inner: Weak<StorageInner>,
}

impl WeakStorage {
    /// # Errors
    ///
    /// `StoreAlreadyClosed` if every `Storage` clone has been dropped.
    pub fn upgrade(&self) -> TabulaResult<Storage> {
        match self.inner.upgrade() {
            Some(inner) => Ok(Storage { inner }),
            None => {
                log::error!("Storage has already been dropped");
                Err(TabulaError::new(
                    "Storage has already been dropped",
                    ErrorKind::StoreAlreadyClosed,
                ))
            }
        }
    }
}

impl Storage {
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub(crate) fn open(config: StorageConfig) -> TabulaResult<Storage> {
        let schema = config.schema()?;
        let connection = Arc::new(ConnectionHolder::new(&config.filename()));
        let forever = connection.is_memory() || config.open_forever();
        if forever {
            connection.retain()?;
        }

        let storage = Storage::with_connection(connection, schema, forever);
        for (key, migration) in config.migrations() {
            storage.inner.migrations.register(key.from, key.to, migration);
        }

        log::info!(
            "Storage opened on {} with tables {:?}",
            storage.filename(),
            storage.schema().table_names()
        );
        Ok(storage)
    }

    /// Creates a storage over `connection`. When `forever` is set the caller
    /// has already retained the connection once on behalf of the storage.
    pub(crate) fn with_connection(
        connection: Arc<ConnectionHolder>,
        schema: Schema,
        forever: bool,
    ) -> Storage {
        Storage {
            inner: Arc::new(StorageInner {
                pragma: Pragma::new(Arc::clone(&connection)),
                connection,
                schema,
                migrations: MigrationRegistry::new(),
                transaction: Mutex::new(None),
                forever,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakStorage {
        WeakStorage {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn filename(&self) -> &str {
        self.inner.connection.filename()
    }

    /// Whether the physical connection is currently open.
    pub fn is_opened(&self) -> bool {
        self.inner.connection.is_open()
    }

    pub fn connection(&self) -> Arc<ConnectionHolder> {
        Arc::clone(&self.inner.connection)
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn pragma(&self) -> &Pragma {
        &self.inner.pragma
    }

    // ==================== Schema ====================

    /// Makes every declared table match its definition.
    ///
    /// Physical tables the schema does not declare are left alone. With
    /// `preserve` unset, a table that loses columns is dropped and recreated;
    /// with it set, rows are kept and only the removed columns are lost.
    pub fn sync_schema(&self, preserve: bool) -> TabulaResult<BTreeMap<String, SyncSchemaResult>> {
        let schema = &self.inner.schema;
        self.write(|db| {
            let mut results = BTreeMap::new();
            for table in schema.tables() {
                let result = plan(table, db.columns_of(table.name()), preserve);
                if result != SyncSchemaResult::AlreadyInSync {
                    log::info!("Table '{}': {}", table.name(), result);
                }
                db.apply_sync(table, result);
                results.insert(table.name().to_string(), result);
            }
            Ok(results)
        })
    }

    /// Reports what [`sync_schema`](Storage::sync_schema) would do without
    /// changing anything.
    pub fn sync_schema_simulate(
        &self,
        preserve: bool,
    ) -> TabulaResult<BTreeMap<String, SyncSchemaResult>> {
        let schema = &self.inner.schema;
        self.read(|db| {
            Ok(schema
                .tables()
                .map(|table| {
                    let result = plan(table, db.columns_of(table.name()), preserve);
                    (table.name().to_string(), result)
                })
                .collect())
        })
    }

    pub fn table_exists(&self, name: &str) -> TabulaResult<bool> {
        self.read(|db| Ok(db.table_exists(name)))
    }

    /// Names of the physical tables, declared or not.
    pub fn table_names(&self) -> TabulaResult<Vec<String>> {
        self.read(|db| Ok(db.table_names()))
    }

    pub fn drop_table(&self, name: &str) -> TabulaResult<()> {
        self.write(|db| db.drop_table(name))
    }

    pub fn rename_table(&self, old_name: &str, new_name: &str) -> TabulaResult<()> {
        self.write(|db| db.rename_table(old_name, new_name))
    }

    // ==================== Rows ====================

    /// Reads every row of `table` through its declared columns.
    pub fn rows(&self, table: &str) -> TabulaResult<Vec<Row>> {
        let view = self.declared(table)?;
        self.read(|db| db.read_rows(view))
    }

    /// Inserts a row into `table`, returning its primary key.
    ///
    /// An integer primary key left out of `row` is assigned one past the
    /// current maximum. Tables without an integer key return the row's
    /// 1-based position.
    pub fn insert_row(&self, table: &str, row: Row) -> TabulaResult<i64> {
        let view = self.declared(table)?;
        self.write(|db| db.insert_row(view, row))
    }

    pub fn insert<T: Record>(&self, record: &T) -> TabulaResult<i64> {
        self.insert_row(T::table_name(), record.to_row()?)
    }

    /// Inserts `record`, replacing the row with the same primary key.
    pub fn replace<T: Record>(&self, record: &T) -> TabulaResult<i64> {
        let view = self.declared(T::table_name())?;
        let row = record.to_row()?;
        self.write(|db| db.replace_row(view, row))
    }

    /// # Errors
    ///
    /// `NotFound` if no row has the record's primary key, `InvalidOperation`
    /// if the table has no primary key.
    pub fn update<T: Record>(&self, record: &T) -> TabulaResult<()> {
        let view = self.declared(T::table_name())?;
        let row = record.to_row()?;
        self.write(|db| db.update_row(view, row))
    }

    pub fn get<T: Record>(&self, id: impl Into<Value>) -> TabulaResult<T> {
        let id = id.into();
        match self.get_optional::<T>(id.clone())? {
            Some(record) => Ok(record),
            None => {
                log::error!("No row with key {} in table '{}'", id, T::table_name());
                Err(TabulaError::new(
                    &format!("No row with key {} in table '{}'", id, T::table_name()),
                    ErrorKind::NotFound,
                ))
            }
        }
    }

    pub fn get_optional<T: Record>(&self, id: impl Into<Value>) -> TabulaResult<Option<T>> {
        let view = self.declared(T::table_name())?;
        let id = id.into();
        let row = self.read(|db| db.find_row(view, &id))?;
        row.as_ref().map(T::from_row).transpose()
    }

    /// Every record of the table in insertion order.
    pub fn get_all<T: Record>(&self) -> TabulaResult<Vec<T>> {
        self.rows(T::table_name())?
            .iter()
            .map(T::from_row)
            .collect()
    }

    pub fn count<T: Record>(&self) -> TabulaResult<usize> {
        let view = self.declared(T::table_name())?;
        self.read(|db| db.count_rows(view))
    }

    /// Removes the row with primary key `id`, returning whether it existed.
    pub fn remove<T: Record>(&self, id: impl Into<Value>) -> TabulaResult<bool> {
        let view = self.declared(T::table_name())?;
        let id = id.into();
        self.write(|db| db.remove_row(view, &id))
    }

    /// Removes every row of the table, returning how many were removed.
    pub fn remove_all<T: Record>(&self) -> TabulaResult<usize> {
        let view = self.declared(T::table_name())?;
        self.write(|db| db.clear_rows(view))
    }

    // ==================== Transactions ====================

    /// Starts a transaction covering the whole database, `user_version`
    /// included. The connection stays retained until commit or rollback.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if this storage already has an active transaction.
    pub fn begin_transaction(&self) -> TabulaResult<()> {
        let mut transaction = self.inner.transaction.lock();
        if transaction.is_some() {
            log::error!("A transaction is already active on {}", self.filename());
            return Err(TabulaError::new(
                "A transaction is already active",
                ErrorKind::InvalidOperation,
            ));
        }

        let guard = self.inner.connection.acquire()?;
        let snapshot = self.inner.connection.with_database(|db| Ok(db.clone()))?;
        *transaction = Some(ActiveTransaction { guard, snapshot });
        log::debug!("Transaction started on {}", self.filename());
        Ok(())
    }

    pub fn commit(&self) -> TabulaResult<()> {
        let active = self.take_transaction()?;
        log::debug!("Transaction committed on {}", self.filename());
        active.guard.release()
    }

    /// Restores the database to its state when the transaction began.
    pub fn rollback(&self) -> TabulaResult<()> {
        let ActiveTransaction { guard, snapshot } = self.take_transaction()?;
        let restored = self.inner.connection.with_database_mut(|db| {
            *db = snapshot;
            Ok(())
        });
        log::debug!("Transaction rolled back on {}", self.filename());
        let released = guard.release();
        restored.and(released)
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.transaction.lock().is_some()
    }

    /// Runs `f` in a transaction, committing on `Ok` and rolling back on `Err`.
    pub fn transaction<R>(&self, f: impl FnOnce(&Storage) -> TabulaResult<R>) -> TabulaResult<R> {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = self.rollback() {
                    log::error!("Failed to roll back transaction: {}", rollback_error);
                }
                Err(e)
            }
        }
    }

    // ==================== Migrations ====================

    /// Registers `migration` for the exact transition `from -> to`,
    /// replacing any migration registered for the same pair.
    pub fn register_migration<F>(&self, from: i32, to: i32, migration: F)
    where
        F: Fn(&ConnectionContainer) -> TabulaResult<()> + Send + Sync + 'static,
    {
        self.inner.migrations.register(from, to, Arc::new(migration));
    }

    pub fn has_migration(&self, from: i32, to: i32) -> bool {
        self.inner.migrations.contains(from, to)
    }

    pub fn clear_migrations(&self) {
        self.inner.migrations.clear();
    }

    /// Runs the migration registered from the current `user_version` to
    /// `target`. See [`MigrationManager::migrate_to`].
    pub fn migrate_to(&self, target: i32) -> TabulaResult<()> {
        MigrationManager::new(Arc::clone(&self.inner.connection), &self.inner.migrations)
            .migrate_to(target)
    }

    fn declared(&self, name: &str) -> TabulaResult<&Table> {
        self.inner.schema.table(name).ok_or_else(|| {
            log::error!("Table '{}' is not part of the storage schema", name);
            TabulaError::new(
                &format!("Table '{}' is not part of the storage schema", name),
                ErrorKind::TableNotFound,
            )
        })
    }

    fn take_transaction(&self) -> TabulaResult<ActiveTransaction> {
        self.inner.transaction.lock().take().ok_or_else(|| {
            log::error!("No active transaction on {}", self.filename());
            TabulaError::new("No active transaction", ErrorKind::InvalidOperation)
        })
    }

    fn read<R>(&self, f: impl FnOnce(&Database) -> TabulaResult<R>) -> TabulaResult<R> {
        let connection = &self.inner.connection;
        connection.with_retained(|| connection.with_database(f))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Database) -> TabulaResult<R>) -> TabulaResult<R> {
        let connection = &self.inner.connection;
        connection.with_retained(|| connection.with_database_mut(f))
    }
}

impl Debug for Storage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("filename", &self.filename())
            .field("tables", &self.schema().table_names())
            .field("migrations", &self.inner.migrations)
            .finish()
    }
}

struct StorageInner {
    connection: Arc<ConnectionHolder>,
    schema: Schema,
    pragma: Pragma,
    migrations: MigrationRegistry,
    transaction: Mutex<Option<ActiveTransaction>>,
    forever: bool,
}

struct ActiveTransaction {
    guard: ConnectionGuard,
    snapshot: Database,
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        if let Some(ActiveTransaction { guard, snapshot }) = self.transaction.get_mut().take() {
            log::warn!("Storage dropped inside a transaction, rolling back");
            if let Err(e) = self.connection.with_database_mut(|db| {
                *db = snapshot;
                Ok(())
            }) {
                log::error!("Failed to roll back transaction: {}", e);
            }
            drop(guard);
        }

        if self.forever {
            if let Err(e) = self.connection.release() {
                log::error!("Failed to close {}: {}", self.connection.filename(), e);
            }
        }
    }
}
