use crate::connection::ConnectionHolder;
use crate::errors::TabulaResult;
use crate::schema::{Schema, Table};
use crate::storage::Storage;
use std::sync::Arc;

/// Mints storages that share one physical connection.
///
/// A migration callback receives a container wrapping the live connection.
/// Each [`make_storage`](ConnectionContainer::make_storage) call returns an
/// independent [`Storage`] bound to its own table definitions, so a callback
/// can read rows through the legacy layout and write them through the current
/// one. The container never retains or releases the connection; whoever
/// invoked the callback keeps it open.
///
/// # Examples
///
/// ```rust
/// use tabula::schema::{Column, Table};
/// use tabula::Storage;
///
/// let storage = Storage::builder().open().unwrap();
/// storage.register_migration(0, 1, |container| {
///     let legacy = container.make_storage(vec![
///         Table::new("users").column(Column::integer("id").primary_key()),
///     ])?;
///     legacy.sync_schema(false)?;
///     legacy.pragma().set_user_version(1)
/// });
///
/// storage.migrate_to(1).unwrap();
/// assert_eq!(storage.pragma().user_version().unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionContainer {
    connection: Arc<ConnectionHolder>,
}

impl ConnectionContainer {
    pub(crate) fn new(connection: Arc<ConnectionHolder>) -> Self {
        ConnectionContainer { connection }
    }

    /// Returns a new storage over the shared connection bound to `tables`.
    ///
    /// # Errors
    ///
    /// `InvalidSchema` if a table definition is malformed or declared twice.
    pub fn make_storage<I: IntoIterator<Item = Table>>(&self, tables: I) -> TabulaResult<Storage> {
        let schema = Schema::from_tables(tables)?;
        Ok(Storage::with_connection(Arc::clone(&self.connection), schema, false))
    }

    pub fn filename(&self) -> &str {
        self.connection.filename()
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    pub fn retain_count(&self) -> usize {
        self.connection.retain_count()
    }

    /// Whether `storage` reads and writes through this container's connection.
    pub fn shares_connection_with(&self, storage: &Storage) -> bool {
        Arc::ptr_eq(&self.connection, &storage.connection())
    }
}
