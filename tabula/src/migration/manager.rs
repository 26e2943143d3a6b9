use crate::connection::{ConnectionContainer, ConnectionHolder};
use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use crate::migration::MigrationRegistry;
use crate::pragma::Pragma;
use std::sync::Arc;

/// Runs the migration registered for the current version and a target.
///
/// The manager keeps no state between calls. For the whole of
/// [`migrate_to`](MigrationManager::migrate_to) it retains the connection, so
/// the physical database stays open while the callback runs even if every
/// storage built inside the callback is dropped.
pub struct MigrationManager<'a> {
    connection: Arc<ConnectionHolder>,
    registry: &'a MigrationRegistry,
}

impl<'a> MigrationManager<'a> {
    pub fn new(connection: Arc<ConnectionHolder>, registry: &'a MigrationRegistry) -> Self {
        MigrationManager {
            connection,
            registry,
        }
    }

    /// Migrates from the persisted version to `target`.
    ///
    /// Only a migration registered for exactly `(current, target)` runs; there
    /// is no chaining and no implicit no-op when `current == target`. The
    /// callback's error is returned unchanged and nothing it wrote before
    /// failing is undone.
    ///
    /// # Errors
    ///
    /// - the error opening the connection, before anything is read
    /// - `MigrationNotFound { from, to }` when no migration matches
    /// - the callback's own error
    pub fn migrate_to(&self, target: i32) -> TabulaResult<()> {
        let guard = self.connection.acquire()?;
        let result = self.run(target);
        let released = guard.release();

        match result {
            Ok(()) => released,
            Err(e) => {
                if let Err(release_error) = released {
                    log::error!("Failed to release connection after migration: {}", release_error);
                }
                Err(e)
            }
        }
    }

    fn run(&self, target: i32) -> TabulaResult<()> {
        let current = Pragma::new(Arc::clone(&self.connection)).user_version()?;
        log::debug!("Looking up migration {} -> {}", current, target);

        let migration = match self.registry.lookup(current, target) {
            Some(migration) => migration,
            None => {
                log::error!("No migration registered from version {} to {}", current, target);
                return Err(TabulaError::new(
                    &format!("No migration registered from version {} to {}", current, target),
                    ErrorKind::MigrationNotFound {
                        from: current,
                        to: target,
                    },
                ));
            }
        };

        let container = ConnectionContainer::new(Arc::clone(&self.connection));
        migration(&container)?;

        log::info!("Migrated {} from version {} to {}", self.connection.filename(), current, target);
        Ok(())
    }
}
