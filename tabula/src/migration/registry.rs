use crate::connection::ConnectionContainer;
use crate::errors::TabulaResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Identifies a migration by the version it starts from and the version it
/// produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MigrationKey {
    pub from: i32,
    pub to: i32,
}

impl MigrationKey {
    pub fn new(from: i32, to: i32) -> Self {
        MigrationKey { from, to }
    }
}

impl Display for MigrationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A migration callback.
///
/// It receives a container over the live connection and reports failure
/// through its result, which is returned to the caller of `migrate_to`
/// unchanged.
pub type Migration = Arc<dyn Fn(&ConnectionContainer) -> TabulaResult<()> + Send + Sync>;

/// Migrations keyed by their exact `(from, to)` pair.
///
/// Registering a key twice keeps the last callback. Lookups never chain
/// transitions: only the exact pair matches.
#[derive(Default)]
pub struct MigrationRegistry {
    migrations: RwLock<HashMap<MigrationKey, Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        MigrationRegistry {
            migrations: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, from: i32, to: i32, migration: Migration) {
        let key = MigrationKey::new(from, to);
        if self.migrations.write().insert(key, migration).is_some() {
            log::debug!("Migration {} replaced", key);
        } else {
            log::debug!("Migration {} registered", key);
        }
    }

    /// Returns the callback registered for exactly `(from, to)`.
    pub fn lookup(&self, from: i32, to: i32) -> Option<Migration> {
        self.migrations
            .read()
            .get(&MigrationKey::new(from, to))
            .cloned()
    }

    pub fn contains(&self, from: i32, to: i32) -> bool {
        self.migrations
            .read()
            .contains_key(&MigrationKey::new(from, to))
    }

    pub fn len(&self) -> usize {
        self.migrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.read().is_empty()
    }

    /// Registered keys in ascending order.
    pub fn keys(&self) -> Vec<MigrationKey> {
        let mut keys: Vec<MigrationKey> = self.migrations.read().keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        self.migrations.write().clear();
    }
}

impl Debug for MigrationRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
