use crate::connection::ConnectionHolder;
use crate::errors::TabulaResult;
use std::sync::Arc;

/// Access to the persisted `user_version` counter.
///
/// The counter starts at 0 in a new database. Nothing in the crate changes it
/// on its own: migration callbacks set it once the data has been transformed.
/// Each call retains the connection for its own duration.
#[derive(Debug, Clone)]
pub struct Pragma {
    connection: Arc<ConnectionHolder>,
}

impl Pragma {
    pub(crate) fn new(connection: Arc<ConnectionHolder>) -> Self {
        Pragma { connection }
    }

    pub fn user_version(&self) -> TabulaResult<i32> {
        self.connection
            .with_retained(|| self.connection.with_database(|db| Ok(db.user_version())))
    }

    pub fn set_user_version(&self, version: i32) -> TabulaResult<()> {
        log::debug!("Setting user_version of {} to {}", self.connection.filename(), version);
        self.connection.with_retained(|| {
            self.connection.with_database_mut(|db| {
                db.set_user_version(version);
                Ok(())
            })
        })
    }
}
