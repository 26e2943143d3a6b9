use crate::common::MEMORY_FILENAME;
use crate::connection::Database;
use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

/// Reference-counted, lazily opened handle to a physical database.
///
/// The first [`retain`](ConnectionHolder::retain) opens the database and the
/// matching last [`release`](ConnectionHolder::release) closes it; closing a
/// file-backed database writes it back to disk. The holder is shared through
/// `Arc` by the storage, every view minted from it and any code that needs the
/// connection to stay open, which takes a [`ConnectionGuard`].
///
/// A memory database (`:memory:` or an empty filename) loses its contents on
/// close.
pub struct ConnectionHolder {
    filename: String,
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct ConnectionState {
    retain_count: usize,
    open_count: usize,
    database: Option<Database>,
}

impl ConnectionHolder {
    pub fn new(filename: &str) -> Self {
        ConnectionHolder {
            filename: filename.to_string(),
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_memory(&self) -> bool {
        self.filename.is_empty() || self.filename == MEMORY_FILENAME
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().database.is_some()
    }

    pub fn retain_count(&self) -> usize {
        self.state.lock().retain_count
    }

    /// Number of times the physical database has been opened so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Increments the use count, opening the database on the first retain.
    ///
    /// # Errors
    ///
    /// The open error (I/O failure, corrupted file). The use count is left
    /// unchanged in that case.
    pub fn retain(&self) -> TabulaResult<()> {
        let mut state = self.state.lock();
        if state.retain_count == 0 {
            let database = self.open()?;
            state.database = Some(database);
            state.open_count += 1;
        }
        state.retain_count += 1;
        Ok(())
    }

    /// Decrements the use count, closing the database on the last release.
    ///
    /// The last release writes a file-backed database before closing it. If
    /// the write fails the database stays open and the last retain stays in
    /// place, so calling `release` again retries the write.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if nothing is retained, or the error writing a
    /// file-backed database.
    pub fn release(&self) -> TabulaResult<()> {
        let mut state = self.state.lock();
        if state.retain_count == 0 {
            log::error!("Connection to {} released more often than retained", self.display_name());
            return Err(TabulaError::new(
                "Connection released more often than retained",
                ErrorKind::InvalidOperation,
            ));
        }

        if state.retain_count == 1 {
            if let Some(database) = state.database.as_ref() {
                self.close(database)?;
            }
            state.database = None;
        }
        state.retain_count -= 1;
        Ok(())
    }

    /// Retains the connection until the returned guard is released or dropped.
    pub fn acquire(self: &Arc<Self>) -> TabulaResult<ConnectionGuard> {
        self.retain()?;
        Ok(ConnectionGuard {
            holder: Arc::clone(self),
            released: false,
        })
    }

    /// Runs `f` with the connection retained for its duration.
    ///
    /// An error from `f` takes precedence over an error releasing.
    pub fn with_retained<R>(&self, f: impl FnOnce() -> TabulaResult<R>) -> TabulaResult<R> {
        self.retain()?;
        let result = f();
        let released = self.release();
        match result {
            Ok(value) => released.map(|_| value),
            Err(e) => {
                if let Err(release_error) = released {
                    log::error!("Failed to release connection: {}", release_error);
                }
                Err(e)
            }
        }
    }

    /// Runs `f` against the open database.
    ///
    /// # Errors
    ///
    /// `StoreNotOpened` if the connection is not retained.
    pub fn with_database<R>(&self, f: impl FnOnce(&Database) -> TabulaResult<R>) -> TabulaResult<R> {
        let state = self.state.lock();
        match state.database.as_ref() {
            Some(database) => f(database),
            None => Err(self.not_opened()),
        }
    }

    pub fn with_database_mut<R>(
        &self,
        f: impl FnOnce(&mut Database) -> TabulaResult<R>,
    ) -> TabulaResult<R> {
        let mut state = self.state.lock();
        match state.database.as_mut() {
            Some(database) => f(database),
            None => Err(self.not_opened()),
        }
    }

    fn open(&self) -> TabulaResult<Database> {
        if self.is_memory() {
            log::debug!("Opening memory database");
            return Ok(Database::default());
        }

        log::debug!("Opening database file {}", self.filename);
        Database::load(Path::new(&self.filename)).map_err(|e| {
            log::error!("Failed to open {}: {}", self.filename, e);
            TabulaError::new_with_cause(
                &format!("Failed to open database {}", self.filename),
                e.kind().clone(),
                e,
            )
        })
    }

    fn close(&self, database: &Database) -> TabulaResult<()> {
        if self.is_memory() {
            log::debug!("Closing memory database, contents discarded");
            return Ok(());
        }

        log::debug!("Closing database file {}", self.filename);
        database.save(Path::new(&self.filename)).map_err(|e| {
            log::error!("Failed to write {}: {}", self.filename, e);
            e
        })
    }

    fn not_opened(&self) -> TabulaError {
        log::error!("Connection to {} is not open", self.display_name());
        TabulaError::new(
            &format!("Connection to {} is not open", self.display_name()),
            ErrorKind::StoreNotOpened,
        )
    }

    fn display_name(&self) -> &str {
        if self.is_memory() {
            MEMORY_FILENAME
        } else {
            &self.filename
        }
    }
}

impl Drop for ConnectionHolder {
    fn drop(&mut self) {
        // still open after a failed close or an unbalanced retain
        if let Some(database) = self.state.get_mut().database.take() {
            log::warn!("Connection to {} dropped while open", self.display_name());
            if let Err(e) = self.close(&database) {
                log::error!("Failed to write {} on drop: {}", self.display_name(), e);
            }
        }
    }
}

impl Debug for ConnectionHolder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConnectionHolder")
            .field("filename", &self.filename)
            .field("retain_count", &state.retain_count)
            .field("open", &state.database.is_some())
            .finish()
    }
}

/// Keeps a connection retained while alive.
///
/// Dropping the guard releases the connection and logs a failure;
/// [`release`](ConnectionGuard::release) returns it instead.
pub struct ConnectionGuard {
    holder: Arc<ConnectionHolder>,
    released: bool,
}

impl ConnectionGuard {
    pub fn holder(&self) -> &Arc<ConnectionHolder> {
        &self.holder
    }

    pub fn release(mut self) -> TabulaResult<()> {
        self.released = true;
        self.holder.release()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.holder.release() {
                log::error!("Failed to release connection: {}", e);
            }
        }
    }
}
