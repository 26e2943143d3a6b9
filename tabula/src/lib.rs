//! # Tabula - Embedded Table Store with Versioned Migrations
//!
//! Tabula stores rows in named tables inside a single database file (or in
//! memory) and lets an application evolve the layout of those tables across
//! versions while deciding exactly how existing rows are transformed.
//!
//! ## Key Features
//!
//! - **Schema-bound storages**: a [`Storage`] reads and writes through its own
//!   table definitions; two storages over one connection can see the same
//!   physical table through different layouts
//! - **Schema sync**: `sync_schema` creates, widens, narrows or recreates
//!   tables to match their definitions and reports what it did
//! - **Migrations**: callbacks registered for exact `(from, to)` version pairs,
//!   run by `migrate_to` with the connection held open for the whole call
//! - **Lazy connections**: file databases are opened on demand and written
//!   back when the last user releases them
//! - **Transactions**: snapshot-based commit and rollback
//!
//! ## Quick Start
//!
//! ```rust
//! use tabula::schema::{Column, Table};
//! use tabula::{make_storage, row};
//!
//! let storage = make_storage(
//!     ":memory:",
//!     vec![Table::new("users")
//!         .column(Column::integer("id").primary_key())
//!         .column(Column::text("name").not_null())],
//! )
//! .unwrap();
//!
//! storage.sync_schema(false).unwrap();
//! storage.insert_row("users", row! { "name" => "Ann Lee" }).unwrap();
//!
//! storage.register_migration(0, 1, |container| {
//!     let current = container.make_storage(Vec::new())?;
//!     current.pragma().set_user_version(1)
//! });
//! storage.migrate_to(1).unwrap();
//! assert_eq!(storage.pragma().user_version().unwrap(), 1);
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Cell values, rows and shared utilities
//! - [`connection`] - Physical database and reference-counted connections
//! - [`errors`] - Error types and result definitions
//! - [`migration`] - Migration registry and executor
//! - [`pragma`] - The persisted `user_version` counter
//! - [`schema`] - Column and table definitions, schema sync results
//! - [`storage`] - Schema-bound storages and the [`Record`] trait
//! - [`storage_builder`] - Builder for opening a storage
//! - [`storage_config`] - Storage settings

pub mod common;
pub mod connection;
pub mod errors;
pub mod migration;
pub mod pragma;
pub mod schema;
pub mod storage;
pub mod storage_builder;
pub mod storage_config;

pub use common::{Convertible, Row, Value, TABULA_VERSION};
pub use connection::{ConnectionContainer, ConnectionHolder};
pub use errors::{ErrorKind, TabulaError, TabulaResult};
pub use pragma::Pragma;
pub use storage::{Record, Storage, WeakStorage};
pub use storage_builder::StorageBuilder;

use schema::Table;

/// Opens a storage on `filename` bound to `tables`.
///
/// `:memory:` or an empty filename selects a memory database.
pub fn make_storage<I: IntoIterator<Item = Table>>(filename: &str, tables: I) -> TabulaResult<Storage> {
    Storage::builder().filename(filename).tables(tables).open()
}
