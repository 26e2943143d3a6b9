//! Version-driven schema migrations.
//!
//! The persisted `user_version` says which layout the data is in. A migration
//! is a callback registered for an exact `(from, to)` pair; calling
//! `migrate_to(target)` runs the callback registered for the current version
//! and `target`, if there is one.
//!
//! The callback receives a [`ConnectionContainer`] over the live connection.
//! It typically builds one storage with the legacy tables to read the old rows,
//! syncs the current tables, writes the transformed rows and finally sets the
//! new version:
//!
//! ```rust,ignore
//! use tabula::schema::{Column, Table};
//! use tabula::{row, Storage};
//!
//! let storage = Storage::builder()
//!     .filename("people.db")
//!     .table(
//!         Table::new("users")
//!             .column(Column::integer("id").primary_key())
//!             .column(Column::text("full_name").default_value("")),
//!     )
//!     .open()?;
//!
//! let current = storage.downgrade();
//! storage.register_migration(0, 1, move |container| {
//!     let legacy = container.make_storage(vec![Table::new("users")
//!         .column(Column::integer("id").primary_key())
//!         .column(Column::text("name"))])?;
//!     let rows = legacy.rows("users")?;
//!
//!     let current = current.upgrade()?;
//!     current.sync_schema(false)?;
//!     for row in rows {
//!         let id: i64 = row.get("id")?;
//!         let name: String = row.get("name")?;
//!         current.insert_row("users", row! { "id" => id, "full_name" => name })?;
//!     }
//!     current.pragma().set_user_version(1)
//! });
//!
//! storage.migrate_to(1)?;
//! assert_eq!(storage.pragma().user_version()?, 1);
//! ```
//!
//! [`ConnectionContainer`]: crate::connection::ConnectionContainer

mod manager;
mod registry;

pub use manager::MigrationManager;
pub use registry::*;
