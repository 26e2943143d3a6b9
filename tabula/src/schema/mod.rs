//! Table definitions and schema synchronization.
//!
//! A [`Schema`] is the set of [`Table`] definitions a storage is bound to.
//! Two storages sharing one connection may carry different schemas for the
//! same physical table; this is how migrations read legacy rows.
//!
//! [`SyncSchemaResult`] reports what `Storage::sync_schema` did (or would do)
//! to each table to make the physical layout match the definition.

mod column;
mod schema;
mod sync;
mod table;

pub use column::*;
pub use schema::*;
pub use sync::*;
pub use table::*;
