//! Physical connection management.
//!
//! A [`ConnectionHolder`] owns the physical [`Database`] and opens it lazily:
//! the database stays open while at least one party retains the holder. The
//! [`ConnectionContainer`] hands a live holder to migration callbacks so they
//! can mint storages over it.

mod container;
mod database;
mod holder;

pub use container::*;
pub use database::*;
pub use holder::*;
