//! Schema-bound access to a connection.

mod record;
mod storage;

pub use record::*;
pub use storage::*;
