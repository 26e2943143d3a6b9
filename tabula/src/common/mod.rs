//! Common types shared across the crate: values, rows, conversions and
//! small synchronization helpers.

mod constants;
mod convertible;
mod row;
mod util;
mod value;

pub use constants::*;
pub use convertible::*;
pub use row::*;
pub use util::*;
pub use value::*;
