/// Crate version recorded in log lines and diagnostics.
pub const TABULA_VERSION: &str = env!("CARGO_PKG_VERSION");

// connection constants
pub const MEMORY_FILENAME: &str = ":memory:";
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

// pragma constants
pub const INITIAL_USER_VERSION: i32 = 0;
