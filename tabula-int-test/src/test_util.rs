use std::{env, fs};

use tabula::errors::TabulaResult;
use tabula::schema::{Column, Table};
use tabula::{make_storage, row, Record, Row, Storage};

#[derive(Clone)]
pub struct TestContext {
    path: String,
    storage: Storage,
}

impl TestContext {
    pub fn new(path: String, storage: Storage) -> Self {
        Self { path, storage }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn storage(&self) -> Storage {
        self.storage.clone()
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    let temp_dir = env::temp_dir();
    temp_dir
        .join(format!("{}.db", id))
        .to_string_lossy()
        .into_owned()
}

/// Opens a file storage on a fresh path bound to `tables`.
pub fn create_test_context(tables: Vec<Table>) -> TabulaResult<TestContext> {
    let path = random_path();
    let storage = make_storage(&path, tables)?;
    Ok(TestContext::new(path, storage))
}

pub fn cleanup(ctx: TestContext) -> TabulaResult<()> {
    let path = ctx.path.clone();
    drop(ctx);
    if fs::metadata(&path).is_ok() {
        log::debug!("Removing test database {}", path);
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// The two-column layout: one `name` column holding the full name.
pub fn legacy_users_table() -> Table {
    Table::new("users")
        .column(Column::integer("id").primary_key())
        .column(Column::text("name").not_null())
}

/// The current layout: the name split in two.
pub fn users_table() -> Table {
    Table::new("users")
        .column(Column::integer("id").primary_key())
        .column(Column::text("first_name").not_null().default_value(""))
        .column(Column::text("last_name").not_null().default_value(""))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyUser {
    pub id: i64,
    pub name: String,
}

impl LegacyUser {
    pub fn new(id: i64, name: &str) -> Self {
        LegacyUser {
            id,
            name: name.to_string(),
        }
    }
}

impl Record for LegacyUser {
    fn table_name() -> &'static str {
        "users"
    }

    fn to_row(&self) -> TabulaResult<Row> {
        Ok(row! { "id" => self.id, "name" => self.name.as_str() })
    }

    fn from_row(row: &Row) -> TabulaResult<Self> {
        Ok(LegacyUser {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn new(id: i64, first_name: &str, last_name: &str) -> Self {
        User {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }

    /// Splits a full name at its first space.
    pub fn from_legacy(legacy: &LegacyUser) -> Self {
        let (first_name, last_name) = legacy
            .name
            .split_once(' ')
            .unwrap_or((legacy.name.as_str(), ""));
        User::new(legacy.id, first_name, last_name)
    }
}

impl Record for User {
    fn table_name() -> &'static str {
        "users"
    }

    fn to_row(&self) -> TabulaResult<Row> {
        Ok(row! {
            "id" => self.id,
            "first_name" => self.first_name.as_str(),
            "last_name" => self.last_name.as_str(),
        })
    }

    fn from_row(row: &Row) -> TabulaResult<Self> {
        Ok(User {
            id: row.get("id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
        })
    }
}

/// Writes `users` in the legacy layout to the database at `path`, leaving
/// its version untouched.
pub fn seed_legacy_users(path: &str, users: &[LegacyUser]) -> TabulaResult<()> {
    let legacy = make_storage(path, vec![legacy_users_table()])?;
    legacy.sync_schema(false)?;
    for user in users {
        legacy.insert(user)?;
    }
    Ok(())
}

/// The rows used across migration scenarios.
pub fn sample_legacy_users() -> Vec<LegacyUser> {
    vec![LegacyUser::new(1, "Ann Lee"), LegacyUser::new(2, "Bo")]
}
