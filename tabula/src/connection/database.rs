use crate::common::{Row, Value, INITIAL_USER_VERSION, TEMP_FILE_SUFFIX};
use crate::errors::{ErrorKind, TabulaError, TabulaResult};
use crate::schema::{Column, ColumnType, SyncSchemaResult, Table};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The physical contents of an open connection.
///
/// A database is the `user_version` counter plus every physical table,
/// independent of any storage's table definitions. File-backed connections
/// load it on open and write it back on close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    user_version: i32,
    tables: IndexMap<String, PhysicalTable>,
}

/// A physical table: its current column layout and its rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl PhysicalTable {
    fn new(columns: Vec<Column>) -> Self {
        PhysicalTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    fn primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(Column::is_primary_key)
    }

    fn find_by_key(&self, key_index: usize, key: &Value) -> Option<usize> {
        self.rows.iter().position(|row| &row[key_index] == key)
    }

    fn next_integer_key(&self, key_index: usize) -> Option<i64> {
        match self
            .rows
            .iter()
            .filter_map(|row| row[key_index].as_integer())
            .max()
        {
            Some(max) => max.checked_add(1),
            None => Some(1),
        }
    }

    /// Whether every row is as wide as the column list.
    fn is_well_formed(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.columns.len())
    }
}

impl Default for Database {
    fn default() -> Self {
        Database {
            user_version: INITIAL_USER_VERSION,
            tables: IndexMap::new(),
        }
    }
}

impl Database {
    pub fn user_version(&self) -> i32 {
        self.user_version
    }

    pub(crate) fn set_user_version(&mut self, version: i32) {
        self.user_version = version;
    }

    pub fn table(&self, name: &str) -> Option<&PhysicalTable> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Reads a database file. A missing or empty file is a new database.
    pub(crate) fn load(path: &Path) -> TabulaResult<Database> {
        if !path.exists() {
            log::debug!("Database file {:?} does not exist, starting empty", path);
            return Ok(Database::default());
        }

        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(Database::default());
        }

        let (database, _): (Database, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(|e| {
                log::error!("Failed to decode database file {:?}: {}", path, e);
                TabulaError::new_with_cause(
                    &format!("Database file {:?} is corrupted", path),
                    ErrorKind::FileCorrupted,
                    TabulaError::from(e),
                )
            })?;

        if let Some(name) = database
            .tables
            .iter()
            .find(|(_, table)| !table.is_well_formed())
            .map(|(name, _)| name)
        {
            log::error!("Table '{}' in {:?} has rows that do not match its columns", name, path);
            return Err(TabulaError::new(
                &format!("Database file {:?} is corrupted: malformed table '{}'", path, name),
                ErrorKind::FileCorrupted,
            ));
        }
        Ok(database)
    }

    /// Writes the database to `path` through a temporary file and a rename.
    pub(crate) fn save(&self, path: &Path) -> TabulaResult<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;

        let mut temp = PathBuf::from(path.as_os_str());
        temp.as_mut_os_string().push(TEMP_FILE_SUFFIX);

        fs::write(&temp, bytes)?;
        fs::rename(&temp, path)?;
        Ok(())
    }

    pub(crate) fn columns_of(&self, name: &str) -> Option<&[Column]> {
        self.tables.get(name).map(PhysicalTable::columns)
    }

    /// Makes the physical table match `declared` according to `result`.
    pub(crate) fn apply_sync(&mut self, declared: &Table, result: SyncSchemaResult) {
        match result {
            SyncSchemaResult::AlreadyInSync => {}
            SyncSchemaResult::NewTableCreated | SyncSchemaResult::DroppedAndRecreated => {
                self.tables.insert(
                    declared.name().to_string(),
                    PhysicalTable::new(declared.columns().to_vec()),
                );
            }
            SyncSchemaResult::NewColumnsAdded
            | SyncSchemaResult::OldColumnsRemoved
            | SyncSchemaResult::NewColumnsAddedAndOldColumnsRemoved => {
                if let Some(table) = self.tables.get_mut(declared.name()) {
                    let sources: Vec<Option<usize>> = declared
                        .columns()
                        .iter()
                        .map(|c| table.column_index(c.name()))
                        .collect();

                    let rows = std::mem::take(&mut table.rows)
                        .into_iter()
                        .map(|row| {
                            declared
                                .columns()
                                .iter()
                                .zip(&sources)
                                .map(|(column, source)| match source {
                                    Some(index) => row[*index].clone(),
                                    None => column.fill_value(),
                                })
                                .collect()
                        })
                        .collect();

                    table.columns = declared.columns().to_vec();
                    table.rows = rows;
                }
            }
        }
    }

    pub(crate) fn drop_table(&mut self, name: &str) -> TabulaResult<()> {
        match self.tables.shift_remove(name) {
            Some(_) => Ok(()),
            None => Err(table_not_found(name)),
        }
    }

    pub(crate) fn rename_table(&mut self, old_name: &str, new_name: &str) -> TabulaResult<()> {
        if self.tables.contains_key(new_name) {
            log::error!("Cannot rename '{}', table '{}' already exists", old_name, new_name);
            return Err(TabulaError::new(
                &format!("Table '{}' already exists", new_name),
                ErrorKind::InvalidOperation,
            ));
        }
        match self.tables.shift_remove(old_name) {
            Some(table) => {
                self.tables.insert(new_name.to_string(), table);
                Ok(())
            }
            None => Err(table_not_found(old_name)),
        }
    }

    pub(crate) fn read_rows(&self, view: &Table) -> TabulaResult<Vec<Row>> {
        let table = self.physical(view)?;
        let projection = projection(view, table)?;
        Ok(table
            .rows
            .iter()
            .map(|row| project(view, &projection, row))
            .collect())
    }

    pub(crate) fn find_row(&self, view: &Table, key: &Value) -> TabulaResult<Option<Row>> {
        let table = self.physical(view)?;
        let projection = projection(view, table)?;
        let key_index = view_key_index(view, table)?;
        Ok(table
            .find_by_key(key_index, key)
            .map(|position| project(view, &projection, &table.rows[position])))
    }

    pub(crate) fn count_rows(&self, view: &Table) -> TabulaResult<usize> {
        let table = self.physical(view)?;
        projection(view, table)?;
        Ok(table.len())
    }

    /// Appends `row`, returning its primary key or its 1-based position.
    pub(crate) fn insert_row(&mut self, view: &Table, row: Row) -> TabulaResult<i64> {
        let table = self.physical_mut(view)?;
        let values = build_row(view, table, row, None)?;

        if let Some(key_index) = table.primary_key_index() {
            if table.find_by_key(key_index, &values[key_index]).is_some() {
                return Err(duplicate_key(view, &values[key_index]));
            }
        }

        let row_id = row_id(table, &values, table.len() + 1);
        table.rows.push(values);
        Ok(row_id)
    }

    /// Inserts `row`, replacing the row with the same primary key if any.
    pub(crate) fn replace_row(&mut self, view: &Table, row: Row) -> TabulaResult<i64> {
        let table = self.physical_mut(view)?;
        let existing = match view.primary_key() {
            Some(key) => {
                let key_index = view_key_index(view, table)?;
                match row.get_value(key.name()) {
                    Some(value) if !value.is_null() => table.find_by_key(key_index, value),
                    _ => None,
                }
            }
            None => None,
        };

        match existing {
            Some(position) => {
                let base = table.rows[position].clone();
                let values = build_row(view, table, row, Some(&base))?;
                let row_id = row_id(table, &values, position + 1);
                table.rows[position] = values;
                Ok(row_id)
            }
            None => self.insert_row(view, row),
        }
    }

    pub(crate) fn update_row(&mut self, view: &Table, row: Row) -> TabulaResult<()> {
        let table = self.physical_mut(view)?;
        let key_index = view_key_index(view, table)?;
        let key = view
            .primary_key()
            .and_then(|c| row.get_value(c.name()))
            .cloned()
            .unwrap_or(Value::Null);

        match table.find_by_key(key_index, &key) {
            Some(position) if !key.is_null() => {
                let base = table.rows[position].clone();
                let values = build_row(view, table, row, Some(&base))?;
                table.rows[position] = values;
                Ok(())
            }
            _ => {
                log::error!("No row with key {} in table '{}'", key, view.name());
                Err(TabulaError::new(
                    &format!("No row with key {} in table '{}'", key, view.name()),
                    ErrorKind::NotFound,
                ))
            }
        }
    }

    pub(crate) fn remove_row(&mut self, view: &Table, key: &Value) -> TabulaResult<bool> {
        let table = self.physical_mut(view)?;
        let key_index = view_key_index(view, table)?;
        match table.find_by_key(key_index, key) {
            Some(position) => {
                table.rows.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn clear_rows(&mut self, view: &Table) -> TabulaResult<usize> {
        let table = self.physical_mut(view)?;
        projection(view, table)?;
        let removed = table.rows.len();
        table.rows.clear();
        Ok(removed)
    }

    fn physical(&self, view: &Table) -> TabulaResult<&PhysicalTable> {
        self.tables
            .get(view.name())
            .ok_or_else(|| table_not_found(view.name()))
    }

    fn physical_mut(&mut self, view: &Table) -> TabulaResult<&mut PhysicalTable> {
        self.tables
            .get_mut(view.name())
            .ok_or_else(|| table_not_found(view.name()))
    }
}

/// Maps every view column to its physical position.
fn projection(view: &Table, table: &PhysicalTable) -> TabulaResult<Vec<usize>> {
    view.columns()
        .iter()
        .map(|column| match table.column_index(column.name()) {
            Some(index) if table.columns[index].column_type() == column.column_type() => Ok(index),
            Some(index) => {
                log::error!(
                    "Column '{}.{}' is {} but stored as {}",
                    view.name(),
                    column.name(),
                    column.column_type(),
                    table.columns[index].column_type()
                );
                Err(TabulaError::new(
                    &format!(
                        "Column '{}.{}' is declared {} but stored as {}",
                        view.name(),
                        column.name(),
                        column.column_type(),
                        table.columns[index].column_type()
                    ),
                    ErrorKind::SchemaMismatch,
                ))
            }
            None => {
                log::error!("Column '{}.{}' does not exist", view.name(), column.name());
                Err(TabulaError::new(
                    &format!("Column '{}.{}' does not exist", view.name(), column.name()),
                    ErrorKind::SchemaMismatch,
                ))
            }
        })
        .collect()
}

fn project(view: &Table, projection: &[usize], row: &[Value]) -> Row {
    view.columns()
        .iter()
        .zip(projection)
        .map(|(column, index)| (column.name().to_string(), row[*index].clone()))
        .collect()
}

fn view_key_index(view: &Table, table: &PhysicalTable) -> TabulaResult<usize> {
    let key = view.primary_key().ok_or_else(|| {
        log::error!("Table '{}' has no primary key", view.name());
        TabulaError::new(
            &format!("Table '{}' has no primary key", view.name()),
            ErrorKind::InvalidOperation,
        )
    })?;

    table.column_index(key.name()).ok_or_else(|| {
        TabulaError::new(
            &format!("Column '{}.{}' does not exist", view.name(), key.name()),
            ErrorKind::SchemaMismatch,
        )
    })
}

/// Lays `row` out in physical column order.
///
/// Columns the view does not declare keep their value from `base`, or get
/// their default on a new row.
fn build_row(
    view: &Table,
    table: &PhysicalTable,
    mut row: Row,
    base: Option<&[Value]>,
) -> TabulaResult<Vec<Value>> {
    projection(view, table)?;

    if let Some(unknown) = row
        .column_names()
        .into_iter()
        .find(|name| view.find_column(name).is_none())
    {
        log::error!("Column '{}' is not declared in table '{}'", unknown, view.name());
        return Err(TabulaError::new(
            &format!("Column '{}' is not declared in table '{}'", unknown, view.name()),
            ErrorKind::SchemaMismatch,
        ));
    }

    let mut values = Vec::with_capacity(table.columns.len());
    for (index, physical) in table.columns.iter().enumerate() {
        let value = match view.find_column(physical.name()) {
            Some(declared) => match row.remove(physical.name()) {
                Some(value) => value,
                None => declared.fill_value(),
            },
            None => match base {
                Some(base) => base[index].clone(),
                None => physical.fill_value(),
            },
        };

        if !physical.column_type().accepts(&value) {
            log::error!(
                "Value {} does not fit column '{}.{}' of type {}",
                value,
                view.name(),
                physical.name(),
                physical.column_type()
            );
            return Err(TabulaError::new(
                &format!(
                    "Value of type {} does not fit column '{}.{}' of type {}",
                    value.type_name(),
                    view.name(),
                    physical.name(),
                    physical.column_type()
                ),
                ErrorKind::InvalidDataType,
            ));
        }
        values.push(value);
    }

    if let Some(key_index) = table.primary_key_index() {
        let key = &table.columns[key_index];
        if values[key_index].is_null() && key.column_type() == ColumnType::Integer {
            let next = table.next_integer_key(key_index).ok_or_else(|| {
                log::error!("No integer key left for column '{}.{}'", view.name(), key.name());
                TabulaError::new(
                    &format!("No integer key left for column '{}.{}'", view.name(), key.name()),
                    ErrorKind::InvalidDataType,
                )
            })?;
            values[key_index] = Value::Integer(next);
        }
    }

    for (physical, value) in table.columns.iter().zip(&values) {
        if value.is_null() && (physical.is_not_null() || physical.is_primary_key()) {
            log::error!("Column '{}.{}' requires a value", view.name(), physical.name());
            return Err(TabulaError::new(
                &format!("Column '{}.{}' requires a value", view.name(), physical.name()),
                ErrorKind::MissingRequiredField,
            ));
        }
    }

    Ok(values)
}

fn row_id(table: &PhysicalTable, values: &[Value], position: usize) -> i64 {
    table
        .primary_key_index()
        .and_then(|index| values[index].as_integer())
        .unwrap_or(position as i64)
}

fn table_not_found(name: &str) -> TabulaError {
    log::error!("Table '{}' does not exist", name);
    TabulaError::new(
        &format!("Table '{}' does not exist", name),
        ErrorKind::TableNotFound,
    )
}

fn duplicate_key(view: &Table, key: &Value) -> TabulaError {
    log::error!("Duplicate key {} in table '{}'", key, view.name());
    TabulaError::new(
        &format!("Key {} already exists in table '{}'", key, view.name()),
        ErrorKind::UniqueConstraintViolation,
    )
}
