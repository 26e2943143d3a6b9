use crate::schema::{Column, Table};
use std::fmt::{Display, Formatter};

/// Outcome of synchronizing one declared table with its physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncSchemaResult {
    /// The table did not exist and was created.
    NewTableCreated,
    /// The table already matched its definition.
    AlreadyInSync,
    /// Columns were appended and existing rows kept.
    NewColumnsAdded,
    /// Stale columns were removed and the remaining data kept.
    OldColumnsRemoved,
    /// Columns were both appended and removed; shared-column data kept.
    NewColumnsAddedAndOldColumnsRemoved,
    /// The table was dropped and created again empty.
    DroppedAndRecreated,
}

impl Display for SyncSchemaResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncSchemaResult::NewTableCreated => write!(f, "new table created"),
            SyncSchemaResult::AlreadyInSync => write!(f, "table and storage is already in sync."),
            SyncSchemaResult::NewColumnsAdded => write!(f, "new columns added"),
            SyncSchemaResult::OldColumnsRemoved => write!(f, "old excess columns removed"),
            SyncSchemaResult::NewColumnsAddedAndOldColumnsRemoved => {
                write!(f, "old excess columns removed and new columns added")
            }
            SyncSchemaResult::DroppedAndRecreated => write!(f, "old table dropped and recreated"),
        }
    }
}

/// Decides how `declared` has to be applied to the physical columns.
///
/// `existing` is `None` when the physical table is absent. With
/// `preserve` unset, any removed column forces a drop and recreate.
pub(crate) fn plan(declared: &Table, existing: Option<&[Column]>, preserve: bool) -> SyncSchemaResult {
    let existing = match existing {
        Some(columns) => columns,
        None => return SyncSchemaResult::NewTableCreated,
    };

    let mut added = Vec::new();
    for column in declared.columns() {
        match existing.iter().find(|c| c.name() == column.name()) {
            Some(physical) if physical != column => {
                return SyncSchemaResult::DroppedAndRecreated;
            }
            Some(_) => {}
            None => added.push(column),
        }
    }

    if added.iter().any(|c| !c.can_be_added()) {
        return SyncSchemaResult::DroppedAndRecreated;
    }

    let removed = existing
        .iter()
        .filter(|c| declared.find_column(c.name()).is_none())
        .count();

    match (added.is_empty(), removed == 0) {
        (true, true) => SyncSchemaResult::AlreadyInSync,
        (false, true) => SyncSchemaResult::NewColumnsAdded,
        (_, false) if !preserve => SyncSchemaResult::DroppedAndRecreated,
        (true, false) => SyncSchemaResult::OldColumnsRemoved,
        (false, false) => SyncSchemaResult::NewColumnsAddedAndOldColumnsRemoved,
    }
}
