use tabula::errors::{ErrorKind, TabulaResult};
use tabula::schema::{Column, SyncSchemaResult, Table};
use tabula::{make_storage, row, Storage};
use tabula_int_test::test_util::{
    cleanup, create_test_context, legacy_users_table, random_path, sample_legacy_users,
    seed_legacy_users, users_table, LegacyUser, User,
};

// ==================== Schema Sync Tests ====================

#[test]
fn test_sync_creates_missing_table() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();

    let results = storage.sync_schema(false)?;
    assert_eq!(results["users"], SyncSchemaResult::NewTableCreated);
    assert_eq!(storage.table_names()?, vec!["users"]);

    let again = storage.sync_schema(true)?;
    assert_eq!(again["users"], SyncSchemaResult::AlreadyInSync);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_sync_adds_columns_and_keeps_rows() -> TabulaResult<()> {
    let ctx = create_test_context(vec![legacy_users_table()
        .column(Column::text("email"))
        .column(Column::integer("age").not_null().default_value(18))])?;
    seed_legacy_users(ctx.path(), &sample_legacy_users())?;
    let storage = ctx.storage();

    let results = storage.sync_schema(false)?;
    assert_eq!(results["users"], SyncSchemaResult::NewColumnsAdded);

    let rows = storage.rows("users")?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get::<String>("name")?, "Ann Lee");
    assert_eq!(rows[0].get::<Option<String>>("email")?, None);
    assert_eq!(rows[1].get::<i64>("age")?, 18);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_sync_without_preserve_drops_removed_columns_data() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    seed_legacy_users(ctx.path(), &sample_legacy_users())?;
    let storage = ctx.storage();

    let planned = storage.sync_schema_simulate(false)?;
    assert_eq!(planned["users"], SyncSchemaResult::DroppedAndRecreated);
    assert_eq!(storage.rows("users").unwrap_err().kind(), &ErrorKind::SchemaMismatch);

    storage.sync_schema(false)?;
    assert_eq!(storage.count::<User>()?, 0);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_sync_with_preserve_keeps_shared_columns() -> TabulaResult<()> {
    let narrow = Table::new("users").column(Column::integer("id").primary_key());
    let ctx = create_test_context(vec![narrow])?;
    seed_legacy_users(ctx.path(), &sample_legacy_users())?;
    let storage = ctx.storage();

    let results = storage.sync_schema(true)?;
    assert_eq!(results["users"], SyncSchemaResult::OldColumnsRemoved);

    let ids: Vec<i64> = storage
        .rows("users")?
        .iter()
        .map(|row| row.get("id"))
        .collect::<TabulaResult<_>>()?;
    assert_eq!(ids, vec![1, 2]);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_sync_with_preserve_adds_and_removes() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    seed_legacy_users(ctx.path(), &sample_legacy_users())?;
    let storage = ctx.storage();

    let results = storage.sync_schema(true)?;
    assert_eq!(
        results["users"],
        SyncSchemaResult::NewColumnsAddedAndOldColumnsRemoved
    );
    assert_eq!(
        storage.get_all::<User>()?,
        vec![User::new(1, "", ""), User::new(2, "", "")]
    );

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_sync_never_changes_version() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();
    storage.pragma().set_user_version(4)?;
    storage.sync_schema(false)?;
    assert_eq!(storage.pragma().user_version()?, 4);

    drop(storage);
    cleanup(ctx)
}

// ==================== Persistence Tests ====================

#[test]
fn test_rows_survive_reopen() -> TabulaResult<()> {
    let path = random_path();
    seed_legacy_users(&path, &sample_legacy_users())?;

    let reopened = make_storage(&path, vec![legacy_users_table()])?;
    assert!(!reopened.is_opened());
    assert_eq!(reopened.get_all::<LegacyUser>()?, sample_legacy_users());
    assert_eq!(reopened.get::<LegacyUser>(2)?, LegacyUser::new(2, "Bo"));

    drop(reopened);
    std::fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn test_open_forever_writes_on_drop() -> TabulaResult<()> {
    let path = random_path();
    let storage = Storage::builder()
        .filename(&path)
        .open_forever(true)
        .table(legacy_users_table())
        .open()?;
    storage.sync_schema(false)?;
    storage.insert(&LegacyUser::new(1, "Ann Lee"))?;
    assert_eq!(storage.connection().open_count(), 1);
    drop(storage);

    let reopened = make_storage(&path, vec![legacy_users_table()])?;
    assert_eq!(reopened.count::<LegacyUser>()?, 1);

    drop(reopened);
    std::fs::remove_file(&path)?;
    Ok(())
}

// ==================== Row Tests ====================

#[test]
fn test_crud_through_records() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();
    storage.sync_schema(false)?;

    storage.insert(&User::new(1, "Ann", "Lee"))?;
    storage.insert(&User::new(2, "Bo", ""))?;
    storage.update(&User::new(2, "Bo", "Ray"))?;
    storage.replace(&User::new(3, "Cy", "Doe"))?;

    assert_eq!(storage.count::<User>()?, 3);
    assert_eq!(storage.get::<User>(2)?.last_name, "Ray");
    assert!(storage.remove::<User>(1)?);
    assert!(storage.get_optional::<User>(1)?.is_none());
    assert_eq!(storage.remove_all::<User>()?, 2);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_row_errors() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();
    storage.sync_schema(false)?;
    storage.insert(&User::new(1, "Ann", "Lee"))?;

    assert_eq!(
        storage.insert(&User::new(1, "Ann", "Lee")).unwrap_err().kind(),
        &ErrorKind::UniqueConstraintViolation
    );
    assert_eq!(
        storage.update(&User::new(9, "No", "One")).unwrap_err().kind(),
        &ErrorKind::NotFound
    );
    assert_eq!(
        storage.get::<User>(9).unwrap_err().kind(),
        &ErrorKind::NotFound
    );
    assert_eq!(
        storage.get_all::<LegacyUser>().unwrap_err().kind(),
        &ErrorKind::MissingRequiredField
    );
    assert_eq!(
        storage
            .insert_row("users", row! { "id" => "two" })
            .unwrap_err()
            .kind(),
        &ErrorKind::InvalidDataType
    );
    assert_eq!(
        storage.insert_row("orders", row! { "id" => 1 }).unwrap_err().kind(),
        &ErrorKind::TableNotFound
    );

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_autoincrement_keys() -> TabulaResult<()> {
    let notes = Table::new("notes")
        .column(Column::integer("id").autoincrement())
        .column(Column::text("body"));
    let ctx = create_test_context(vec![notes])?;
    let storage = ctx.storage();
    storage.sync_schema(false)?;

    assert_eq!(storage.insert_row("notes", row! { "body" => "first" })?, 1);
    assert_eq!(storage.insert_row("notes", row! { "id" => 10, "body" => "jump" })?, 10);
    assert_eq!(storage.insert_row("notes", row! { "body" => "next" })?, 11);

    drop(storage);
    cleanup(ctx)
}

// ==================== Transaction Tests ====================

#[test]
fn test_transaction_commit_persists() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();
    storage.sync_schema(false)?;

    storage.transaction(|tx| {
        tx.insert(&User::new(1, "Ann", "Lee"))?;
        tx.pragma().set_user_version(2)
    })?;
    assert!(!storage.is_opened());

    let reopened = make_storage(ctx.path(), vec![users_table()])?;
    assert_eq!(reopened.count::<User>()?, 1);
    assert_eq!(reopened.pragma().user_version()?, 2);

    drop(reopened);
    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_transaction_keeps_file_open() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();
    storage.sync_schema(false)?;
    let opens = storage.connection().open_count();

    storage.begin_transaction()?;
    storage.insert(&User::new(1, "Ann", "Lee"))?;
    storage.insert(&User::new(2, "Bo", ""))?;
    assert!(storage.is_opened());
    storage.rollback()?;

    assert_eq!(storage.connection().open_count(), opens + 1);
    assert_eq!(storage.count::<User>()?, 0);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_rename_table() -> TabulaResult<()> {
    let ctx = create_test_context(vec![users_table()])?;
    let storage = ctx.storage();
    storage.sync_schema(false)?;
    storage.rename_table("users", "users_v0")?;

    assert!(!storage.table_exists("users")?);
    assert_eq!(
        storage.sync_schema(false)?["users"],
        SyncSchemaResult::NewTableCreated
    );
    assert_eq!(
        storage.rename_table("users", "users_v0").unwrap_err().kind(),
        &ErrorKind::InvalidOperation
    );

    drop(storage);
    cleanup(ctx)
}
