use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tabula::errors::{ErrorKind, TabulaError, TabulaResult};
use tabula::schema::SyncSchemaResult;
use tabula::{make_storage, Storage};
use tabula_int_test::test_util::{
    cleanup, create_test_context, legacy_users_table, random_path, sample_legacy_users,
    seed_legacy_users, users_table, LegacyUser, TestContext, User,
};

// ==================== Helper Functions ====================

/// Opens the current-layout storage over a database seeded with legacy rows.
fn legacy_context() -> TabulaResult<TestContext> {
    let ctx = create_test_context(vec![users_table()])?;
    seed_legacy_users(ctx.path(), &sample_legacy_users())?;
    Ok(ctx)
}

/// Registers the `0 -> 1` migration that splits `name` into two columns.
fn register_split_name(storage: &Storage) {
    let current = storage.downgrade();
    storage.register_migration(0, 1, move |container| {
        let legacy = container.make_storage(vec![legacy_users_table()])?;
        let old_users: Vec<LegacyUser> = legacy.get_all()?;

        let current = current.upgrade()?;
        current.sync_schema(false)?;
        for old in &old_users {
            current.insert(&User::from_legacy(old))?;
        }
        current.pragma().set_user_version(1)
    });
}

fn counting(calls: &Arc<AtomicUsize>) -> impl Fn(&tabula::ConnectionContainer) -> TabulaResult<()> {
    let calls = Arc::clone(calls);
    move |_container| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==================== End-to-end Tests ====================

#[test]
fn test_split_name_migration() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    register_split_name(&storage);

    assert_eq!(storage.pragma().user_version()?, 0);
    storage.migrate_to(1)?;

    assert_eq!(storage.pragma().user_version()?, 1);
    assert_eq!(
        storage.get_all::<User>()?,
        vec![User::new(1, "Ann", "Lee"), User::new(2, "Bo", "")]
    );

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_migrated_data_survives_reopen() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    register_split_name(&storage);
    storage.migrate_to(1)?;
    drop(storage);

    let reopened = make_storage(ctx.path(), vec![users_table()])?;
    assert_eq!(reopened.pragma().user_version()?, 1);
    assert_eq!(reopened.count::<User>()?, 2);
    assert_eq!(
        reopened.sync_schema_simulate(false)?["users"],
        SyncSchemaResult::AlreadyInSync
    );

    drop(reopened);
    cleanup(ctx)
}

#[test]
fn test_legacy_view_reads_old_layout() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));

    let recorder = Arc::clone(&seen);
    storage.register_migration(0, 1, move |container| {
        let legacy = container.make_storage(vec![legacy_users_table()])?;
        for row in legacy.rows("users")? {
            let columns = row.column_names().iter().map(|c| c.to_string()).collect();
            recorder.lock().unwrap().push(columns);
        }
        let users: Vec<LegacyUser> = legacy.get_all()?;
        assert_eq!(users, sample_legacy_users());
        Ok(())
    });

    storage.migrate_to(1)?;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|columns| columns == &vec!["id", "name"]));
    assert_eq!(storage.schema().table("users").unwrap().columns().len(), 3);

    drop(storage);
    cleanup(ctx)
}

// ==================== Registry Semantics Tests ====================

#[test]
fn test_last_registration_wins() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    storage.register_migration(0, 1, counting(&first));
    storage.register_migration(0, 1, counting(&second));
    storage.migrate_to(1)?;

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_missing_migration_leaves_store_untouched() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    register_split_name(&storage);
    storage.register_migration(1, 2, |_container| Ok(()));

    let err = storage.migrate_to(2).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationNotFound { from: 0, to: 2 });
    assert_eq!(storage.pragma().user_version()?, 0);

    let legacy = make_storage(ctx.path(), vec![legacy_users_table()])?;
    assert_eq!(legacy.get_all::<LegacyUser>()?, sample_legacy_users());

    drop(legacy);
    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_callback_invoked_exactly_once() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    let calls = Arc::new(AtomicUsize::new(0));
    storage.register_migration(0, 1, counting(&calls));

    storage.migrate_to(1)?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_repeat_migration_needs_identity_entry() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    register_split_name(&storage);
    storage.migrate_to(1)?;

    let err = storage.migrate_to(1).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationNotFound { from: 1, to: 1 });

    let calls = Arc::new(AtomicUsize::new(0));
    storage.register_migration(1, 1, counting(&calls));
    storage.migrate_to(1)?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(storage.count::<User>()?, 2);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_no_chaining_through_intermediate_versions() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    storage.register_migration(0, 1, |_container| Ok(()));
    storage.register_migration(1, 2, |_container| Ok(()));

    let err = storage.migrate_to(2).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MigrationNotFound { from: 0, to: 2 });

    drop(storage);
    cleanup(ctx)
}

// ==================== Connection Tests ====================

#[test]
fn test_connection_stays_open_during_callback() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    let connection = storage.connection();
    let opens_before = connection.open_count();
    let observations: Arc<Mutex<Vec<(bool, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let watched = Arc::clone(&connection);
    let recorder = Arc::clone(&observations);
    storage.register_migration(0, 1, move |container| {
        recorder
            .lock()
            .unwrap()
            .push((watched.is_open(), watched.open_count()));

        let legacy = container.make_storage(vec![legacy_users_table()])?;
        let _users: Vec<LegacyUser> = legacy.get_all()?;
        drop(legacy);

        let current = container.make_storage(vec![users_table()])?;
        current.sync_schema(false)?;
        drop(current);

        recorder
            .lock()
            .unwrap()
            .push((container.is_open(), watched.open_count()));
        Ok(())
    });

    assert!(!connection.is_open());
    storage.migrate_to(1)?;

    let observations = observations.lock().unwrap();
    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0], (true, opens_before + 1));
    assert_eq!(observations[1], (true, opens_before + 1));
    assert!(!connection.is_open());
    assert_eq!(connection.retain_count(), 0);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_container_views_share_connection() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    let shared = Arc::new(AtomicUsize::new(0));

    let outer = storage.downgrade();
    let counter = Arc::clone(&shared);
    storage.register_migration(0, 1, move |container| {
        let legacy = container.make_storage(vec![legacy_users_table()])?;
        let current = container.make_storage(vec![users_table()])?;
        let outer = outer.upgrade()?;
        for view in [&legacy, &current, &outer] {
            if container.shares_connection_with(view) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    });

    storage.migrate_to(1)?;
    assert_eq!(shared.load(Ordering::SeqCst), 3);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_open_failure_surfaces_before_lookup() -> TabulaResult<()> {
    let path = random_path();
    let storage = make_storage(&path, vec![users_table()])?;
    fs::write(&path, [0xff_u8; 32])?;

    let calls = Arc::new(AtomicUsize::new(0));
    storage.register_migration(0, 1, counting(&calls));

    let err = storage.migrate_to(1).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::FileCorrupted);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(storage.connection().retain_count(), 0);

    drop(storage);
    fs::remove_file(&path)?;
    Ok(())
}

// ==================== Failure Tests ====================

#[test]
fn test_callback_error_propagates_unchanged() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    storage.register_migration(0, 1, |container| {
        let current = container.make_storage(vec![users_table()])?;
        current.sync_schema(false)?;
        current.insert(&User::new(1, "Ann", "Lee"))?;
        Err(TabulaError::new("split failed on row 2", ErrorKind::ValidationError))
    });

    let err = storage.migrate_to(1).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ValidationError);
    assert_eq!(err.message(), "split failed on row 2");

    assert_eq!(storage.pragma().user_version()?, 0);
    assert_eq!(storage.get_all::<User>()?, vec![User::new(1, "Ann", "Lee")]);

    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_callback_transaction_rolls_back_its_writes() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    storage.register_migration(0, 1, |container| {
        let current = container.make_storage(vec![users_table()])?;
        current.transaction(|tx| {
            tx.sync_schema(false)?;
            tx.insert(&User::new(1, "Ann", "Lee"))?;
            tx.insert(&User::new(1, "Ann", "Lee"))?;
            tx.pragma().set_user_version(1)
        })
    });

    let err = storage.migrate_to(1).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
    assert_eq!(storage.pragma().user_version()?, 0);

    let legacy = make_storage(ctx.path(), vec![legacy_users_table()])?;
    assert_eq!(legacy.get_all::<LegacyUser>()?, sample_legacy_users());

    drop(legacy);
    drop(storage);
    cleanup(ctx)
}

#[test]
fn test_weak_handle_expires_with_last_storage() -> TabulaResult<()> {
    let ctx = legacy_context()?;
    let storage = ctx.storage();
    register_split_name(&storage);
    let weak = storage.downgrade();

    drop(storage);
    let storage = weak.upgrade()?;
    storage.migrate_to(1)?;
    assert_eq!(storage.pragma().user_version()?, 1);

    drop(storage);
    let path = ctx.path().to_string();
    drop(ctx);
    assert_eq!(
        weak.upgrade().unwrap_err().kind(),
        &ErrorKind::StoreAlreadyClosed
    );
    fs::remove_file(path)?;
    Ok(())
}
