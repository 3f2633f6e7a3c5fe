use flatdb::auth::{default_users_path, Permission, PermissionGate, UserStore};
use flatdb::backup;
use flatdb::{Engine, EngineConfig, Error, Value};
use std::fs;

#[test]
fn test_bootstrap_and_grants() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("corp.dbf");
    let mut engine = Engine::open(EngineConfig::new(&catalog)).unwrap();
    assert!(default_users_path(&catalog).is_file());

    // bootstrap statements pass with nobody logged in
    assert_eq!(
        engine
            .execute_one("CREATE USER clerk IDENTIFIED BY 's3cret'")
            .unwrap()
            .message
            .as_deref(),
        Some("User 'clerk' created successfully")
    );
    assert_eq!(
        engine
            .execute_one("GRANT CREATE_TABLE, INSERT, SELECT TO clerk")
            .unwrap()
            .message
            .as_deref(),
        Some("Permissions granted to clerk successfully")
    );
    assert!(matches!(
        engine.execute_one("SELECT * FROM anything"),
        Err(Error::PermissionDenied(_))
    ));

    assert!(matches!(
        engine.login("clerk", "wrong"),
        Err(Error::InvalidCredentials(_))
    ));
    engine.login("clerk", "s3cret").unwrap();
    assert_eq!(engine.current_user(), Some("clerk"));

    engine.execute_one("CREATE TABLE notes (id INT)").unwrap();
    engine.execute_one("INSERT INTO notes VALUES (1)").unwrap();
    assert!(matches!(
        engine.execute_one("DELETE FROM notes"),
        Err(Error::PermissionDenied(_))
    ));
    assert!(matches!(
        engine.execute_one("DROP USER admin"),
        Err(Error::PermissionDenied(_))
    ));

    assert!(matches!(
        engine.execute_one("REVOKE SELECT FROM clerk"),
        Err(Error::PermissionDenied(_))
    ));
    engine.logout();
    assert_eq!(engine.current_user(), None);

    engine.login("ADMIN", "admin").unwrap();
    assert_eq!(
        engine
            .execute_one("REVOKE SELECT FROM clerk")
            .unwrap()
            .message
            .as_deref(),
        Some("Permissions revoked from clerk successfully")
    );
    assert!(matches!(
        engine.execute_one("GRANT FLY TO clerk"),
        Err(Error::ValidationError(_))
    ));
    assert!(matches!(
        engine.execute_one("GRANT SELECT TO nobody"),
        Err(Error::UserNotFound(_))
    ));
}

#[test]
fn test_user_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");

    {
        let mut store = UserStore::open(&path).unwrap();
        store.create_user("Reader", "pw").unwrap();
        store.grant("reader", &[Permission::Select]).unwrap();
        assert!(matches!(
            store.create_user("READER", "x"),
            Err(Error::UserAlreadyExists(_))
        ));
    }

    let json = fs::read_to_string(&path).unwrap();
    assert!(json.contains("\"users\""));
    assert!(json.contains("\"SELECT\""));

    let mut store = UserStore::open(&path).unwrap();
    assert!(store.has_permission("reader", Permission::Select));
    assert!(!store.has_permission("reader", Permission::Insert));
    assert!(store.has_permission("admin", Permission::DropTable));

    store.login("reader", "pw").unwrap();
    store.drop_user("reader").unwrap();
    assert_eq!(store.current_user(), None);
    assert!(store.user("reader").is_none());
}

#[test]
fn test_corrupt_user_file_reseeds_admin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.json");
    fs::write(&path, "{ not json").unwrap();

    let store = UserStore::open(&path).unwrap();
    assert_eq!(store.users().count(), 1);
    assert!(store.has_permission("admin", Permission::All));
    assert!(mentions_admin_with_all(&fs::read_to_string(&path).unwrap()));
}

fn mentions_admin_with_all(content: &str) -> bool {
    content.contains("\"admin\"") && content.contains("\"ALL\"")
}

#[test]
fn test_engine_backup_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("shop.dbf");
    let backups = dir.path().join("backups");
    let mut engine =
        Engine::open(EngineConfig::new(&catalog).enforce_permissions(false)).unwrap();

    for result in engine.execute(
        "CREATE TABLE items (id INT, name VARCHAR(10));
         INSERT INTO items VALUES (1, 'pen'), (2, 'ink');",
    ) {
        result.unwrap();
    }

    let snapshot = engine.backup(&backups).unwrap();
    assert!(snapshot.join("shop.dbf").is_file());
    assert_eq!(backup::list_snapshots(&backups).unwrap(), vec![snapshot.clone()]);

    for result in engine.execute(
        "DELETE FROM items WHERE id = 1;
         CREATE TABLE scratch (id INT);",
    ) {
        result.unwrap();
    }

    engine.execute_one("BEGIN").unwrap();
    assert!(matches!(
        engine.restore(&snapshot),
        Err(Error::TransactionError(_))
    ));
    engine.execute_one("COMMIT").unwrap();

    engine.restore(&snapshot).unwrap();
    let result = engine.execute_one("SELECT COUNT(*) FROM items").unwrap();
    assert_eq!(result.scalar(), Value::Int(2));
    assert!(!engine.storage().database().has_table("scratch"));
}
