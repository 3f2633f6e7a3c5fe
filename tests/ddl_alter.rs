use flatdb::catalog::FieldType;
use flatdb::storage::{catalog_file, record_path_for};
use flatdb::{Engine, EngineConfig, Error, Value};
use std::path::PathBuf;

fn setup() -> (tempfile::TempDir, PathBuf, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("lib.dbf");
    let mut engine =
        Engine::open(EngineConfig::new(&catalog).enforce_permissions(false)).unwrap();
    for result in engine.execute(
        "CREATE TABLE books (id INT PRIMARY KEY, title VARCHAR(40), pages INT);
         INSERT INTO books VALUES (1, 'Dune', 412), (2, 'Emma', 320), (3, 'Ulysses', 730);
         DELETE FROM books WHERE id = 2;",
    ) {
        result.unwrap();
    }
    (dir, catalog, engine)
}

fn message(engine: &mut Engine, sql: &str) -> String {
    engine.execute_one(sql).unwrap().message.unwrap_or_default()
}

#[test]
fn test_create_table_rules() {
    let (_dir, _catalog, mut engine) = setup();

    assert!(matches!(
        engine.execute_one("CREATE TABLE books (id INT)"),
        Err(Error::TableAlreadyExists(_))
    ));
    assert!(matches!(
        engine.execute_one("CREATE TABLE t (a INT, A FLOAT)"),
        Err(Error::ColumnAlreadyExists(_, _))
    ));
    assert!(matches!(
        engine.execute_one("CREATE TABLE t (a VARCHAR)"),
        Err(Error::LengthRequired(_))
    ));
    assert_eq!(
        message(&mut engine, "CREATE TABLE t (a CHAR(3), b DATE, c FLOAT)"),
        "Table 't' created successfully"
    );
}

#[test]
fn test_add_column_migrates_rows() {
    let (_dir, catalog, mut engine) = setup();

    assert_eq!(
        message(&mut engine, "ALTER TABLE books ADD COLUMN rating FLOAT"),
        "Column added successfully"
    );
    let result = engine
        .execute_one("SELECT id, rating FROM books ORDER BY id")
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::Int(1), Value::Null], vec![Value::Int(3), Value::Null]]
    );

    engine
        .execute_one("UPDATE books SET rating = 4.5 WHERE id = 3")
        .unwrap();
    let result = engine
        .execute_one("SELECT rating FROM books WHERE id = 3")
        .unwrap();
    assert_eq!(result.scalar(), Value::Float(4.5));

    // tombstones are compacted by the rewrite
    let len = std::fs::metadata(record_path_for(&catalog, "books")).unwrap().len();
    assert_eq!(len, 2 * (4 + 5 + 4 + 5 + 9) + 4 + 7);

    assert!(matches!(
        engine.execute_one("ALTER TABLE books ADD author VARCHAR(20) NOT NULL"),
        Err(Error::ValidationError(_))
    ));
}

#[test]
fn test_drop_column() {
    let (_dir, _catalog, mut engine) = setup();

    engine
        .execute_one("CREATE INDEX books_pages ON books (pages)")
        .unwrap();
    assert_eq!(
        message(&mut engine, "ALTER TABLE books DROP COLUMN pages"),
        "Column dropped successfully"
    );

    let table = engine.storage().table("books").unwrap();
    assert_eq!(table.field_names(), vec!["id".to_string(), "title".to_string()]);
    assert!(table.index("books_pages").is_none());

    let result = engine.execute_one("SELECT * FROM books ORDER BY id").unwrap();
    assert_eq!(result.rows[1], vec![Value::Int(3), Value::Text("Ulysses".into())]);

    assert!(engine.execute_one("ALTER TABLE books DROP id").is_err());
    assert!(matches!(
        engine.execute_one("ALTER TABLE books DROP missing"),
        Err(Error::ColumnNotFound(_, _))
    ));
}

#[test]
fn test_modify_column() {
    let (_dir, _catalog, mut engine) = setup();

    assert_eq!(
        message(&mut engine, "ALTER TABLE books MODIFY pages VARCHAR(5)"),
        "Column modified successfully"
    );
    let result = engine
        .execute_one("SELECT pages FROM books WHERE id = 1")
        .unwrap();
    assert_eq!(result.scalar(), Value::Text("412".into()));

    assert!(engine
        .execute_one("ALTER TABLE books MODIFY title INT")
        .is_err());
    let result = engine
        .execute_one("SELECT title FROM books WHERE id = 1")
        .unwrap();
    assert_eq!(result.scalar(), Value::Text("Dune".into()));

    assert!(matches!(
        engine.execute_one("ALTER TABLE books MODIFY title VARCHAR(3)"),
        Err(Error::ValueTooLong { .. })
    ));
}

#[test]
fn test_modify_into_duplicate_keys_changes_nothing() {
    let (_dir, catalog, mut engine) = setup();
    for result in engine.execute(
        "CREATE TABLE codes (id INT PRIMARY KEY, code VARCHAR(10));
         INSERT INTO codes VALUES (1, '1'), (2, '01');
         CREATE UNIQUE INDEX ux_code ON codes(code);",
    ) {
        result.unwrap();
    }
    let before = std::fs::read(record_path_for(&catalog, "codes")).unwrap();

    match engine.execute_one("ALTER TABLE codes MODIFY code INT") {
        Err(Error::UniqueViolation { index, value }) => {
            assert_eq!(index, "ux_code");
            assert_eq!(value, "1");
        }
        other => panic!("Expected unique violation, got {:?}", other),
    }

    let field_type = |engine: &Engine| {
        engine.storage().table("codes").unwrap().field("code").unwrap().field_type
    };
    assert_eq!(field_type(&engine), FieldType::Varchar);
    assert_eq!(std::fs::read(record_path_for(&catalog, "codes")).unwrap(), before);
    drop(engine);

    let mut engine =
        Engine::open(EngineConfig::new(&catalog).enforce_permissions(false)).unwrap();
    assert_eq!(field_type(&engine), FieldType::Varchar);
    let result = engine
        .execute_one("SELECT id, code FROM codes ORDER BY id")
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::Int(1), Value::Text("1".into())],
            vec![Value::Int(2), Value::Text("01".into())],
        ]
    );
    assert!(matches!(
        engine.execute_one("INSERT INTO codes VALUES (3, '01')"),
        Err(Error::UniqueViolation { .. })
    ));
}

#[test]
fn test_rename_column_keeps_index() {
    let (_dir, _catalog, mut engine) = setup();

    engine
        .execute_one("CREATE UNIQUE INDEX books_title ON books (title)")
        .unwrap();
    assert_eq!(
        message(&mut engine, "ALTER TABLE books RENAME COLUMN title TO name"),
        "Column renamed successfully"
    );

    let table = engine.storage().table("books").unwrap();
    assert_eq!(table.index("books_title").unwrap().column_name, "name");

    let result = engine
        .execute_one("SELECT id FROM books WHERE name = 'Dune'")
        .unwrap();
    assert_eq!(result.scalar(), Value::Int(1));
    assert!(matches!(
        engine.execute_one("INSERT INTO books VALUES (9, 'Dune', 1)"),
        Err(Error::UniqueViolation { .. })
    ));
}

#[test]
fn test_rename_table_moves_record_file() {
    let (_dir, catalog, mut engine) = setup();

    assert_eq!(
        message(&mut engine, "RENAME TABLE books TO novels"),
        "Table renamed from 'books' to 'novels'"
    );
    assert!(!record_path_for(&catalog, "books").exists());
    assert!(record_path_for(&catalog, "novels").exists());

    let result = engine.execute_one("SELECT COUNT(*) FROM novels").unwrap();
    assert_eq!(result.scalar(), Value::Int(2));
    assert!(matches!(
        engine.execute_one("SELECT * FROM books"),
        Err(Error::TableNotFound(_))
    ));

    let db = catalog_file::read_catalog(&catalog).unwrap();
    assert!(db.has_table("novels"));
    assert!(!db.has_table("books"));
}

#[test]
fn test_drop_table() {
    let (_dir, catalog, mut engine) = setup();

    assert_eq!(
        message(&mut engine, "DROP TABLE books"),
        "Table 'books' dropped successfully"
    );
    assert!(!record_path_for(&catalog, "books").exists());
    assert!(matches!(
        engine.execute_one("DROP TABLE books"),
        Err(Error::TableNotFound(_))
    ));
}

#[test]
fn test_create_index_rules() {
    let (_dir, _catalog, mut engine) = setup();

    assert_eq!(
        message(&mut engine, "CREATE INDEX books_id ON books (id)"),
        "Index 'books_id' created successfully on books(id)"
    );
    assert!(matches!(
        engine.execute_one("CREATE INDEX books_id ON books (pages)"),
        Err(Error::IndexAlreadyExists(_))
    ));

    engine
        .execute_one("INSERT INTO books VALUES (4, 'Dune', 100)")
        .unwrap();
    assert!(matches!(
        engine.execute_one("CREATE UNIQUE INDEX books_title ON books (title)"),
        Err(Error::UniqueViolation { .. })
    ));
    assert!(engine.storage().table("books").unwrap().index("books_title").is_none());
}
