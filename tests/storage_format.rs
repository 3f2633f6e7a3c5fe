use flatdb::catalog::{Field, FieldType};
use flatdb::storage::catalog_file::{self, CATALOG_MAGIC, CATALOG_VERSION, HEADER_SIZE};
use flatdb::storage::{record_path_for, Record, RecordFile, Value};
use flatdb::{Engine, EngineConfig};
use std::fs;
use std::path::Path;

fn open(path: &Path) -> Engine {
    Engine::open(EngineConfig::new(path).enforce_permissions(false)).unwrap()
}

fn run(engine: &mut Engine, sql: &str) {
    for result in engine.execute(sql) {
        result.unwrap();
    }
}

#[test]
fn test_catalog_header_layout() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("shop.dbf");
    let mut engine = open(&catalog);
    run(&mut engine, "CREATE TABLE items (id INT PRIMARY KEY, name VARCHAR(20));");

    let bytes = fs::read(&catalog).unwrap();
    assert!(bytes.len() as u64 > HEADER_SIZE);
    assert_eq!(u32::from_be_bytes(bytes[0..4].try_into().unwrap()), CATALOG_MAGIC);
    assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), CATALOG_VERSION);
    assert_eq!(u32::from_be_bytes(bytes[8..12].try_into().unwrap()), 1);

    let db = catalog_file::read_catalog(&catalog).unwrap();
    let table = db.table("items").unwrap();
    assert_eq!(table.field_names(), vec!["id".to_string(), "name".to_string()]);
    assert!(table.fields[0].primary_key);
    assert!(!table.fields[0].nullable);
}

#[test]
fn test_record_byte_layout() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("shop.dbf");
    let mut engine = open(&catalog);
    run(
        &mut engine,
        "CREATE TABLE items (id INT, name VARCHAR(20));
         INSERT INTO items VALUES (7, 'ab');",
    );

    let bytes = fs::read(record_path_for(&catalog, "items")).unwrap();
    // status, INT null marker and value, VARCHAR length and bytes
    assert_eq!(
        bytes,
        vec![0, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 2, b'a', b'b']
    );

    run(&mut engine, "DELETE FROM items WHERE id = 7;");
    let bytes = fs::read(record_path_for(&catalog, "items")).unwrap();
    assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
    assert_eq!(bytes.len(), 15);
}

#[test]
fn test_null_numerics_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = RecordFile::new(dir.path().join("t.dat"));
    let fields = vec![
        Field::new("a", FieldType::Int, 4),
        Field::new("b", FieldType::Float, 8),
        Field::new("c", FieldType::Char, 4),
        Field::new("d", FieldType::Date, 10),
    ];

    let record = Record::new(vec![Value::Null, Value::Null, Value::Null, Value::Null]);
    let offset = file.append(&fields, &record).unwrap();
    let back = file.read_at(&fields, offset).unwrap();
    assert_eq!(back.values(), record.values());
}

#[test]
fn test_truncated_scan_keeps_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let file = RecordFile::new(dir.path().join("t.dat"));
    let fields = vec![Field::new("a", FieldType::Int, 4)];

    file.append(&fields, &Record::new(vec![Value::Int(1)])).unwrap();
    file.append(&fields, &Record::new(vec![Value::Int(2)])).unwrap();

    let mut bytes = fs::read(file.path()).unwrap();
    bytes.extend_from_slice(&[0, 0, 0]);
    fs::write(file.path(), bytes).unwrap();

    let scan = file.scan(&fields).unwrap();
    assert_eq!(scan.records.len(), 2);
    assert!(scan.truncated.is_some());
    assert_eq!(file.read_all_active(&fields).unwrap().len(), 2);
}

#[test]
fn test_reopen_preserves_data_and_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("shop.dbf");
    {
        let mut engine = open(&catalog);
        run(
            &mut engine,
            "CREATE TABLE items (id INT, price FLOAT);
             INSERT INTO items VALUES (1, 2.5), (2, 4.0), (3, NULL);
             CREATE UNIQUE INDEX items_id ON items (id);",
        );
    }

    let mut engine = open(&catalog);
    let table = engine.storage().table("items").unwrap();
    assert_eq!(table.record_count, 3);
    let index = table.index("items_id").unwrap();
    assert!(index.unique);
    assert_eq!(index.lookup(&Value::Int(2)).len(), 1);

    let result = engine.execute_one("SELECT price FROM items WHERE id = 3").unwrap();
    assert_eq!(result.rows, vec![vec![Value::Null]]);

    let err = engine.execute_one("INSERT INTO items VALUES (2, 1.0)").unwrap_err();
    assert!(err.to_string().contains("items_id"));
}

#[test]
fn test_record_file_path_convention() {
    let path = record_path_for(Path::new("/data/shop.dbf"), "orders");
    assert_eq!(path, Path::new("/data/shop_orders.dat"));
}
