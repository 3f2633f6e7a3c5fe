use flatdb::{Engine, EngineConfig, Error, QueryResult, Value};

fn setup() -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let mut engine =
        Engine::open(EngineConfig::new(dir.path().join("company.dbf")).enforce_permissions(false))
            .unwrap();

    let script = "
        -- schema
        CREATE TABLE dept (id INT PRIMARY KEY, name VARCHAR(20));
        CREATE TABLE emp (id INT PRIMARY KEY, name VARCHAR(30), dept_id INT, salary FLOAT);

        INSERT INTO dept VALUES (1, 'Engineering'), (2, 'Sales'), (3, 'Legal');
        INSERT INTO emp VALUES
            (1, 'Alice', 1, 120.0),
            (2, 'Bob', 1, 100.0),
            (3, 'Carol', 2, 90.0),
            (4, 'Dave', NULL, 50.0);
    ";
    for result in engine.execute(script) {
        result.unwrap();
    }
    (dir, engine)
}

fn query(engine: &mut Engine, sql: &str) -> QueryResult {
    engine.execute_one(sql).unwrap()
}

fn texts(result: &QueryResult, column: usize) -> Vec<String> {
    result.rows.iter().map(|row| row[column].to_string()).collect()
}

#[test]
fn test_select_where_and_order() {
    let (_dir, mut engine) = setup();

    let result = query(&mut engine, "SELECT name FROM emp WHERE salary >= 90 ORDER BY salary DESC");
    assert_eq!(result.columns, vec!["name".to_string()]);
    assert_eq!(texts(&result, 0), vec!["Alice", "Bob", "Carol"]);

    let result = query(&mut engine, "SELECT * FROM emp WHERE name LIKE '_a%' ORDER BY id");
    assert_eq!(texts(&result, 1), vec!["Carol", "Dave"]);

    let result = query(&mut engine, "SELECT id FROM emp WHERE salary BETWEEN 90 AND 100 ORDER BY id");
    assert_eq!(texts(&result, 0), vec!["2", "3"]);

    let result = query(&mut engine, "SELECT id FROM emp WHERE dept_id = 1 OR (salary < 60 AND id = 4)");
    assert_eq!(result.row_count(), 3);
}

#[test]
fn test_null_comparisons() {
    let (_dir, mut engine) = setup();

    let result = query(&mut engine, "SELECT id FROM emp WHERE dept_id = NULL");
    assert_eq!(texts(&result, 0), vec!["4"]);

    let result = query(&mut engine, "SELECT id FROM emp WHERE dept_id > 0");
    assert_eq!(result.row_count(), 3);
}

#[test]
fn test_joins() {
    let (_dir, mut engine) = setup();

    let result = query(
        &mut engine,
        "SELECT e.name, d.name FROM emp e JOIN dept d ON e.dept_id = d.id ORDER BY e.id",
    );
    assert_eq!(result.columns, vec!["e.name".to_string(), "d.name".to_string()]);
    assert_eq!(texts(&result, 1), vec!["Engineering", "Engineering", "Sales"]);

    let result = query(
        &mut engine,
        "SELECT e.name, d.name FROM emp e LEFT JOIN dept d ON e.dept_id = d.id ORDER BY e.id",
    );
    assert_eq!(result.row_count(), 4);
    assert_eq!(result.rows[3][1], Value::Null);

    let result = query(
        &mut engine,
        "SELECT d.name FROM emp e RIGHT JOIN dept d ON e.dept_id = d.id WHERE e.id = NULL",
    );
    assert_eq!(texts(&result, 0), vec!["Legal"]);

    let result = query(
        &mut engine,
        "SELECT emp.name FROM emp, dept WHERE emp.dept_id = dept.id AND dept.name = 'Sales'",
    );
    assert_eq!(texts(&result, 0), vec!["Carol"]);
}

#[test]
fn test_three_table_joins() {
    let (_dir, mut engine) = setup();
    for result in engine.execute(
        "CREATE TABLE badge (emp_id INT, color VARCHAR(10));
         INSERT INTO badge VALUES (1, 'red'), (3, 'blue'), (3, 'green');",
    ) {
        result.unwrap();
    }

    let result = query(
        &mut engine,
        "SELECT e.name, d.name, b.color FROM emp e
         JOIN dept d ON e.dept_id = d.id
         LEFT JOIN badge b ON b.emp_id = e.id
         ORDER BY e.id",
    );
    assert_eq!(texts(&result, 0), vec!["Alice", "Bob", "Carol", "Carol"]);
    assert_eq!(texts(&result, 1), vec!["Engineering", "Engineering", "Sales", "Sales"]);
    assert_eq!(result.rows[1][2], Value::Null);
    let mut carol: Vec<String> = texts(&result, 2).into_iter().skip(2).collect();
    carol.sort();
    assert_eq!(carol, vec!["blue", "green"]);

    // WHERE runs once over the fully joined rows, after the LEFT step padded them
    let result = query(
        &mut engine,
        "SELECT e.name FROM emp e
         JOIN dept d ON e.dept_id = d.id
         LEFT JOIN badge b ON b.emp_id = e.id
         WHERE b.color = NULL",
    );
    assert_eq!(texts(&result, 0), vec!["Bob"]);

    let result = query(
        &mut engine,
        "SELECT b.color FROM emp e, dept d, badge b
         WHERE e.dept_id = d.id AND b.emp_id = e.id AND d.name = 'Sales'
         ORDER BY b.color",
    );
    assert_eq!(texts(&result, 0), vec!["blue", "green"]);

    let result = query(
        &mut engine,
        "SELECT e.name, b.color FROM emp e, dept d, badge b
         WHERE b.emp_id = e.id AND d.id = e.dept_id AND d.name = 'Engineering'",
    );
    assert_eq!(
        result.rows,
        vec![vec![Value::Text("Alice".into()), Value::Text("red".into())]]
    );
}

#[test]
fn test_grouping_and_aggregates() {
    let (_dir, mut engine) = setup();

    let result = query(
        &mut engine,
        "SELECT dept_id, COUNT(*) AS n, SUM(salary) AS total FROM emp GROUP BY dept_id ORDER BY n DESC",
    );
    assert_eq!(
        result.columns,
        vec!["dept_id".to_string(), "n".to_string(), "total".to_string()]
    );
    assert_eq!(result.rows[0], vec![Value::Int(1), Value::Int(2), Value::Float(220.0)]);

    let result = query(&mut engine, "SELECT COUNT(dept_id), MAX(salary), MIN(name) FROM emp");
    assert_eq!(
        result.rows,
        vec![vec![Value::Int(3), Value::Float(120.0), Value::Text("Alice".into())]]
    );

    let result = query(&mut engine, "SELECT AVG(salary) FROM emp WHERE dept_id = 1");
    assert_eq!(result.scalar(), Value::Float(110.0));

    let result = query(&mut engine, "SELECT COUNT(*), MAX(salary) FROM emp WHERE id > 100");
    assert_eq!(result.rows, vec![vec![Value::Int(0), Value::Null]]);
}

#[test]
fn test_subqueries() {
    let (_dir, mut engine) = setup();

    let result = query(
        &mut engine,
        "SELECT name FROM emp WHERE salary > (SELECT AVG(salary) FROM emp) ORDER BY name",
    );
    assert_eq!(texts(&result, 0), vec!["Alice", "Bob"]);

    let result = query(
        &mut engine,
        "SELECT name FROM dept WHERE id NOT IN (SELECT dept_id FROM emp) ORDER BY name",
    );
    assert_eq!(texts(&result, 0), vec!["Legal"]);

    let result = query(
        &mut engine,
        "SELECT d.name, (SELECT COUNT(*) FROM emp e WHERE e.dept_id = d.id) AS staff
         FROM dept d ORDER BY d.id",
    );
    assert_eq!(
        result.rows.iter().map(|r| r[1].clone()).collect::<Vec<_>>(),
        vec![Value::Int(2), Value::Int(1), Value::Int(0)]
    );
}

#[test]
fn test_correlated_subquery_on_same_table() {
    let (_dir, mut engine) = setup();

    // above the average of their own department: Engineering averages 110, Sales 90
    let result = query(
        &mut engine,
        "SELECT id FROM emp WHERE dept_id > 0
         AND salary > (SELECT AVG(salary) FROM emp e2 WHERE e2.dept_id = emp.dept_id)
         ORDER BY id",
    );
    assert_eq!(texts(&result, 0), vec!["1"]);

    for result in engine.execute(
        "CREATE TABLE pay (id INT PRIMARY KEY, team VARCHAR(5), amount INT);
         INSERT INTO pay VALUES (1, 'd1', 10), (2, 'd1', 30), (3, 'd2', 100), (4, 'd2', 300);",
    ) {
        result.unwrap();
    }
    let result = query(
        &mut engine,
        "SELECT id FROM pay WHERE amount > (SELECT AVG(amount) FROM pay p2 WHERE p2.team = pay.team)
         ORDER BY id",
    );
    assert_eq!(texts(&result, 0), vec!["2", "4"]);

    // an aliased table does not answer to its real name
    assert!(matches!(
        engine.execute_one("SELECT emp.name FROM emp e"),
        Err(Error::ColumnNotFound(..))
    ));
}

#[test]
fn test_update_and_delete() {
    let (_dir, mut engine) = setup();

    let result = query(&mut engine, "UPDATE emp SET salary = salary * 2 WHERE dept_id = 1");
    assert_eq!(result.affected_rows, 2);
    assert_eq!(result.message.as_deref(), Some("2 row(s) updated"));

    let result = query(&mut engine, "SELECT salary FROM emp WHERE id = 1");
    assert_eq!(result.scalar(), Value::Float(240.0));

    let err = engine
        .execute_one("UPDATE emp SET salary = salary / 0")
        .unwrap_err();
    assert!(matches!(err, Error::DivisionByZero));
    let result = query(&mut engine, "SELECT salary FROM emp WHERE id = 3");
    assert_eq!(result.scalar(), Value::Float(90.0));

    let result = query(&mut engine, "UPDATE emp SET name = 'Carolina' WHERE id = 3");
    assert_eq!(result.affected_rows, 1);
    let result = query(&mut engine, "SELECT name FROM emp WHERE id = 3");
    assert_eq!(result.scalar(), Value::Text("Carolina".into()));

    let result = query(&mut engine, "DELETE FROM emp WHERE salary < 100");
    assert_eq!(result.message.as_deref(), Some("2 row(s) deleted"));
    let result = query(&mut engine, "SELECT COUNT(*) FROM emp");
    assert_eq!(result.scalar(), Value::Int(2));
    assert_eq!(engine.storage().table("emp").unwrap().record_count, 2);
}

#[test]
fn test_insert_validation() {
    let (_dir, mut engine) = setup();

    let result = query(&mut engine, "INSERT INTO emp (id, name) VALUES (10, 'Eve')");
    assert_eq!(result.message.as_deref(), Some("1 row(s) inserted"));
    let result = query(&mut engine, "SELECT salary FROM emp WHERE id = 10");
    assert_eq!(result.scalar(), Value::Null);

    assert!(matches!(
        engine.execute_one("INSERT INTO emp VALUES (11, 'Frank')"),
        Err(Error::ArityMismatch { .. })
    ));
    assert!(matches!(
        engine.execute_one("INSERT INTO emp VALUES (NULL, 'Frank', 1, 1.0)"),
        Err(Error::NullNotAllowed(_))
    ));
    assert!(matches!(
        engine.execute_one("INSERT INTO dept VALUES (9, 'a name that is far too long')"),
        Err(Error::ValueTooLong { .. })
    ));
    assert!(engine
        .execute_one("INSERT INTO emp VALUES (12, 'Gina', 'x', 1.0)")
        .is_err());
}

#[test]
fn test_errors_are_classified() {
    use flatdb::ErrorKind;
    let (_dir, mut engine) = setup();

    let results = engine.execute(
        "SELEKT 1; SELECT nope FROM emp; SELECT * FROM missing; COMMIT; SELECT id FROM emp",
    );
    assert_eq!(results.len(), 5);

    let kinds: Vec<Option<ErrorKind>> = results
        .iter()
        .map(|r| r.as_ref().err().map(|e| e.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::Parse),
            Some(ErrorKind::Validation),
            Some(ErrorKind::Validation),
            Some(ErrorKind::Transaction),
            None,
        ]
    );
}

#[test]
fn test_comments_and_literals_in_batch() {
    let (_dir, mut engine) = setup();

    let results = engine.execute(
        "INSERT INTO dept VALUES (4, 'a;b'); -- trailing ; comment
         INSERT INTO dept VALUES (5, '--not a comment');",
    );
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_ok()));

    let result = query(&mut engine, "SELECT name FROM dept WHERE id >= 4 ORDER BY id");
    assert_eq!(texts(&result, 0), vec!["a;b", "--not a comment"]);
}
