use alder::db::ResultSet;
use alder::schema::Schema;
use alder::sql::types::Value;
use alder::Database;

const SCHEMA: &str = "\
tables:
  - name: user
    key: id
    fields:
      - { name: forename, type: string }
      - { name: surname,  type: string }
      - { name: address,  type: string }
";

fn database() -> Database {
    Database::new_with_order(Schema::from_yaml(SCHEMA).unwrap(), 4).unwrap()
}

fn rows(result: ResultSet) -> Vec<alder::sql::types::Row> {
    match result {
        ResultSet::Query { rows } => rows,
        result => panic!("expected query results, got {:?}", result),
    }
}

#[test]
fn inserts_then_selects_all_rows() {
    let mut db = database();

    for query in [
        "insert into user (forename, surname, address) values ('Alex', 'Bostock', 'nope')",
        "insert into user (forename, surname, address) values ('Alex', 'Horne', 'nope')",
        "insert into user (forename, surname, address) values ('Alex', 'Armstrong', 'nope')",
    ] {
        assert_eq!(db.query(query), Ok(ResultSet::Insert { count: 1 }));
    }

    let rows = rows(db.query("select * from user").unwrap());
    assert_eq!(rows.len(), 3);
    for (expected_id, (row, surname)) in
        rows.iter().zip(["Bostock", "Horne", "Armstrong"]).enumerate()
    {
        assert_eq!(row["id"], Value::Integer(expected_id as i64));
        assert_eq!(row["forename"], Value::String("Alex".into()));
        assert_eq!(row["surname"], Value::String(surname.into()));
        assert_eq!(row["address"], Value::String("nope".into()));
        assert_eq!(row.len(), 4);
    }
}

#[test]
fn select_with_a_key_list_projects_each_row() {
    let mut db = database();
    db.query("insert into user (forename, surname, address) values ('Alex', 'Bostock', 'nope')")
        .unwrap();
    db.query("insert into user (forename, surname, address) values ('Alex', 'Horne', 'nope')")
        .unwrap();

    let rows = rows(db.query("select forename from user").unwrap());
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.len(), 1);
        assert_eq!(row["forename"], Value::String("Alex".into()));
    }
}

#[test]
fn inserting_a_primary_key_is_a_semantic_error() {
    let mut db = database();
    assert!(db.query("insert into user (id) values (42)").is_err());
    assert!(rows(db.query("select * from user").unwrap()).is_empty());
}

#[test]
fn inserting_a_mistyped_value_is_a_semantic_error() {
    let mut db = database();
    assert!(db.query("insert into user (forename) values (42)").is_err());
    assert!(rows(db.query("select * from user").unwrap()).is_empty());
}

#[test]
fn the_statement_stream_survives_bad_statements() {
    let mut db = database();
    assert!(db.query("select * from missing").is_err());
    assert!(db.query("selec * from user").is_err());
    assert_eq!(
        db.query("insert into user (forename) values ('Alex')"),
        Ok(ResultSet::Insert { count: 1 })
    );
    assert_eq!(rows(db.query("select * from user").unwrap()).len(), 1);
}

#[test]
fn repeated_statements_are_served_from_the_query_cache() {
    let mut db = database();
    let statement = "insert into user (forename) values ('Alex')";
    db.query(statement).unwrap();
    db.query(statement).unwrap();
    db.query(statement).unwrap();

    let rows = rows(db.query("select * from user").unwrap());
    let ids: Vec<_> = rows.iter().map(|row| row["id"].clone()).collect();
    assert_eq!(ids, vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)]);
}

#[test]
fn loads_a_schema_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.yaml");
    std::fs::write(&path, SCHEMA).unwrap();

    let schema = Schema::from_file(path.to_str().unwrap()).unwrap();
    assert_eq!(schema, Schema::from_yaml(SCHEMA).unwrap());

    let mut db = Database::new(schema);
    db.query("insert into user (forename) values ('Alex')").unwrap();
    assert_eq!(rows(db.query("select * from user").unwrap()).len(), 1);
}
