use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::sql;
use crate::sql::query::{InsertQuery, Query, SelectQuery, UpdateQuery};
use crate::sql::types::{Row, Value};
use crate::storage::{BPlusTree, Key, Store};

/// A complete in-memory database, exposing an interface to execute SQL
/// queries against the tables declared by its schema.
pub struct Database {
    schema: Schema,
    tables: HashMap<String, TableState>,
    /// Compiled queries, keyed by the raw statement string. This is plain
    /// memoization: equivalent but differently-spaced statements do not
    /// share an entry.
    cached_queries: HashMap<String, Query>,
}

/// The storage backing one table: the next primary key to assign and the
/// B+tree index holding the rows.
struct TableState {
    next_primary_key: Key,
    store: Box<dyn Store>,
}

impl TableState {
    /// Returns the next primary key and advances the counter.
    fn autonum(&mut self) -> Key {
        let key = self.next_primary_key;
        self.next_primary_key += 1;
        key
    }
}

/// The result of executing a query.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultSet {
    /// Query results, in ascending primary-key order.
    Query { rows: Vec<Row> },
    /// Rows inserted
    Insert { count: u64 },
    /// Rows updated
    Update { count: u64 },
    /// The operation is recognised but not executable yet.
    NotImplemented { operation: String },
}

impl std::fmt::Display for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Query { rows } => {
                for row in rows {
                    writeln!(f, "{:?}", row)?;
                }
                write!(f, "({} rows)", rows.len())
            }
            Self::Insert { count } => write!(f, "Inserted {} rows", count),
            Self::Update { count } => write!(f, "Updated {} rows", count),
            Self::NotImplemented { operation } => {
                write!(f, "Not yet implemented: {}", operation)
            }
        }
    }
}

impl Database {
    /// Creates a database for the given schema, with an empty B+tree index
    /// per declared table.
    pub fn new(schema: Schema) -> Self {
        let tables = schema
            .tables
            .iter()
            .map(|table| {
                let state = TableState {
                    next_primary_key: 0,
                    store: Box::new(BPlusTree::new()) as Box<dyn Store>,
                };
                (table.name.clone(), state)
            })
            .collect();
        debug!("created database with {} tables", schema.tables.len());
        Self { schema, tables, cached_queries: HashMap::new() }
    }

    /// Creates a database whose table indexes use the given branching
    /// factor.
    pub fn new_with_order(schema: Schema, order: usize) -> Result<Self> {
        let mut tables = HashMap::new();
        for table in &schema.tables {
            let state = TableState {
                next_primary_key: 0,
                store: Box::new(BPlusTree::new_with_order(order)?) as Box<dyn Store>,
            };
            tables.insert(table.name.clone(), state);
        }
        Ok(Self { schema, tables, cached_queries: HashMap::new() })
    }

    /// Compiles and executes a single SQL statement. Compiled queries are
    /// cached by their source string, and the cache is consulted before
    /// recompiling.
    pub fn query(&mut self, statement: &str) -> Result<ResultSet> {
        let query = match self.cached_queries.get(statement) {
            Some(query) => {
                debug!("query cache hit: {}", statement);
                query.clone()
            }
            None => {
                let query = sql::compile(&self.schema, statement)?;
                self.cached_queries.insert(statement.to_string(), query.clone());
                query
            }
        };
        self.execute(&query)
    }

    /// Executes a compiled query.
    fn execute(&mut self, query: &Query) -> Result<ResultSet> {
        match query {
            Query::Select(select) => {
                Ok(ResultSet::Query { rows: self.select_query(select)? })
            }
            Query::Insert(insert) => {
                Ok(ResultSet::Insert { count: self.insert_query(insert)? })
            }
            Query::Update(update) => {
                Ok(ResultSet::Update { count: self.update_query(update)? })
            }
            Query::Delete(_) => {
                warn!("DELETE is not yet implemented; the statement has no effect");
                Ok(ResultSet::NotImplemented { operation: "DELETE".into() })
            }
            Query::Compound(compound) => {
                warn!("compound queries are not yet implemented; the statement has no effect");
                Ok(ResultSet::NotImplemented {
                    operation: format!("{:?}", compound.op).to_uppercase(),
                })
            }
        }
    }

    /// Fetches the storage state of a table. The compiler has already
    /// resolved the table name, so a miss is an engine bug.
    fn table_state(&mut self, name: &str) -> Result<&mut TableState> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::Internal(format!("No store for table {}", name)))
    }

    /// Executes a SELECT: scans every row of the table, synthesizes the
    /// primary-key field from the record key, and projects the requested
    /// fields. Filters are not yet executed.
    fn select_query(&mut self, query: &SelectQuery) -> Result<Vec<Row>> {
        let primary_key = self
            .schema
            .get_table(&query.table)
            .ok_or_else(|| Error::Internal(format!("No schema for table {}", query.table)))?
            .primary_key()?
            .to_string();
        let state = self.table_state(&query.table)?;

        let mut rows = Vec::new();
        for (key, bytes) in state.store.scan_where(&|_, _| true) {
            let mut row: Row = deserialize_row(&bytes)?;
            row.insert(primary_key.clone(), Value::Integer(key));
            if !query.keys.is_empty() {
                row.retain(|field, _| query.keys.contains(field));
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Executes an INSERT: one new record per value row, keyed by the
    /// table's auto-assigned primary key. A store-level failure cannot
    /// happen while the key counter is used correctly, so it is fatal.
    fn insert_query(&mut self, query: &InsertQuery) -> Result<u64> {
        let state = self.table_state(&query.table)?;
        let mut count = 0;
        for values in &query.values {
            let mut row = Row::new();
            for (key, value) in query.keys.iter().zip(values) {
                row.insert(key.clone(), value.clone());
            }
            let key = state.autonum();
            if !state.store.insert(key, serialize_row(&row)?) {
                return Err(Error::Internal(format!(
                    "Insert failed: duplicate primary key {} in table {}",
                    key, query.table
                )));
            }
            count += 1;
        }
        Ok(count)
    }

    /// Executes an UPDATE: rewrites the assigned fields of every row of the
    /// table. WHERE clauses are parsed and type-checked but not yet
    /// executed, so the update deliberately applies to the whole table.
    fn update_query(&mut self, query: &UpdateQuery) -> Result<u64> {
        if query.filter.is_some() {
            warn!(
                "WHERE clauses are not yet executed; updating every row of {}",
                query.table
            );
        }
        let state = self.table_state(&query.table)?;
        let mut count = 0;
        for (key, bytes) in state.store.scan_where(&|_, _| true) {
            let mut row: Row = deserialize_row(&bytes)?;
            for (field, value) in &query.values {
                row.insert(field.clone(), value.clone());
            }
            let bytes = serialize_row(&row)?;
            if !state.store.update(key, &|_| bytes.clone()) {
                return Err(Error::Internal(format!(
                    "Update failed: record {} vanished from table {}",
                    key, query.table
                )));
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Serializes a row for storage.
fn serialize_row<V: Serialize>(row: &V) -> Result<Vec<u8>> {
    Ok(bincode::serialize(row)?)
}

/// Deserializes a stored row. Rows are only written by the engine itself,
/// so a decoding failure indicates store corruption and is fatal.
fn deserialize_row<'a, V: Deserialize<'a>>(bytes: &'a [u8]) -> Result<V> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_yaml(
            "\
tables:
  - name: user
    key: id
    fields:
      - { name: forename, type: string }
      - { name: surname,  type: string }
      - { name: address,  type: string }
",
        )
        .unwrap()
    }

    fn row(fields: &[(&str, Value)]) -> Row {
        fields.iter().map(|(name, value)| (name.to_string(), value.clone())).collect()
    }

    #[test]
    fn rows_round_trip_through_serialization() {
        let row = row(&[
            ("items", Value::String("apples".into())),
            ("price", Value::Integer(100)),
            ("user_id", Value::Integer(5)),
        ]);
        let decoded: Row = deserialize_row(&serialize_row(&row).unwrap()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn inserts_assign_sequential_primary_keys() {
        let mut db = Database::new(schema());
        for surname in ["Bostock", "Horne", "Armstrong"] {
            let result = db
                .query(&format!(
                    "INSERT INTO user (forename, surname, address) VALUES ('Alex', '{}', 'nope')",
                    surname
                ))
                .unwrap();
            assert_eq!(result, ResultSet::Insert { count: 1 });
        }

        let result = db.query("SELECT * FROM user").unwrap();
        let ResultSet::Query { rows } = result else { panic!("expected rows") };
        assert_eq!(rows.len(), 3);
        for (id, (row, surname)) in rows.iter().zip(["Bostock", "Horne", "Armstrong"]).enumerate() {
            assert_eq!(row["id"], Value::Integer(id as i64));
            assert_eq!(row["forename"], Value::String("Alex".into()));
            assert_eq!(row["surname"], Value::String(surname.into()));
            assert_eq!(row["address"], Value::String("nope".into()));
        }
    }

    #[test]
    fn select_projects_the_named_keys() {
        let mut db = Database::new(schema());
        db.query("INSERT INTO user (forename, surname, address) VALUES ('Alex', 'Bostock', 'nope')")
            .unwrap();
        let result = db.query("SELECT forename FROM user").unwrap();
        assert_eq!(
            result,
            ResultSet::Query {
                rows: vec![row(&[("forename", Value::String("Alex".into()))])]
            }
        );
    }

    #[test]
    fn multi_row_inserts_create_every_row() {
        let mut db = Database::new(schema());
        let result = db
            .query("INSERT INTO user (forename) VALUES ('Alex'), ('Sam'), ('Robin')")
            .unwrap();
        assert_eq!(result, ResultSet::Insert { count: 3 });
        let ResultSet::Query { rows } = db.query("SELECT forename FROM user").unwrap() else {
            panic!("expected rows")
        };
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn updates_rewrite_every_row() {
        let mut db = Database::new(schema());
        db.query("INSERT INTO user (forename, surname) VALUES ('Alex', 'Bostock'), ('Sam', 'Smith')")
            .unwrap();
        let result = db.query("UPDATE user SET address = 'somewhere'").unwrap();
        assert_eq!(result, ResultSet::Update { count: 2 });

        let ResultSet::Query { rows } = db.query("SELECT * FROM user").unwrap() else {
            panic!("expected rows")
        };
        assert!(rows.iter().all(|row| row["address"] == Value::String("somewhere".into())));
        assert_eq!(rows[0]["surname"], Value::String("Bostock".into()));
    }

    #[test]
    fn update_with_a_where_clause_still_updates_every_row() {
        let mut db = Database::new(schema());
        db.query("INSERT INTO user (forename) VALUES ('Alex'), ('Sam')").unwrap();
        let result = db.query("UPDATE user SET forename = 'X' WHERE forename = 'Alex'").unwrap();
        assert_eq!(result, ResultSet::Update { count: 2 });
    }

    #[test]
    fn delete_and_compound_queries_are_diagnosed_no_ops() {
        let mut db = Database::new(schema());
        db.query("INSERT INTO user (forename) VALUES ('Alex')").unwrap();

        let result = db.query("DELETE FROM user").unwrap();
        assert_eq!(result, ResultSet::NotImplemented { operation: "DELETE".into() });

        let result =
            db.query("SELECT * FROM user UNION SELECT * FROM user").unwrap();
        assert_eq!(result, ResultSet::NotImplemented { operation: "UNION".into() });

        // The no-ops must leave the table untouched.
        let ResultSet::Query { rows } = db.query("SELECT * FROM user").unwrap() else {
            panic!("expected rows")
        };
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn cached_statements_recompile_nothing_but_re_execute() {
        let mut db = Database::new(schema());
        let statement = "INSERT INTO user (forename) VALUES ('Alex')";
        db.query(statement).unwrap();
        db.query(statement).unwrap();
        assert_eq!(db.cached_queries.len(), 1);

        let ResultSet::Query { rows } = db.query("SELECT * FROM user").unwrap() else {
            panic!("expected rows")
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], Value::Integer(0));
        assert_eq!(rows[1]["id"], Value::Integer(1));
    }

    #[test]
    fn statement_errors_abort_only_that_statement() {
        let mut db = Database::new(schema());
        assert!(db.query("INSERT INTO user (id) VALUES (42)").is_err());
        assert!(db.query("SELECT nope FROM user").is_err());
        assert!(db.query("not sql").is_err());
        db.query("INSERT INTO user (forename) VALUES ('Alex')").unwrap();
        let ResultSet::Query { rows } = db.query("SELECT * FROM user").unwrap() else {
            panic!("expected rows")
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::Integer(0));
    }

    #[test]
    fn display_dumps_rows_with_field_names_and_values() {
        let result = ResultSet::Query {
            rows: vec![row(&[
                ("forename", Value::String("Alex".into())),
                ("id", Value::Integer(0)),
            ])],
        };
        let dump = format!("{}", result);
        assert!(dump.contains("forename"));
        assert!(dump.contains("Alex"));
        assert!(dump.contains("(1 rows)"));
    }
}
