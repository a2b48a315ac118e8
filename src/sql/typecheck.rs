use std::collections::BTreeMap;

use super::parser::ast::{Node, Nonterminal};
use super::query::{
    CompoundOp, CompoundQuery, DeleteQuery, Filter, InsertQuery, Query, SelectQuery, UpdateQuery,
    WhereClause,
};
use super::types::{DataType, Value};
use crate::error::{Error, Result};
use crate::schema::{Schema, Table};

/// Validates a parse tree against the schema and lowers it to a typed,
/// executable query.
pub fn check(schema: &Schema, node: &Node) -> Result<Query> {
    match node.kind {
        Nonterminal::Statement => match node.args.as_slice() {
            [query] => check(schema, query),
            _ => Err(invalid_tree()),
        },

        Nonterminal::SelectFrom => match node.args.as_slice() {
            [keys, table, filters] => {
                let table = check_table(schema, table)?;
                Ok(Query::Select(SelectQuery {
                    keys: check_select_keys(table, keys)?,
                    table: table.name.clone(),
                    filters: check_filters(filters)?,
                }))
            }
            _ => Err(invalid_tree()),
        },

        Nonterminal::InsertInto => match node.args.as_slice() {
            [keys, table, values] => {
                let table = check_table(schema, table)?;
                let keys = check_insert_keys(table, keys)?;
                let values = check_values_list(values)?;
                check_insert_types(table, &keys, &values)?;
                Ok(Query::Insert(InsertQuery { keys, values, table: table.name.clone() }))
            }
            _ => Err(invalid_tree()),
        },

        Nonterminal::UpdateSet => match node.args.as_slice() {
            [table, assignments, filters] => {
                let table = check_table(schema, table)?;
                Ok(Query::Update(UpdateQuery {
                    values: check_assignments(table, assignments)?,
                    table: table.name.clone(),
                    filter: check_where_clause(filters)?,
                }))
            }
            _ => Err(invalid_tree()),
        },

        Nonterminal::DeleteFrom => match node.args.as_slice() {
            [table, filters] => {
                let table = check_table(schema, table)?;
                Ok(Query::Delete(DeleteQuery {
                    table: table.name.clone(),
                    filter: check_where_clause(filters)?,
                }))
            }
            _ => Err(invalid_tree()),
        },

        Nonterminal::UnionOf | Nonterminal::IntersectionOf | Nonterminal::DifferenceOf => {
            let op = match node.kind {
                Nonterminal::UnionOf => CompoundOp::Union,
                Nonterminal::IntersectionOf => CompoundOp::Intersect,
                _ => CompoundOp::Difference,
            };
            match node.args.as_slice() {
                [left, right] => {
                    let left = match check(schema, left)? {
                        Query::Select(select) => select,
                        _ => {
                            return Err(Error::Value(
                                "Compound queries must begin with a SELECT query".into(),
                            ))
                        }
                    };
                    let right = Box::new(check(schema, right)?);
                    Ok(Query::Compound(CompoundQuery { left, op, right }))
                }
                _ => Err(invalid_tree()),
            }
        }

        _ => Err(invalid_tree()),
    }
}

fn invalid_tree() -> Error {
    Error::Internal("Invalid parse tree".into())
}

/// Resolves a table name against the schema.
fn check_table<'a>(schema: &'a Schema, node: &Node) -> Result<&'a Table> {
    if node.kind != Nonterminal::Table {
        return Err(invalid_tree());
    }
    schema
        .get_table(&node.val)
        .ok_or_else(|| Error::Value(format!("Table {} does not exist", node.val)))
}

/// Collects the raw names of a key list, unwrapping a parenthesised Keys
/// node if present.
fn key_names(node: &Node) -> Result<Vec<String>> {
    let list = match node.kind {
        Nonterminal::Keys => match node.args.as_slice() {
            [list] => list,
            _ => return Err(invalid_tree()),
        },
        _ => node,
    };
    if list.kind != Nonterminal::KeyList {
        return Err(invalid_tree());
    }
    list.args
        .iter()
        .map(|key| {
            if key.kind != Nonterminal::Key {
                return Err(invalid_tree());
            }
            Ok(key.val.clone())
        })
        .collect()
}

/// Checks the key list of a SELECT. A sole * selects every field and lowers
/// to an empty key list; * mixed with named keys is an error. Named keys
/// must exist in the selected table; keys of joined tables are refused
/// until join execution is implemented.
fn check_select_keys(table: &Table, node: &Node) -> Result<Vec<String>> {
    let keys = key_names(node)?;
    if keys.iter().any(|key| key == "*") {
        if keys.len() != 1 {
            return Err(Error::Value("Cannot mix * with named keys".into()));
        }
        return Ok(Vec::new());
    }
    for key in &keys {
        if table.get_field(key).is_none() {
            return Err(Error::Value(format!("Unknown key {} in table {}", key, table.name)));
        }
    }
    Ok(keys)
}

/// Checks the key list of an INSERT, which must name its keys explicitly.
fn check_insert_keys(table: &Table, node: &Node) -> Result<Vec<String>> {
    let keys = key_names(node)?;
    if keys.iter().any(|key| key == "*") {
        return Err(Error::Value("Insert queries must list their keys explicitly, not *".into()));
    }
    for key in &keys {
        if table.get_field(key).is_none() {
            return Err(Error::Value(format!("Unknown key {} in table {}", key, table.name)));
        }
    }
    Ok(keys)
}

/// Lowers the rows of an INSERT into value lists.
fn check_values_list(node: &Node) -> Result<Vec<Vec<Value>>> {
    if node.kind != Nonterminal::ValueList {
        return Err(invalid_tree());
    }
    node.args
        .iter()
        .map(|row| {
            let list = match (row.kind, row.args.as_slice()) {
                (Nonterminal::Literals, [list]) if list.kind == Nonterminal::LiteralList => list,
                _ => return Err(invalid_tree()),
            };
            list.args.iter().map(check_value).collect()
        })
        .collect()
}

/// Lowers a literal node to a value. Keys are valid value syntax but have
/// no meaning in inserts or assignments, so they are rejected here.
fn check_value(node: &Node) -> Result<Value> {
    if node.kind == Nonterminal::Key {
        return Err(Error::Value(format!("Expected a literal value, found key {}", node.val)));
    }
    let atom = match (node.kind, node.args.as_slice()) {
        (Nonterminal::Literal, [atom]) => atom,
        _ => return Err(invalid_tree()),
    };
    match atom.kind {
        Nonterminal::Integer => Ok(Value::Integer(atom.val.parse()?)),
        Nonterminal::StrVal => Ok(Value::String(atom.val.clone())),
        _ => Err(invalid_tree()),
    }
}

/// Checks every INSERT row against the field types of the table. The
/// primary key is auto-assigned and may never be inserted directly.
fn check_insert_types(table: &Table, keys: &[String], values: &[Vec<Value>]) -> Result<()> {
    for row in values {
        if row.len() != keys.len() {
            return Err(Error::Value(format!(
                "Row has {} values, expected {}",
                row.len(),
                keys.len()
            )));
        }
        for (key, value) in keys.iter().zip(row) {
            let field = table
                .get_field(key)
                .ok_or_else(|| Error::Value(format!("Unknown key {} in table {}", key, table.name)))?;
            match field.datatype {
                DataType::PrimaryKey => {
                    return Err(Error::Value(format!(
                        "Primary key {} cannot be inserted directly",
                        key
                    )))
                }
                datatype if value.datatype() != datatype => {
                    return Err(Error::Value(format!(
                        "Invalid type {} for {} key {}",
                        value.datatype(),
                        datatype,
                        key
                    )))
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Checks the assignments of an UPDATE against the field types of the
/// table.
fn check_assignments(table: &Table, node: &Node) -> Result<BTreeMap<String, Value>> {
    if node.kind != Nonterminal::AssignmentList {
        return Err(invalid_tree());
    }
    let mut values = BTreeMap::new();
    for assignment in &node.args {
        let (key, value) = match (assignment.kind, assignment.args.as_slice()) {
            (Nonterminal::Assignment, [key, value]) if key.kind == Nonterminal::Key => {
                (key.val.clone(), check_value(value)?)
            }
            _ => return Err(invalid_tree()),
        };
        let field = table
            .get_field(&key)
            .ok_or_else(|| Error::Value(format!("Unknown key {} in table {}", key, table.name)))?;
        match field.datatype {
            DataType::PrimaryKey => {
                return Err(Error::Value(format!("Primary key {} cannot be updated", key)))
            }
            datatype if value.datatype() != datatype => {
                return Err(Error::Value(format!(
                    "Invalid type {} for {} key {}",
                    value.datatype(),
                    datatype,
                    key
                )))
            }
            _ => {}
        }
        if values.insert(key.clone(), value).is_some() {
            return Err(Error::Value(format!("Duplicate assignment to key {}", key)));
        }
    }
    Ok(values)
}

/// Accepts the filter clauses of a SELECT. Filters are validated for shape
/// but not executed.
fn check_filters(node: &Node) -> Result<Vec<Filter>> {
    if node.kind != Nonterminal::Filters {
        return Err(invalid_tree());
    }
    node.args.iter().map(check_filter).collect()
}

fn check_filter(clause: &Node) -> Result<Filter> {
    match clause.kind {
        Nonterminal::WhereExpr if clause.args.len() == 3 => Ok(Filter),
        Nonterminal::OrderBy if clause.args.len() == 1 => Ok(Filter),
        Nonterminal::InnerJoin
        | Nonterminal::OuterJoin
        | Nonterminal::LeftJoin
        | Nonterminal::RightJoin
            if clause.args.len() == 4 =>
        {
            Ok(Filter)
        }
        _ => Err(invalid_tree()),
    }
}

/// Accepts the WHERE clauses of an UPDATE or DELETE, if any. The clause is
/// carried through compilation but ignored by the executor.
fn check_where_clause(node: &Node) -> Result<Option<WhereClause>> {
    if node.kind != Nonterminal::Filters {
        return Err(invalid_tree());
    }
    for clause in &node.args {
        check_filter(clause)?;
    }
    Ok(node.args.iter().any(|clause| clause.kind == Nonterminal::WhereExpr).then_some(WhereClause))
}
