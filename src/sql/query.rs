use std::collections::BTreeMap;

use super::types::Value;

/// A semantic representation of a type-checked query, ready for execution.
/// Instantiated by compile.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
    Compound(CompoundQuery),
}

/// A SELECT query. An empty key list selects every field.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    pub keys: Vec<String>,
    pub table: String,
    pub filters: Vec<Filter>,
}

/// An INSERT query. Each value row aligns positionally with the key list.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertQuery {
    pub keys: Vec<String>,
    pub values: Vec<Vec<Value>>,
    pub table: String,
}

/// An UPDATE query.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateQuery {
    pub values: BTreeMap<String, Value>,
    pub table: String,
    pub filter: Option<WhereClause>,
}

/// A DELETE query.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteQuery {
    pub table: String,
    pub filter: Option<WhereClause>,
}

/// Two queries combined by a compound operator. The left operand must be a
/// plain SELECT.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundQuery {
    pub left: SelectQuery,
    pub op: CompoundOp,
    pub right: Box<Query>,
}

/// A compound set operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompoundOp {
    Union,
    Intersect,
    Difference,
}

/// A filter clause on a SELECT: WHERE, ORDER BY or a join. Accepted by the
/// compiler but not evaluated during execution.
// TODO: carry the parsed operands once filter execution lands.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter;

/// A WHERE clause on an UPDATE or DELETE. Accepted by the compiler but not
/// evaluated: updates currently rewrite every row of the table.
#[derive(Clone, Debug, PartialEq)]
pub struct WhereClause;
