pub mod parser;
pub mod query;
pub mod typecheck;
pub mod types;

pub use query::Query;

use crate::error::Result;
use crate::schema::Schema;

/// Compiles an SQL statement against a database schema into a typed,
/// executable query.
pub fn compile(schema: &Schema, statement: &str) -> Result<Query> {
    let tree = parser::Parser::new(statement).parse()?;
    typecheck::check(schema, &tree)
}
