pub mod ast;
mod lexer;

pub use lexer::{Keyword, Lexer, Symbol, Token};

use ast::{Node, Nonterminal};

use crate::error::{Error, Result};

/// A recursive-descent SQL parser over a single token of lookahead,
/// producing a tree of nonterminal nodes.
pub struct Parser<'a> {
    lexer: std::iter::Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given string input. The input must not
    /// contain a trailing semicolon; the read loop strips it.
    pub fn new(statement: &str) -> Parser {
        Parser { lexer: Lexer::new(statement).peekable() }
    }

    /// Parses an SQL statement: one query, optionally combined with further
    /// queries by left-associative compound operators.
    pub fn parse(&mut self) -> Result<Node> {
        let mut node = self.query()?;
        while let Some(token) = self.peek()? {
            let kind = match token {
                Token::Keyword(Keyword::Union) => Nonterminal::UnionOf,
                Token::Keyword(Keyword::Intersect) => Nonterminal::IntersectionOf,
                Token::Keyword(Keyword::Minus) => Nonterminal::DifferenceOf,
                token => {
                    return Err(Error::Parse(format!(
                        "Expected UNION, INTERSECT or MINUS, found {}",
                        token
                    )))
                }
            };
            self.next()?;
            node = Node::new(kind, vec![node, self.query()?]);
        }
        Ok(Node::new(Nonterminal::Statement, vec![node]))
    }

    /// Grabs the next lexer token, or throws an error if none is found.
    fn next(&mut self) -> Result<Token> {
        self.lexer.next().unwrap_or_else(|| Err(Error::Parse("Unexpected end of input".into())))
    }

    /// Grabs the next lexer token, and returns it if it was expected or
    /// otherwise throws an error.
    fn next_expect(&mut self, expected: Token) -> Result<Token> {
        let actual = self.next()?;
        if actual == expected {
            Ok(actual)
        } else {
            Err(Error::Parse(format!("Expected token {}, found {}", expected, actual)))
        }
    }

    /// Grabs the next lexer token if it satisfies the predicate function.
    fn next_if<F>(&mut self, predicate: F) -> Option<Token>
    where
        F: Fn(&Token) -> bool,
    {
        self.peek().unwrap_or(None).filter(|token| predicate(token))?;
        self.next().ok()
    }

    /// Grabs the next lexer token if it is a given token.
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| *t == token)
    }

    /// Peeks the next lexer token if any, but converts it from
    /// Option<Result<Token>> to Result<Option<Token>> which is
    /// more convenient to work with (the Iterator trait requires Option<T>).
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Parses a single query.
    fn query(&mut self) -> Result<Node> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => self.select_from(),
            Some(Token::Keyword(Keyword::Insert)) => self.insert_into(),
            Some(Token::Keyword(Keyword::Update)) => self.update_set(),
            Some(Token::Keyword(Keyword::Delete)) => self.delete_from(),
            Some(token) => {
                Err(Error::Parse(format!("Expected SELECT, INSERT, UPDATE or DELETE, found {}", token)))
            }
            None => Err(Error::Parse("Expected SELECT, INSERT, UPDATE or DELETE, found end of input".into())),
        }
    }

    /// Parses a SELECT query.
    fn select_from(&mut self) -> Result<Node> {
        self.next_expect(Keyword::Select.into())?;
        let keys = self.key_list()?;
        self.next_expect(Keyword::From.into())?;
        let table = self.table()?;
        let filters = self.filters()?;
        Ok(Node::new(Nonterminal::SelectFrom, vec![keys, table, filters]))
    }

    /// Parses an INSERT query.
    fn insert_into(&mut self) -> Result<Node> {
        self.next_expect(Keyword::Insert.into())?;
        let keys = self.keys()?;
        self.next_expect(Keyword::Into.into())?;
        let table = self.table()?;
        self.next_expect(Keyword::Values.into())?;
        let values = self.values_list()?;
        Ok(Node::new(Nonterminal::InsertInto, vec![keys, table, values]))
    }

    /// Parses an UPDATE query.
    fn update_set(&mut self) -> Result<Node> {
        self.next_expect(Keyword::Update.into())?;
        let table = self.table()?;
        self.next_expect(Keyword::Set.into())?;
        let assignments = self.assignment_list()?;
        let filters = self.filters()?;
        Ok(Node::new(Nonterminal::UpdateSet, vec![table, assignments, filters]))
    }

    /// Parses a DELETE query.
    fn delete_from(&mut self) -> Result<Node> {
        self.next_expect(Keyword::Delete.into())?;
        self.next_expect(Keyword::From.into())?;
        let table = self.table()?;
        let filters = self.filters()?;
        Ok(Node::new(Nonterminal::DeleteFrom, vec![table, filters]))
    }

    /// Parses a comma-separated list of keys.
    fn key_list(&mut self) -> Result<Node> {
        let mut args = vec![self.key()?];
        while self.next_if_token(Symbol::Comma.into()).is_some() {
            args.push(self.key()?);
        }
        Ok(Node::new(Nonterminal::KeyList, args))
    }

    /// Parses a comma-separated list of values.
    fn literal_list(&mut self) -> Result<Node> {
        let mut args = vec![self.value()?];
        while self.next_if_token(Symbol::Comma.into()).is_some() {
            args.push(self.value()?);
        }
        Ok(Node::new(Nonterminal::LiteralList, args))
    }

    /// Parses a parenthesised key list.
    fn keys(&mut self) -> Result<Node> {
        self.next_expect(Symbol::OpenParen.into())?;
        let list = self.key_list()?;
        self.next_expect(Symbol::CloseParen.into())?;
        Ok(Node::new(Nonterminal::Keys, vec![list]))
    }

    /// Parses a parenthesised value list.
    fn values(&mut self) -> Result<Node> {
        self.next_expect(Symbol::OpenParen.into())?;
        let list = self.literal_list()?;
        self.next_expect(Symbol::CloseParen.into())?;
        Ok(Node::new(Nonterminal::Literals, vec![list]))
    }

    /// Parses a comma-separated list of parenthesised value lists.
    fn values_list(&mut self) -> Result<Node> {
        let mut args = vec![self.values()?];
        while self.next_if_token(Symbol::Comma.into()).is_some() {
            args.push(self.values()?);
        }
        Ok(Node::new(Nonterminal::ValueList, args))
    }

    /// Parses a single key = value assignment.
    fn assignment(&mut self) -> Result<Node> {
        let key = self.key()?;
        self.next_expect(Symbol::Equal.into())?;
        let value = self.value()?;
        Ok(Node::new(Nonterminal::Assignment, vec![key, value]))
    }

    /// Parses a comma-separated list of assignments.
    fn assignment_list(&mut self) -> Result<Node> {
        let mut args = vec![self.assignment()?];
        while self.next_if_token(Symbol::Comma.into()).is_some() {
            args.push(self.assignment()?);
        }
        Ok(Node::new(Nonterminal::AssignmentList, args))
    }

    /// Parses any number of trailing filter clauses: WHERE expressions
    /// (chained with AND), ORDER BY, and joins. Stops at the end of the
    /// statement or at a compound operator.
    fn filters(&mut self) -> Result<Node> {
        let mut args = Vec::new();
        loop {
            match self.peek()? {
                Some(Token::Keyword(Keyword::Where)) => {
                    args.push(self.where_expr(Keyword::Where)?);
                    while self.peek()? == Some(Token::Keyword(Keyword::And)) {
                        args.push(self.where_expr(Keyword::And)?);
                    }
                }
                Some(Token::Keyword(Keyword::OrderBy)) => args.push(self.order_by()?),
                Some(Token::Keyword(Keyword::Inner))
                | Some(Token::Keyword(Keyword::Outer))
                | Some(Token::Keyword(Keyword::Left))
                | Some(Token::Keyword(Keyword::Right))
                | Some(Token::Keyword(Keyword::Join)) => args.push(self.join()?),
                None
                | Some(Token::Keyword(Keyword::Union))
                | Some(Token::Keyword(Keyword::Intersect))
                | Some(Token::Keyword(Keyword::Minus)) => {
                    return Ok(Node::new(Nonterminal::Filters, args))
                }
                Some(token) => {
                    return Err(Error::Parse(format!(
                        "Expected WHERE, ORDER BY or JOIN, found {}",
                        token
                    )))
                }
            }
        }
    }

    /// Parses one WHERE or AND comparison clause, introduced by the given
    /// keyword.
    fn where_expr(&mut self, introducer: Keyword) -> Result<Node> {
        self.next_expect(introducer.into())?;
        let lhs = self.value()?;
        let comparator = self.comparator()?;
        let rhs = self.value()?;
        Ok(Node::new(Nonterminal::WhereExpr, vec![lhs, comparator, rhs]))
    }

    /// Parses a comparison operator.
    fn comparator(&mut self) -> Result<Node> {
        match self.next()? {
            Token::Symbol(Symbol::LessThan) => Ok(Node::new(Nonterminal::Smaller, Vec::new())),
            Token::Symbol(Symbol::GreaterThan) => Ok(Node::new(Nonterminal::Larger, Vec::new())),
            Token::Symbol(Symbol::Equal) => Ok(Node::new(Nonterminal::Equals, Vec::new())),
            token => Err(Error::Parse(format!("Expected <, > or =, found {}", token))),
        }
    }

    /// Parses an ORDER BY clause.
    fn order_by(&mut self) -> Result<Node> {
        self.next_expect(Keyword::OrderBy.into())?;
        let key = self.key()?;
        Ok(Node::new(Nonterminal::OrderBy, vec![key]))
    }

    /// Parses a join clause. A bare JOIN is an inner join.
    fn join(&mut self) -> Result<Node> {
        let kind = match self.peek()? {
            Some(Token::Keyword(Keyword::Inner)) => {
                self.next()?;
                Nonterminal::InnerJoin
            }
            Some(Token::Keyword(Keyword::Outer)) => {
                self.next()?;
                Nonterminal::OuterJoin
            }
            Some(Token::Keyword(Keyword::Left)) => {
                self.next()?;
                Nonterminal::LeftJoin
            }
            Some(Token::Keyword(Keyword::Right)) => {
                self.next()?;
                Nonterminal::RightJoin
            }
            Some(Token::Keyword(Keyword::Join)) => Nonterminal::InnerJoin,
            Some(token) => {
                return Err(Error::Parse(format!("Expected a JOIN clause, found {}", token)))
            }
            None => return Err(Error::Parse("Expected a JOIN clause, found end of input".into())),
        };
        self.next_expect(Keyword::Join.into())?;
        let table = self.table()?;
        self.next_expect(Keyword::On.into())?;
        let lhs = self.key()?;
        let comparator = self.comparator()?;
        let rhs = self.key()?;
        Ok(Node { kind, args: vec![table, lhs, comparator, rhs], val: String::new() })
    }

    /// Parses a key: an identifier or *.
    fn key(&mut self) -> Result<Node> {
        match self.next()? {
            Token::Identifier(name) => Ok(Node::with_val(Nonterminal::Key, name)),
            Token::Symbol(Symbol::Asterisk) => Ok(Node::with_val(Nonterminal::Key, "*")),
            token => Err(Error::Parse(format!("Expected identifier or *, found {}", token))),
        }
    }

    /// Parses a table name.
    fn table(&mut self) -> Result<Node> {
        match self.next()? {
            Token::Identifier(name) => Ok(Node::with_val(Nonterminal::Table, name)),
            token => Err(Error::Parse(format!("Expected table name, found {}", token))),
        }
    }

    /// Parses a value: a key, an integer literal or a string literal.
    fn value(&mut self) -> Result<Node> {
        match self.peek()? {
            Some(Token::Identifier(_)) | Some(Token::Symbol(Symbol::Asterisk)) => self.key(),
            Some(Token::Number(n)) => {
                self.next()?;
                Ok(Node::new(
                    Nonterminal::Literal,
                    vec![Node::with_val(Nonterminal::Integer, n)],
                ))
            }
            Some(Token::String(s)) => {
                self.next()?;
                Ok(Node::new(
                    Nonterminal::Literal,
                    vec![Node::with_val(Nonterminal::StrVal, s)],
                ))
            }
            Some(token) => {
                Err(Error::Parse(format!("Expected a key, string or number, found {}", token)))
            }
            None => Err(Error::Parse("Expected a key, string or number, found end of input".into())),
        }
    }
}
