//! Named placeholder rewriting and statement classification.
//!
//! Uses the sqlparser-rs tokenizer so that `:name` sequences inside string
//! literals, quoted identifiers, comments and `::` casts are left alone.

use std::collections::HashMap;

use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Location, Token, Tokenizer};
use tracing::debug;

use crate::db::DatabaseBackend;
use crate::error::{Result, RunnerError};

use super::params::{BoundValue, NamedParameter};

/// Leading keywords of statements that hand back rows.
const ROW_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "SHOW", "VALUES", "EXPLAIN", "PRAGMA", "DESCRIBE", "DESC", "TABLE",
];

/// Keywords that can start the main statement after a WITH clause.
const WITH_BODY_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "VALUES", "TABLE",
];

/// Whether a statement returns rows or only an affected-row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT-like statements, and anything with a RETURNING clause.
    Rows,
    /// INSERT/UPDATE/DELETE, DDL and everything else.
    Mutation,
}

/// SQL text rewritten to positional placeholders for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSql {
    sql: String,
    names: Vec<String>,
    kind: StatementKind,
}

impl PreparedSql {
    /// Tokenizes `sql`, replacing each `:name` with the backend's numbered
    /// placeholder. A name used several times maps to a single index.
    pub fn parse(sql: &str, backend: DatabaseBackend) -> Result<Self> {
        let dialect = dialect_for(backend);
        let tokens = Tokenizer::new(dialect.as_ref(), sql)
            .tokenize_with_location()
            .map_err(|e| RunnerError::sql(format!("Could not tokenize SQL: {e}")))?;
        let lines = LineStarts::new(sql);

        // Text between placeholders is copied from `sql` verbatim
        let mut rewritten = String::with_capacity(sql.len());
        let mut copied = 0;
        let mut names: Vec<String> = Vec::new();
        let mut leading_keyword: Option<String> = None;
        let mut body_keyword: Option<String> = None;
        let mut has_returning = false;
        let mut depth = 0usize;

        let token_end = |index: usize| {
            tokens
                .get(index + 1)
                .map(|next| lines.offset(sql, &next.location))
                .unwrap_or(sql.len())
        };

        let mut i = 0;
        while i < tokens.len() {
            let start = lines.offset(sql, &tokens[i].location);
            let previous = i.checked_sub(1).map(|p| &tokens[p].token);

            let placeholder = match &tokens[i].token {
                // `arr[1:n]` and `arr[lo:hi]` are array slices
                Token::Colon | Token::Placeholder(_) if is_slice_bound(previous) => None,
                Token::Colon => match tokens.get(i + 1).map(|t| &t.token) {
                    Some(Token::Word(word)) if word.quote_style.is_none() => {
                        i += 1;
                        Some(word.value.clone())
                    }
                    _ => None,
                },
                Token::Placeholder(placeholder) => match placeholder.strip_prefix(':') {
                    Some(name) if !name.is_empty() => Some(name.to_string()),
                    _ => {
                        return Err(RunnerError::sql(format!(
                            "positional placeholder '{placeholder}' is not supported; use named placeholders such as :name"
                        )));
                    }
                },
                Token::LParen => {
                    depth += 1;
                    None
                }
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    None
                }
                Token::Word(word) if word.quote_style.is_none() => {
                    let keyword = word.value.to_uppercase();
                    if depth == 0 {
                        if keyword == "RETURNING" {
                            has_returning = true;
                        }
                        if leading_keyword.as_deref() == Some("WITH")
                            && body_keyword.is_none()
                            && WITH_BODY_KEYWORDS.contains(&keyword.as_str())
                        {
                            body_keyword = Some(keyword.clone());
                        }
                    }
                    if leading_keyword.is_none() {
                        leading_keyword = Some(keyword);
                    }
                    None
                }
                _ => None,
            };

            if let Some(name) = placeholder {
                let index = placeholder_index(&mut names, name);
                rewritten.push_str(&sql[copied..start]);
                rewritten.push_str(&backend.placeholder(index));
                copied = token_end(i);
            }
            i += 1;
        }
        rewritten.push_str(&sql[copied..]);

        let Some(leading_keyword) = leading_keyword else {
            return Err(RunnerError::sql("empty SQL statement"));
        };

        let kind = classify_parsed(dialect.as_ref(), &rewritten).unwrap_or_else(|| {
            let keyword = body_keyword.unwrap_or(leading_keyword);
            if has_returning || ROW_KEYWORDS.contains(&keyword.as_str()) {
                StatementKind::Rows
            } else {
                StatementKind::Mutation
            }
        });

        debug!(
            "Prepared {:?} statement with {} placeholder(s)",
            kind,
            names.len()
        );

        Ok(Self {
            sql: rewritten,
            names,
            kind,
        })
    }

    /// Rewritten SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholder names, indexed by position minus one.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Statement classification.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Matches `params` against the placeholders and converts them into one
    /// bound value per placeholder index.
    ///
    /// Fails on duplicate parameter names, parameters without a placeholder
    /// and placeholders without a parameter.
    pub fn bind(&self, params: &[NamedParameter]) -> Result<Vec<BoundValue>> {
        let mut by_name: HashMap<&str, &NamedParameter> = HashMap::with_capacity(params.len());

        for param in params {
            if by_name.insert(param.name.as_str(), param).is_some() {
                return Err(RunnerError::sql(format!(
                    "parameter ':{}' supplied more than once",
                    param.name
                )));
            }
            if !self.names.iter().any(|name| name == &param.name) {
                return Err(RunnerError::sql(format!(
                    "parameter ':{}' has no matching placeholder in the statement",
                    param.name
                )));
            }
        }

        let mut bound = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let param = by_name.get(name.as_str()).ok_or_else(|| {
                RunnerError::sql(format!("no value supplied for placeholder ':{name}'"))
            })?;
            bound.push(param.to_bound()?);
        }

        Ok(bound)
    }
}

fn dialect_for(backend: DatabaseBackend) -> Box<dyn Dialect> {
    match backend {
        DatabaseBackend::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseBackend::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Whether a colon after `previous` separates array slice bounds.
fn is_slice_bound(previous: Option<&Token>) -> bool {
    matches!(
        previous,
        Some(
            Token::Number(..)
                | Token::Word(_)
                | Token::LBracket
                | Token::RBracket
                | Token::RParen
                | Token::Colon
                | Token::DoubleColon
        )
    )
}

/// Classifies the statement from its syntax tree. Returns `None` when the
/// SQL does not parse or the statement kind is not covered, leaving the
/// decision to the keyword scan.
fn classify_parsed(dialect: &dyn Dialect, sql: &str) -> Option<StatementKind> {
    let statements = Parser::parse_sql(dialect, sql).ok()?;
    match statements.as_slice() {
        [statement] => classify_statement(statement),
        _ => None,
    }
}

fn classify_statement(statement: &Statement) -> Option<StatementKind> {
    match statement {
        Statement::Query(query) => Some(classify_set_expr(&query.body)),
        Statement::Insert(insert) => Some(returning_kind(insert.returning.is_some())),
        Statement::Update { returning, .. } => Some(returning_kind(returning.is_some())),
        Statement::Delete(delete) => Some(returning_kind(delete.returning.is_some())),
        _ => None,
    }
}

/// A WITH clause keeps the kind of the statement it introduces.
fn classify_set_expr(body: &SetExpr) -> StatementKind {
    match body {
        SetExpr::Insert(statement) | SetExpr::Update(statement) => {
            classify_statement(statement).unwrap_or(StatementKind::Mutation)
        }
        SetExpr::Select(_)
        | SetExpr::Query(_)
        | SetExpr::SetOperation { .. }
        | SetExpr::Values(_)
        | SetExpr::Table(_) => StatementKind::Rows,
    }
}

fn returning_kind(has_returning: bool) -> StatementKind {
    if has_returning {
        StatementKind::Rows
    } else {
        StatementKind::Mutation
    }
}

/// Byte offsets of line starts, for turning tokenizer locations into slices.
struct LineStarts(Vec<usize>);

impl LineStarts {
    fn new(sql: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self(starts)
    }

    /// Byte offset of a 1-based line/column (column counted in chars).
    fn offset(&self, sql: &str, location: &Location) -> usize {
        let Some(&line_start) = self.0.get((location.line as usize).saturating_sub(1)) else {
            return sql.len();
        };
        sql[line_start..]
            .char_indices()
            .nth((location.column as usize).saturating_sub(1))
            .map(|(i, _)| line_start + i)
            .unwrap_or(sql.len())
    }
}

/// Returns the 1-based index for `name`, registering it on first use.
fn placeholder_index(names: &mut Vec<String>, name: String) -> usize {
    match names.iter().position(|existing| *existing == name) {
        Some(position) => position + 1,
        None => {
            names.push(name);
            names.len()
        }
    }
}
