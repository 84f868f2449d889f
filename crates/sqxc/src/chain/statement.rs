// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relational statement fragments.

use super::blob::{self, BlobEncoding};
use super::{ChainNode, Ctrl, Forward, NodeInfo, Product};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, KindSet, Value};
use crate::types::FieldFlags;
use std::any::Any;
use std::fmt;

/// SQL flavour used for quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
}

impl Dialect {
    /// Quoted identifier.
    pub fn quote_ident(self, name: &str) -> String {
        let quote = match self {
            Dialect::Mysql => '`',
            Dialect::Sqlite | Dialect::Postgres => '"',
        };
        let mut out = String::with_capacity(name.len() + 2);
        out.push(quote);
        for c in name.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    /// Quoted string literal.
    pub fn quote_str(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self == Dialect::Mysql => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Byte encoding of blob literals.
    pub fn blob_encoding(self) -> BlobEncoding {
        match self {
            Dialect::Sqlite | Dialect::Mysql => BlobEncoding::Hex,
            Dialect::Postgres => BlobEncoding::PgHex,
        }
    }

    /// Literal for a scalar value. Containers are refused with `TypeMismatch`.
    pub fn literal(self, value: &Value<'_>) -> Result<String> {
        Ok(match value {
            Value::Null => "NULL".to_owned(),
            Value::Bool(v) => match (self, v) {
                (Dialect::Postgres, true) => "TRUE".to_owned(),
                (Dialect::Postgres, false) => "FALSE".to_owned(),
                (_, true) => "1".to_owned(),
                (_, false) => "0".to_owned(),
            },
            Value::Int(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Double(v) if v.is_finite() => format!("{v:?}"),
            Value::Double(_) => "NULL".to_owned(),
            Value::Str(text) => self.quote_str(text),
            Value::Raw(bytes) => {
                let text = blob::encode(bytes, self.blob_encoding()).unwrap_or_default();
                match self {
                    Dialect::Postgres => self.quote_str(&text),
                    Dialect::Sqlite | Dialect::Mysql => text,
                }
            }
            other => return Err(Error::mismatch("sql literal", other.kind())),
        })
    }
}

/// Columns and literal values of one row, kept pairwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    dialect: Dialect,
    columns: Vec<String>,
    values: Vec<String>,
}

impl Statement {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Append a column with an already rendered literal.
    pub fn push(&mut self, column: impl Into<String>, literal: impl Into<String>) {
        self.columns.push(column.into());
        self.values.push(literal.into());
    }

    /// Literal of `column`, if present.
    pub fn value(&self, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index).map(String::as_str)
    }

    /// `("a", "b") VALUES (1, 'x')`
    pub fn insert_columns(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| self.dialect.quote_ident(c))
            .collect();
        format!("({}) VALUES ({})", columns.join(", "), self.values.join(", "))
    }

    /// `"a"=1, "b"='x'`
    pub fn assignments(&self) -> String {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| format!("{}={}", self.dialect.quote_ident(c), v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn insert_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} {}",
            self.dialect.quote_ident(table),
            self.insert_columns()
        )
    }

    pub fn update_sql(&self, table: &str, condition: &str) -> String {
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.dialect.quote_ident(table),
            self.assignments(),
            condition
        )
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.insert_columns())
    }
}

/// Collects one [`Statement`] per top-level record.
///
/// Rows may arrive bare or wrapped in one sequence. A container inside a row
/// is declined, so a nested [`JsonWriter`](super::JsonWriter) placed after
/// this node can turn it into a text value for the column.
#[derive(Debug, Default)]
pub struct StatementWriter {
    dialect: Dialect,
    skip_primary: bool,
    in_sequence: bool,
    current: Option<Statement>,
    statements: Vec<Statement>,
}

impl StatementWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Leave out fields flagged `PRIMARY`, for inserts into auto-keyed tables.
    pub fn skip_primary(mut self) -> Self {
        self.skip_primary = true;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn take_statements(&mut self) -> Vec<Statement> {
        std::mem::take(&mut self.statements)
    }

    fn decline(event: &Event<'_>) -> Error {
        Error::mismatch("sql row", event.kind()).at(event.position())
    }
}

impl ChainNode for StatementWriter {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "statement",
            accepts: KindSet::ALL,
            emits: KindSet::EMPTY,
            product: Product::Sql(self.dialect),
        }
    }

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
        match ctrl {
            Ctrl::Ready(_) => {
                self.in_sequence = false;
                self.current = None;
                Ok(())
            }
            Ctrl::Finish => {
                if self.current.take().is_some() {
                    log::debug!("[chain] statement: dropping unfinished row");
                }
                self.in_sequence = false;
                Ok(())
            }
            other => Err(other.unsupported("statement")),
        }
    }

    fn send(&mut self, event: &Event<'_>, _out: &mut Forward<'_>) -> Result<()> {
        let Some(row) = self.current.as_mut() else {
            return match event.kind() {
                EventKind::RecordBegin => {
                    self.current = Some(Statement::new(self.dialect));
                    Ok(())
                }
                EventKind::SequenceBegin if !self.in_sequence => {
                    self.in_sequence = true;
                    Ok(())
                }
                EventKind::SequenceEnd if self.in_sequence => {
                    self.in_sequence = false;
                    Ok(())
                }
                _ => Err(Self::decline(event)),
            };
        };
        match event.kind() {
            EventKind::RecordEnd => {
                if let Some(row) = self.current.take() {
                    self.statements.push(row);
                }
                Ok(())
            }
            kind if !kind.is_scalar() => Err(Self::decline(event)),
            _ => {
                if self.skip_primary
                    && event
                        .field
                        .is_some_and(|f| f.flags().contains(FieldFlags::PRIMARY))
                {
                    return Ok(());
                }
                let name = event
                    .name
                    .ok_or_else(|| Error::EntryNotFound(String::from("<unnamed>")))?;
                let literal = self.dialect.literal(&event.value)?;
                row.push(name, literal);
                Ok(())
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
