// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Result rows as events.

use crate::context::EventSink;
use crate::error::{Error, Result};
use crate::event::{Event, Value};
use std::borrow::Cow;

/// One column value as a database driver returns it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    /// Integers that fit 32 bits travel as `Int`.
    pub fn value(&self) -> Value<'_> {
        match self {
            Cell::Null => Value::Null,
            Cell::Int(v) => i32::try_from(*v).map_or(Value::Int64(*v), Value::Int),
            Cell::Double(v) => Value::Double(*v),
            Cell::Text(s) => Value::Str(Cow::Borrowed(s)),
            Cell::Blob(b) => Value::Raw(Cow::Borrowed(b)),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Double(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_owned())
    }
}

impl From<Vec<u8>> for Cell {
    fn from(v: Vec<u8>) -> Self {
        Cell::Blob(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Null, Into::into)
    }
}

/// Send one row as a record whose members are named after the columns.
pub fn feed_row<S: EventSink + ?Sized>(sink: &mut S, columns: &[&str], cells: &[Cell]) -> Result<()> {
    if columns.len() != cells.len() {
        return Err(Error::InvalidState("row width differs from the column count"));
    }
    sink.send(&Event::new(Value::RecordBegin))?;
    for (name, cell) in columns.iter().zip(cells) {
        sink.send(&Event::named(name, cell.value()))?;
    }
    sink.send(&Event::new(Value::RecordEnd))
}

/// Send rows as a sequence of records.
pub fn feed_rows<S, R>(sink: &mut S, columns: &[&str], rows: impl IntoIterator<Item = R>) -> Result<()>
where
    S: EventSink + ?Sized,
    R: AsRef<[Cell]>,
{
    sink.send(&Event::new(Value::SequenceBegin))?;
    for row in rows {
        feed_row(sink, columns, row.as_ref())?;
    }
    sink.send(&Event::new(Value::SequenceEnd))
}

/// Column list of a result set, feeding its rows into a chain.
#[derive(Debug, Clone, Default)]
pub struct RowSource {
    columns: Vec<String>,
}

impl RowSource {
    pub fn new<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn names(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    pub fn feed<S: EventSink + ?Sized>(&self, sink: &mut S, cells: &[Cell]) -> Result<()> {
        feed_row(sink, &self.names(), cells)
    }

    pub fn feed_all<S, R>(&self, sink: &mut S, rows: impl IntoIterator<Item = R>) -> Result<()>
    where
        S: EventSink + ?Sized,
        R: AsRef<[Cell]>,
    {
        feed_rows(sink, &self.names(), rows)
    }
}
