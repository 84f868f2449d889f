// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # SQXC - typed values over a push-event chain
//!
//! Runtime type descriptors and a push protocol that moves values between
//! Rust structs, JSON text and relational rows without an intermediate tree.
//!
//! ## Quick Start
//!
//! ```rust
//! use sqxc::{from_json, to_json, Record};
//!
//! #[derive(Record, Default, Debug, PartialEq)]
//! struct User {
//!     #[sqxc(primary)]
//!     id: i32,
//!     name: String,
//!     tags: Vec<String>,
//! }
//!
//! let user: User = from_json(r#"{"id": 7, "name": "Ada", "tags": ["x"], "extra": {}}"#).unwrap();
//! assert_eq!(user.name, "Ada");
//! assert_eq!(to_json(&user).unwrap(), r#"{"id":7,"name":"Ada","tags":["x"]}"#);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Drivers        JsonReader | RowSource | Chain::write (typed value) |
//! +---------------------------------------------------------------------+
//! |  Chain          READY -> send(event)* -> FINISH, kind negotiation   |
//! |                 BlobCodec | JsonParser | nested JsonWriter          |
//! +---------------------------------------------------------------------+
//! |  Terminals      ValueMaterializer | JsonWriter | StatementWriter    |
//! +---------------------------------------------------------------------+
//! |  Types          TypeDescriptor / FieldDescriptor, NestedStack       |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeDescriptor`] | Runtime description of a scalar, record or sequence type |
//! | [`FieldDescriptor`] | One named member of a record type |
//! | [`Event`] | One unit of the push protocol |
//! | [`Chain`] | Ordered nodes serving one operation |
//! | [`ValueMaterializer`] | Terminal building typed values |
//! | [`JsonWriter`] | Terminal (or nested) JSON text output |
//! | [`StatementWriter`] | Terminal producing SQL literal fragments |

// Allow the derive macro to work inside this crate's tests
extern crate self as sqxc;

/// Chain protocol and its nodes.
pub mod chain;
/// Limits, per-run configuration and shared defaults.
pub mod config;
/// Contexts handed to type handlers.
pub mod context;
/// Status codes and the error type.
pub mod error;
/// Event vocabulary.
pub mod event;
/// Nested-frame stack.
pub mod nested;
/// Type descriptors, handlers and the type registry.
pub mod types;

pub use chain::{
    BlobCodec, BlobEncoding, Cell, Chain, ChainNode, Dialect, EventRecorder, JsonParser,
    JsonReader, JsonWriter, RowSource, Statement, StatementWriter, ValueMaterializer,
};
pub use config::{ChainConfig, SharedConfig, UnknownFieldPolicy};
pub use context::EventSink;
pub use error::{Band, Error, Result};
pub use event::{Event, EventKind, KindSet, Value};
pub use types::{
    Blob, FieldDescriptor, FieldFlags, Record, Reflect, TypeDescriptor, TypeRef, TypeRegistry,
};

/// Derive macro (for `#[derive(sqxc::Record)]`).
#[cfg(feature = "derive")]
pub use sqxc_codegen::Record;

/// Parse one JSON document into a `T`. Unknown fields are skipped.
pub fn from_json<T: Reflect>(text: &str) -> Result<T> {
    from_json_with(text, ChainConfig::default())
}

/// [`from_json`] with explicit limits and policies.
pub fn from_json_with<T: Reflect>(text: &str, config: ChainConfig) -> Result<T> {
    let reader = JsonReader::with_max_depth(config.max_depth);
    let mut chain = Chain::with_config(config).with(ValueMaterializer::of::<T>());
    chain.ready()?;
    let fed = reader.feed(text, &mut chain);
    let finished = chain.finish();
    fed.and(finished)?;
    take_value(&mut chain)
}

/// Compact JSON text of `value`.
pub fn to_json<T: Reflect>(value: &T) -> Result<String> {
    let mut chain = Chain::new().with(JsonWriter::new());
    chain.ready()?;
    let written = chain.write_value(value);
    let finished = chain.finish();
    written.and(finished)?;
    chain
        .node_mut::<JsonWriter>()
        .ok_or(Error::InvalidState("json writer missing from chain"))?
        .take_text()
}

/// Build a `T` from one result row. Text columns holding a JSON object or
/// array fill container fields.
pub fn from_row<T: Reflect>(columns: &[&str], cells: &[Cell]) -> Result<T> {
    let mut chain = Chain::new()
        .with(ValueMaterializer::of::<T>())
        .with(JsonParser::new());
    chain.ready()?;
    let fed = chain::feed_row(&mut chain, columns, cells);
    let finished = chain.finish();
    fed.and(finished)?;
    take_value(&mut chain)
}

/// Column/value fragments of a record value. Container fields become JSON text.
pub fn to_statement<T: Reflect>(value: &T, dialect: Dialect) -> Result<Statement> {
    let mut chain = Chain::new()
        .with(StatementWriter::new(dialect))
        .with(JsonWriter::nested());
    chain.ready()?;
    let written = chain.write_value(value);
    let finished = chain.finish();
    written.and(finished)?;
    chain
        .node_mut::<StatementWriter>()
        .ok_or(Error::InvalidState("statement writer missing from chain"))?
        .take_statements()
        .pop()
        .ok_or(Error::InvalidState("value is not a record"))
}

fn take_value<T: Reflect>(chain: &mut Chain) -> Result<T> {
    chain
        .node_mut::<ValueMaterializer>()
        .ok_or(Error::InvalidState("materializer missing from chain"))?
        .take::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        assert_eq!(from_json::<i64>("-12").unwrap(), -12);
        assert_eq!(to_json(&String::from("a\"b")).unwrap(), r#""a\"b""#);
        assert_eq!(from_json::<Vec<i32>>("[1,2,3]").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_incomplete_json_is_an_error() {
        // Malformed text never yields a partial value.
        assert!(matches!(
            from_json::<Vec<i32>>("[1,2"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_statement_needs_a_record() {
        assert!(matches!(
            to_statement(&5i32, Dialect::Sqlite),
            Err(Error::TypeNotSupported(_)) | Err(Error::TypeMismatch { .. })
        ));
    }
}
