// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Status codes and the crate-wide error type.
//!
//! Every failure maps to a numeric code inside one of three bands:
//!
//! | Band      | Range        | Meaning                                   |
//! |-----------|--------------|-------------------------------------------|
//! | `Ok`      | `0..=999`    | success / informational                   |
//! | `Warning` | `2000..=2999`| recoverable (skip, retry another node)    |
//! | `Error`   | `3000..=3999`| the current operation is aborted          |
//!
//! `1000..=1999` and everything above `3999` are unassigned. A code there can
//! only come from outside this crate and is treated as an error.
//!
//! Callers that only need generic recovery should branch on [`Error::band`]
//! rather than on individual codes.

use crate::event::EventKind;
use thiserror::Error;

/// Numeric status codes.
pub mod code {
    pub const OK: u16 = 0;

    pub const ENTRY_NOT_FOUND: u16 = 2001;
    pub const TYPE_MISMATCH: u16 = 2002;
    pub const TYPE_NOT_SUPPORTED: u16 = 2003;
    pub const OUT_OF_RANGE: u16 = 2004;

    pub const TOO_MANY_NESTED: u16 = 3001;
    pub const NO_ELEMENT_TYPE: u16 = 3002;
    pub const NOT_SUPPORTED: u16 = 3003;
    pub const DUPLICATE_FIELD: u16 = 3004;
    pub const SEQUENCE_TOO_LONG: u16 = 3005;
    pub const SYNTAX: u16 = 3006;
    pub const INVALID_STATE: u16 = 3007;
    pub const ABORTED: u16 = 3008;
    pub const CONFIG: u16 = 3009;
    pub const IO: u16 = 3010;
    pub const DUPLICATE_TYPE: u16 = 3011;
}

/// Status band of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Ok,
    Warning,
    Error,
}

impl Band {
    /// Classify a raw status code.
    pub fn of(code: u16) -> Self {
        match code {
            0..=999 => Band::Ok,
            2000..=2999 => Band::Warning,
            3000..=3999 => Band::Error,
            // Unassigned.
            1000..=1999 | 4000.. => Band::Error,
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    // ===== Warnings =====
    /// Unknown field or column name.
    #[error("no entry named '{0}'")]
    EntryNotFound(String),

    /// The event kind does not match what the handler expects here.
    #[error("type mismatch at '{at}': {expected} does not take {got}")]
    TypeMismatch {
        expected: String,
        got: EventKind,
        at: String,
    },

    /// No node in the chain accepts this event kind.
    #[error("no node accepts {0} events")]
    TypeNotSupported(EventKind),

    /// Numeric narrowing failed.
    #[error("value {value} out of range for '{at}'")]
    OutOfRange { value: String, at: String },

    // ===== Errors =====
    /// Nested container depth exceeded the configured limit.
    #[error("too many nested containers (limit {limit})")]
    TooManyNested { limit: usize },

    /// A sequence type has no element type.
    #[error("sequence type '{0}' has no element type")]
    NoElementType(String),

    /// Control operation not implemented by the node.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Record type defined with two fields of the same name.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// Bounded sequence is full.
    #[error("sequence '{at}' exceeds its maximum length {max}")]
    SequenceTooLong { max: usize, at: String },

    /// Malformed text input.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Operation called in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Node refused further events after a fatal error. Cleared by FINISH.
    #[error("node aborted by an earlier error")]
    Aborted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Type name already registered.
    #[error("type '{0}' is already registered")]
    DuplicateType(String),
}

impl Error {
    /// Build a type mismatch for an unnamed position.
    pub fn mismatch(expected: impl Into<String>, got: EventKind) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            got,
            at: String::new(),
        }
    }

    /// Numeric status code of this error.
    pub fn code(&self) -> u16 {
        match self {
            Error::EntryNotFound(_) => code::ENTRY_NOT_FOUND,
            Error::TypeMismatch { .. } => code::TYPE_MISMATCH,
            Error::TypeNotSupported(_) => code::TYPE_NOT_SUPPORTED,
            Error::OutOfRange { .. } => code::OUT_OF_RANGE,
            Error::TooManyNested { .. } => code::TOO_MANY_NESTED,
            Error::NoElementType(_) => code::NO_ELEMENT_TYPE,
            Error::NotSupported(_) => code::NOT_SUPPORTED,
            Error::DuplicateField(_) => code::DUPLICATE_FIELD,
            Error::SequenceTooLong { .. } => code::SEQUENCE_TOO_LONG,
            Error::Syntax { .. } => code::SYNTAX,
            Error::InvalidState(_) => code::INVALID_STATE,
            Error::Aborted => code::ABORTED,
            Error::Config(_) => code::CONFIG,
            Error::Io(_) => code::IO,
            Error::DuplicateType(_) => code::DUPLICATE_TYPE,
        }
    }

    pub fn band(&self) -> Band {
        Band::of(self.code())
    }

    pub fn is_warning(&self) -> bool {
        self.band() == Band::Warning
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. })
    }

    /// Attach a field/column name to positional errors that lack one.
    pub fn at(mut self, name: &str) -> Self {
        match &mut self {
            Error::TypeMismatch { at, .. }
            | Error::OutOfRange { at, .. }
            | Error::SequenceTooLong { at, .. }
                if at.is_empty() =>
            {
                name.clone_into(at);
            }
            _ => {}
        }
        self
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Status code of a result (`0` on success).
pub fn status<T>(result: &Result<T>) -> u16 {
    match result {
        Ok(_) => code::OK,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(Band::of(0), Band::Ok);
        assert_eq!(Band::of(2001), Band::Warning);
        assert_eq!(Band::of(3001), Band::Error);
        assert_eq!(Band::of(999), Band::Ok);
        assert_eq!(Band::of(1000), Band::Error);
        assert_eq!(Band::of(1999), Band::Error);
        assert_eq!(Band::of(9999), Band::Error);
    }

    #[test]
    fn test_codes_fall_in_declared_bands() {
        assert!(Error::EntryNotFound("ghost".into()).is_warning());
        assert!(Error::mismatch("int", EventKind::Str).is_warning());
        assert!(Error::TypeNotSupported(EventKind::Raw).is_warning());
        assert_eq!(Error::TooManyNested { limit: 4 }.band(), Band::Error);
        assert_eq!(Error::NoElementType("seq".into()).band(), Band::Error);
        assert_eq!(Error::NotSupported("custom".into()).code(), 3003);
        assert_eq!(Error::Aborted.band(), Band::Error);
    }

    #[test]
    fn test_at_fills_only_empty_position() {
        let err = Error::mismatch("int", EventKind::Str).at("id").at("other");
        match err {
            Error::TypeMismatch { at, .. } => assert_eq!(at, "id"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status() {
        let ok: Result<()> = Ok(());
        assert_eq!(status(&ok), code::OK);
        let err: Result<()> = Err(Error::Aborted);
        assert_eq!(status(&err), code::ABORTED);
    }
}
