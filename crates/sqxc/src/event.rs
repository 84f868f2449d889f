// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event vocabulary of the push protocol.
//!
//! The set of kinds is closed: every node and every type handler is defined
//! only in terms of these eleven kinds.

use crate::types::FieldDescriptor;
use std::borrow::Cow;
use std::fmt;

/// Kind tag of an event. Values are single bits so kinds combine into a [`KindSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    Null = 1 << 0,
    Bool = 1 << 1,
    Int = 1 << 2,
    Int64 = 1 << 3,
    Double = 1 << 4,
    Str = 1 << 5,
    Raw = 1 << 6,
    RecordBegin = 1 << 7,
    RecordEnd = 1 << 8,
    SequenceBegin = 1 << 9,
    SequenceEnd = 1 << 10,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Null,
        EventKind::Bool,
        EventKind::Int,
        EventKind::Int64,
        EventKind::Double,
        EventKind::Str,
        EventKind::Raw,
        EventKind::RecordBegin,
        EventKind::RecordEnd,
        EventKind::SequenceBegin,
        EventKind::SequenceEnd,
    ];

    pub fn bit(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Null => "null",
            EventKind::Bool => "bool",
            EventKind::Int => "int",
            EventKind::Int64 => "int64",
            EventKind::Double => "double",
            EventKind::Str => "str",
            EventKind::Raw => "raw",
            EventKind::RecordBegin => "record-begin",
            EventKind::RecordEnd => "record-end",
            EventKind::SequenceBegin => "sequence-begin",
            EventKind::SequenceEnd => "sequence-end",
        }
    }

    /// Opens a container.
    pub fn is_begin(self) -> bool {
        matches!(self, EventKind::RecordBegin | EventKind::SequenceBegin)
    }

    /// Closes a container.
    pub fn is_end(self) -> bool {
        matches!(self, EventKind::RecordEnd | EventKind::SequenceEnd)
    }

    pub fn is_scalar(self) -> bool {
        !self.is_begin() && !self.is_end()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask of event kinds, used for negotiation between chain nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindSet(u16);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);
    pub const ALL: KindSet = KindSet((1 << 11) - 1);
    pub const SCALARS: KindSet = KindSet(
        EventKind::Null as u16
            | EventKind::Bool as u16
            | EventKind::Int as u16
            | EventKind::Int64 as u16
            | EventKind::Double as u16
            | EventKind::Str as u16
            | EventKind::Raw as u16,
    );
    pub const CONTAINERS: KindSet = KindSet(
        EventKind::RecordBegin as u16
            | EventKind::RecordEnd as u16
            | EventKind::SequenceBegin as u16
            | EventKind::SequenceEnd as u16,
    );

    pub const fn from_bits(bits: u16) -> Self {
        KindSet(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn with(self, kind: EventKind) -> Self {
        KindSet(self.0 | kind as u16)
    }

    pub const fn without(self, kind: EventKind) -> Self {
        KindSet(self.0 & !(kind as u16))
    }

    pub const fn union(self, other: KindSet) -> Self {
        KindSet(self.0 | other.0)
    }

    pub fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn intersects(self, other: KindSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<EventKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::EMPTY, KindSet::with)
    }
}

/// Payload of an event.
///
/// `Raw` always carries opaque bytes. Textual encodings of bytes travel as `Str`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i32),
    Int64(i64),
    Double(f64),
    Str(Cow<'a, str>),
    Raw(Cow<'a, [u8]>),
    RecordBegin,
    RecordEnd,
    SequenceBegin,
    SequenceEnd,
}

impl<'a> Value<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            Value::Null => EventKind::Null,
            Value::Bool(_) => EventKind::Bool,
            Value::Int(_) => EventKind::Int,
            Value::Int64(_) => EventKind::Int64,
            Value::Double(_) => EventKind::Double,
            Value::Str(_) => EventKind::Str,
            Value::Raw(_) => EventKind::Raw,
            Value::RecordBegin => EventKind::RecordBegin,
            Value::RecordEnd => EventKind::RecordEnd,
            Value::SequenceBegin => EventKind::SequenceBegin,
            Value::SequenceEnd => EventKind::SequenceEnd,
        }
    }

    pub fn str(text: &'a str) -> Self {
        Value::Str(Cow::Borrowed(text))
    }

    pub fn raw(bytes: &'a [u8]) -> Self {
        Value::Raw(Cow::Borrowed(bytes))
    }

    /// Integer view of `Int`/`Int64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(i64::from(v)),
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Bool(v) => Value::Bool(v),
            Value::Int(v) => Value::Int(v),
            Value::Int64(v) => Value::Int64(v),
            Value::Double(v) => Value::Double(v),
            Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
            Value::Raw(b) => Value::Raw(Cow::Owned(b.into_owned())),
            Value::RecordBegin => Value::RecordBegin,
            Value::RecordEnd => Value::RecordEnd,
            Value::SequenceBegin => Value::SequenceBegin,
            Value::SequenceEnd => Value::SequenceEnd,
        }
    }
}

/// One unit of the push protocol.
///
/// `name` is the field or column name for record members and absent for
/// sequence elements. `field` points back at the descriptor that produced the
/// event when the event comes from a typed writer.
#[derive(Debug, Clone)]
pub struct Event<'a> {
    pub name: Option<&'a str>,
    pub value: Value<'a>,
    pub field: Option<&'a FieldDescriptor>,
}

impl<'a> Event<'a> {
    pub fn new(value: Value<'a>) -> Self {
        Self {
            name: None,
            value,
            field: None,
        }
    }

    pub fn named(name: &'a str, value: Value<'a>) -> Self {
        Self {
            name: Some(name),
            value,
            field: None,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.value.kind()
    }

    /// Name for diagnostics, empty at the root.
    pub fn position(&self) -> &str {
        self.name.unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_set_membership() {
        let set = KindSet::SCALARS.without(EventKind::Raw);
        assert!(set.contains(EventKind::Str));
        assert!(!set.contains(EventKind::Raw));
        assert!(!set.contains(EventKind::RecordBegin));
        assert!(KindSet::ALL.contains(EventKind::SequenceEnd));
        assert!(KindSet::EMPTY.is_empty());
        assert!(!KindSet::EMPTY.intersects(KindSet::ALL));
    }

    #[test]
    fn test_kind_set_from_iter() {
        let set: KindSet = [EventKind::Int, EventKind::Str].into_iter().collect();
        assert_eq!(
            set.bits(),
            EventKind::Int as u16 | EventKind::Str as u16
        );
        assert_eq!(KindSet::SCALARS.union(KindSet::CONTAINERS), KindSet::ALL);
    }

    #[test]
    fn test_value_kind_and_owned() {
        let text = String::from("alex");
        let value = Value::str(&text).into_owned();
        drop(text);
        assert_eq!(value.kind(), EventKind::Str);
        assert_eq!(value.as_str(), Some("alex"));
        assert_eq!(Value::Int(7).as_i64(), Some(7));
    }
}
