// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON text input.

use super::{ChainNode, Ctrl, Forward, NodeInfo, Product};
use crate::config::DEFAULT_MAX_DEPTH;
use crate::context::EventSink;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, KindSet, Value};
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::result::Result as StdResult;

/// Turns JSON text into events.
///
/// Integers that fit 32 bits become `Int`, wider ones `Int64`. Unsigned
/// values above `i64::MAX` travel as decimal text.
#[derive(Debug, Clone, Copy)]
pub struct JsonReader {
    max_depth: usize,
}

impl Default for JsonReader {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReader {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Push the events of one JSON document into `sink`.
    ///
    /// A sink error ends reading and is returned as is. Malformed text
    /// fails with `Syntax`.
    pub fn feed<S: EventSink + ?Sized>(&self, text: &str, sink: &mut S) -> Result<()> {
        let mut de = serde_json::Deserializer::from_str(text);
        let mut state = ReadState {
            sink,
            depth: 0,
            max_depth: self.max_depth,
            error: None,
        };
        let seed = EventSeed {
            state: &mut state,
            name: None,
        };
        match seed.deserialize(&mut de) {
            Ok(()) => de.end().map_err(syntax),
            Err(e) => Err(state.error.take().unwrap_or_else(|| syntax(e))),
        }
    }
}

fn syntax(e: serde_json::Error) -> Error {
    Error::Syntax {
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    }
}

struct ReadState<'s, S: ?Sized> {
    sink: &'s mut S,
    depth: usize,
    max_depth: usize,
    /// Error raised by the sink, surfaced instead of the serde error.
    error: Option<Error>,
}

impl<S: EventSink + ?Sized> ReadState<'_, S> {
    fn emit<E: de::Error>(&mut self, name: Option<&str>, value: Value<'_>) -> StdResult<(), E> {
        self.sink
            .send(&Event {
                name,
                value,
                field: None,
            })
            .map_err(|e| self.fail(e))
    }

    fn enter<E: de::Error>(&mut self) -> StdResult<(), E> {
        if self.depth >= self.max_depth {
            log::error!("[json] depth limit {} reached", self.max_depth);
            return Err(self.fail(Error::TooManyNested {
                limit: self.max_depth,
            }));
        }
        self.depth += 1;
        Ok(())
    }

    fn fail<E: de::Error>(&mut self, error: Error) -> E {
        let message = error.to_string();
        self.error = Some(error);
        E::custom(message)
    }
}

struct EventSeed<'r, 's, S: ?Sized> {
    state: &'r mut ReadState<'s, S>,
    name: Option<&'r str>,
}

impl<'de, S: EventSink + ?Sized> DeserializeSeed<'de> for EventSeed<'_, '_, S> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> StdResult<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, S: EventSink + ?Sized> Visitor<'de> for EventSeed<'_, '_, S> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> StdResult<(), E> {
        self.state.emit(self.name, Value::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> StdResult<(), E> {
        self.state.emit(self.name, Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> StdResult<(), E> {
        let value = i32::try_from(v).map_or(Value::Int64(v), Value::Int);
        self.state.emit(self.name, value)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> StdResult<(), E> {
        let value = match (i32::try_from(v), i64::try_from(v)) {
            (Ok(small), _) => Value::Int(small),
            (_, Ok(wide)) => Value::Int64(wide),
            _ => Value::Str(Cow::Owned(v.to_string())),
        };
        self.state.emit(self.name, value)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> StdResult<(), E> {
        self.state.emit(self.name, Value::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> StdResult<(), E> {
        self.state.emit(self.name, Value::Str(Cow::Borrowed(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> StdResult<(), A::Error> {
        let EventSeed { state, name } = self;
        state.enter()?;
        state.emit(name, Value::SequenceBegin)?;
        while seq
            .next_element_seed(EventSeed {
                state: &mut *state,
                name: None,
            })?
            .is_some()
        {}
        state.emit(name, Value::SequenceEnd)?;
        state.depth -= 1;
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> StdResult<(), A::Error> {
        let EventSeed { state, name } = self;
        state.enter()?;
        state.emit(name, Value::RecordBegin)?;
        while let Some(key) = map.next_key::<String>()? {
            map.next_value_seed(EventSeed {
                state: &mut *state,
                name: Some(key.as_str()),
            })?;
        }
        state.emit(name, Value::RecordEnd)?;
        state.depth -= 1;
        Ok(())
    }
}

/// Gives the outermost container events the name of the text they came from.
struct Renamed<'a, S: ?Sized> {
    inner: &'a mut S,
    name: Option<&'a str>,
    depth: usize,
}

impl<S: EventSink + ?Sized> EventSink for Renamed<'_, S> {
    fn send(&mut self, event: &Event<'_>) -> Result<()> {
        let kind = event.kind();
        if kind.is_end() {
            self.depth = self.depth.saturating_sub(1);
        }
        let outermost = self.depth == 0;
        if kind.is_begin() {
            self.depth += 1;
        }
        if outermost {
            self.inner.send(&Event {
                name: self.name,
                value: event.value.clone(),
                field: event.field,
            })
        } else {
            self.inner.send(event)
        }
    }
}

/// Expands JSON text values into events for the next node.
///
/// Only text holding a JSON object or array is taken. Anything else, or
/// text that is not valid JSON, is declined so a peer can store it as is.
#[derive(Debug, Default)]
pub struct JsonParser {
    reader: JsonReader,
}

impl JsonParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainNode for JsonParser {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "json-parser",
            accepts: KindSet::EMPTY.with(EventKind::Str).with(EventKind::Raw),
            emits: KindSet::ALL,
            product: Product::None,
        }
    }

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
        match ctrl {
            Ctrl::Ready(cx) => {
                self.reader = JsonReader::with_max_depth(cx.config.max_depth);
                Ok(())
            }
            Ctrl::Finish => Ok(()),
            other => Err(other.unsupported("json-parser")),
        }
    }

    fn send(&mut self, event: &Event<'_>, out: &mut Forward<'_>) -> Result<()> {
        let decline = || Error::mismatch("json container text", event.kind()).at(event.position());
        let text = match &event.value {
            Value::Str(text) => text.as_ref(),
            Value::Raw(bytes) => std::str::from_utf8(bytes).map_err(|_| decline())?,
            _ => return Err(decline()),
        };
        let body = text.trim_start();
        if !(body.starts_with('{') || body.starts_with('[')) {
            return Err(decline());
        }
        if serde_json::from_str::<IgnoredAny>(text).is_err() {
            log::trace!("[json] '{}' is not JSON, declining", event.position());
            return Err(decline());
        }
        self.reader.feed(
            text,
            &mut Renamed {
                inner: out,
                name: event.name,
                depth: 0,
            },
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, EventRecorder};

    fn read(text: &str) -> Result<Vec<Value<'static>>> {
        let mut chain = Chain::new().with(EventRecorder::new());
        chain.ready()?;
        JsonReader::new().feed(text, &mut chain)?;
        Ok(chain
            .node::<EventRecorder>()
            .unwrap()
            .events()
            .iter()
            .map(|e| e.value.clone())
            .collect())
    }

    #[test]
    fn test_reads_nested_document() {
        let events = read(r#"{"id": 1, "big": 5000000000, "tags": ["a", null], "ok": true}"#).unwrap();
        assert_eq!(
            events,
            vec![
                Value::RecordBegin,
                Value::Int(1),
                Value::Int64(5_000_000_000),
                Value::SequenceBegin,
                Value::str("a"),
                Value::Null,
                Value::SequenceEnd,
                Value::Bool(true),
                Value::RecordEnd,
            ]
        );
    }

    #[test]
    fn test_unsigned_beyond_int64_reads_as_text() {
        let events = read("[9223372036854775807, 18446744073709551615]").unwrap();
        assert_eq!(events[1], Value::Int64(i64::MAX));
        assert_eq!(events[2], Value::str("18446744073709551615"));
    }

    #[test]
    fn test_keys_become_names() {
        let mut chain = Chain::new().with(EventRecorder::new());
        chain.ready().unwrap();
        JsonReader::new()
            .feed(r#"{"a\"b": {"c": 2.5}}"#, &mut chain)
            .unwrap();
        let names: Vec<Option<String>> = chain
            .node::<EventRecorder>()
            .unwrap()
            .events()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                None,
                Some("a\"b".into()),
                Some("c".into()),
                Some("a\"b".into()),
                None
            ]
        );
    }

    #[test]
    fn test_syntax_error_position() {
        let err = read("{\n  \"a\": tru\n}").unwrap_err();
        match err {
            // Reported where the bad token ends, past the newline.
            Error::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(read("[1] [2]"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let mut chain = Chain::new().with(EventRecorder::new());
        chain.ready().unwrap();
        let err = JsonReader::with_max_depth(3)
            .feed("[[[[1]]]]", &mut chain)
            .unwrap_err();
        assert!(matches!(err, Error::TooManyNested { limit: 3 }));
    }

    #[test]
    fn test_sink_error_is_surfaced() {
        let mut chain = Chain::new().with(EventRecorder::new().accepting(KindSet::SCALARS));
        chain.ready().unwrap();
        let err = JsonReader::new().feed("[1]", &mut chain).unwrap_err();
        assert!(matches!(err, Error::TypeNotSupported(EventKind::SequenceBegin)));
    }

    #[test]
    fn test_parser_expands_text_and_declines_plain() {
        let mut chain = Chain::new()
            .with(JsonParser::new())
            .with(EventRecorder::new());
        chain.ready().unwrap();
        chain.send(&Event::named("tags", Value::str("[1, 2]"))).unwrap();
        chain.send(&Event::named("name", Value::str("[draft"))).unwrap();
        chain.send(&Event::named("note", Value::str("plain"))).unwrap();

        let events = chain.node::<EventRecorder>().unwrap().events();
        assert_eq!(events.len(), 6);
        assert_eq!(events[0].name.as_deref(), Some("tags"));
        assert_eq!(events[0].value, Value::SequenceBegin);
        assert_eq!(events[1].name, None);
        assert_eq!(events[3].name.as_deref(), Some("tags"));
        assert_eq!(events[4].value, Value::str("[draft"));
        assert_eq!(events[5].value, Value::str("plain"));
    }
}
