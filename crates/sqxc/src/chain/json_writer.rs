// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON text output.

use super::blob::{self, BlobEncoding};
use super::{ChainNode, Ctrl, Forward, NodeInfo, Product};
use crate::config::{JsonOptions, SCRATCH_INITIAL_CAPACITY};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, KindSet, Value};
use crate::nested::{Container, NestedStack};
use std::any::Any;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Whole documents, one per root value.
    Terminal,
    /// Only containers; each finished container is forwarded as one `Str`.
    Nested,
}

/// Writes events as JSON text.
///
/// As a terminal node it accumulates documents (newline separated) in a
/// buffer, or streams them to a writer. As a nested node it turns a
/// container arriving inside a row into a single text value, which lets a
/// statement writer store structured fields in a text column.
pub struct JsonWriter {
    mode: Mode,
    buf: Vec<u8>,
    /// Length of `buf` up to the last finished document.
    committed: usize,
    frames: NestedStack,
    /// Name of the container being captured in nested mode.
    opening: Option<String>,
    out: Option<Box<dyn Write + Send>>,
    options: Option<JsonOptions>,
    active: JsonOptions,
    encoding: BlobEncoding,
    roots: usize,
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonWriter {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            buf: Vec::new(),
            committed: 0,
            frames: NestedStack::default(),
            opening: None,
            out: None,
            options: None,
            active: JsonOptions::default(),
            encoding: BlobEncoding::Base64,
            roots: 0,
        }
    }

    /// Terminal writer collecting text in memory.
    pub fn new() -> Self {
        Self::with_mode(Mode::Terminal)
    }

    /// Terminal writer streaming newline-delimited documents to `out`.
    pub fn to_writer(out: impl Write + Send + 'static) -> Self {
        let mut writer = Self::new();
        writer.out = Some(Box::new(out));
        writer
    }

    /// Writer serializing containers found inside rows.
    pub fn nested() -> Self {
        Self::with_mode(Mode::Nested)
    }

    /// Override the chain's JSON options.
    pub fn with_options(mut self, options: JsonOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn pretty(self) -> Self {
        self.with_options(JsonOptions {
            pretty: true,
            ..JsonOptions::default()
        })
    }

    /// Documents finished so far.
    pub fn documents(&self) -> usize {
        self.roots
    }

    /// Buffered text of finished documents.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.buf[..self.committed])
            .map_err(|_| Error::InvalidState("json output is not valid UTF-8"))
    }

    pub fn take_text(&mut self) -> Result<String> {
        let mut bytes = std::mem::take(&mut self.buf);
        bytes.truncate(self.committed);
        self.committed = 0;
        self.roots = 0;
        String::from_utf8(bytes).map_err(|_| Error::InvalidState("json output is not valid UTF-8"))
    }

    fn push_json<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.buf, value).map_err(|e| Error::Io(e.into()))
    }

    fn newline(&mut self) {
        if self.active.pretty {
            self.buf.push(b'\n');
            let width = self.active.indent * self.frames.len();
            self.buf.resize(self.buf.len() + width, b' ');
        }
    }

    /// Separator, indentation and key before a value.
    fn begin_member(&mut self, event: &Event<'_>) -> Result<()> {
        let kind = event.kind();
        let Some(frame) = self.frames.top_mut() else {
            if self.mode == Mode::Nested {
                if !kind.is_begin() {
                    return Err(Error::mismatch("json container", kind).at(event.position()));
                }
                self.opening = event.name.map(str::to_owned);
            } else if self.roots > 0 && self.out.is_none() {
                self.buf.push(b'\n');
            }
            return Ok(());
        };
        let first = frame.members == 0;
        frame.members += 1;
        let container = frame.container;
        if !first {
            self.buf.push(b',');
        }
        self.newline();
        if container == Container::Record {
            let name = event
                .name
                .ok_or_else(|| Error::EntryNotFound(String::from("<unnamed>")))?;
            self.push_json(name)?;
            self.buf.push(b':');
            if self.active.pretty {
                self.buf.push(b' ');
            }
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value<'_>) -> Result<()> {
        match value {
            Value::Null => self.buf.extend_from_slice(b"null"),
            Value::Bool(v) => self.push_json(v)?,
            Value::Int(v) => self.push_json(v)?,
            Value::Int64(v) => self.push_json(v)?,
            // Non-finite doubles serialize as null.
            Value::Double(v) => self.push_json(v)?,
            Value::Str(s) => self.push_json(s.as_ref())?,
            Value::Raw(bytes) => {
                let encoding = match self.encoding {
                    BlobEncoding::Raw => BlobEncoding::Base64,
                    other => other,
                };
                let text = blob::encode(bytes, encoding).unwrap_or_default();
                self.push_json(text.as_str())?;
            }
            Value::RecordBegin => {
                self.frames.push(Container::Record, None, None)?;
                self.buf.push(b'{');
            }
            Value::SequenceBegin => {
                self.frames.push(Container::Sequence, None, None)?;
                self.buf.push(b'[');
            }
            Value::RecordEnd | Value::SequenceEnd => {
                return Err(Error::InvalidState("container end written as a value"))
            }
        }
        Ok(())
    }

    fn close(&mut self, event: &Event<'_>) -> Result<()> {
        let kind = event.kind();
        let (container, bracket) = match kind {
            EventKind::RecordEnd => (Container::Record, b'}'),
            _ => (Container::Sequence, b']'),
        };
        match self.frames.top() {
            Some(frame) if frame.container == container => {}
            _ => return Err(Error::mismatch("open json container", kind).at(event.position())),
        }
        let frame = self
            .frames
            .pop()
            .ok_or(Error::InvalidState("no open json container"))?;
        if frame.members > 0 {
            self.newline();
        }
        self.buf.push(bracket);
        Ok(())
    }

    fn finish_document(&mut self, out: &mut Forward<'_>) -> Result<()> {
        self.roots += 1;
        match self.mode {
            Mode::Nested => {
                let text = std::str::from_utf8(&self.buf)
                    .map_err(|_| Error::InvalidState("json output is not valid UTF-8"))?;
                let result = out.forward(&Event {
                    name: self.opening.as_deref(),
                    value: Value::str(text),
                    field: None,
                });
                self.buf.clear();
                self.opening = None;
                result
            }
            Mode::Terminal => {
                if let Some(writer) = self.out.as_mut() {
                    self.buf.push(b'\n');
                    writer.write_all(&self.buf)?;
                    self.buf.clear();
                }
                self.committed = self.buf.len();
                Ok(())
            }
        }
    }
}

impl ChainNode for JsonWriter {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "json-writer",
            accepts: KindSet::ALL,
            emits: match self.mode {
                Mode::Terminal => KindSet::EMPTY,
                Mode::Nested => KindSet::EMPTY.with(EventKind::Str),
            },
            product: Product::Json,
        }
    }

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
        match ctrl {
            Ctrl::Ready(cx) => {
                self.active = self.options.unwrap_or(cx.config.json);
                self.encoding = cx.config.blob_encoding.unwrap_or_default();
                self.frames.set_max_depth(cx.config.max_depth);
                self.frames.clear();
                self.buf.truncate(self.committed);
                self.buf.reserve(SCRATCH_INITIAL_CAPACITY);
                self.opening = None;
                Ok(())
            }
            Ctrl::Finish => {
                if !self.frames.is_empty() {
                    log::debug!(
                        "[json] finished with {} open container(s), dropping partial document",
                        self.frames.len()
                    );
                }
                self.frames.clear();
                self.opening = None;
                match self.mode {
                    Mode::Nested => self.buf = Vec::new(),
                    Mode::Terminal => self.buf.truncate(self.committed),
                }
                if let Some(writer) = self.out.as_mut() {
                    writer.flush()?;
                }
                Ok(())
            }
            other => Err(other.unsupported("json-writer")),
        }
    }

    fn send(&mut self, event: &Event<'_>, out: &mut Forward<'_>) -> Result<()> {
        if event.kind().is_end() {
            self.close(event)?;
        } else {
            self.begin_member(event)?;
            self.write_value(&event.value)?;
        }
        if self.frames.is_empty() {
            self.finish_document(out)?;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.mode == Mode::Nested && !self.frames.is_empty()
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
    use crate::config::ChainConfig;

    fn run(writer: JsonWriter, config: ChainConfig, events: &[Event<'_>]) -> String {
        let mut chain = Chain::with_config(config).with(writer);
        chain.ready().unwrap();
        for event in events {
            chain.send(event).unwrap();
        }
        chain.finish().unwrap();
        chain.node_mut::<JsonWriter>().unwrap().take_text().unwrap()
    }

    #[test]
    fn test_compact_document() {
        let text = run(
            JsonWriter::new(),
            ChainConfig::default(),
            &[
                Event::new(Value::RecordBegin),
                Event::named("id", Value::Int(1)),
                Event::named("name", Value::str("say \"hi\"")),
                Event::named("tags", Value::SequenceBegin),
                Event::new(Value::Bool(true)),
                Event::new(Value::Null),
                Event::named("tags", Value::SequenceEnd),
                Event::named("data", Value::raw(&[1, 2])),
                Event::named("ratio", Value::Double(f64::NAN)),
                Event::new(Value::RecordEnd),
            ],
        );
        assert_eq!(
            text,
            r#"{"id":1,"name":"say \"hi\"","tags":[true,null],"data":"AQI=","ratio":null}"#
        );
    }

    #[test]
    fn test_pretty_document() {
        let text = run(
            JsonWriter::new(),
            ChainConfig::default().pretty(),
            &[
                Event::new(Value::RecordBegin),
                Event::named("a", Value::SequenceBegin),
                Event::new(Value::Int(1)),
                Event::named("a", Value::SequenceEnd),
                Event::named("b", Value::RecordBegin),
                Event::named("b", Value::RecordEnd),
                Event::new(Value::RecordEnd),
            ],
        );
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ],\n  \"b\": {}\n}");
    }

    #[test]
    fn test_roots_are_newline_separated() {
        let text = run(
            JsonWriter::new(),
            ChainConfig::default(),
            &[Event::new(Value::Int(1)), Event::new(Value::str("x"))],
        );
        assert_eq!(text, "1\n\"x\"");
    }

    #[test]
    fn test_partial_document_dropped_on_finish() {
        let text = run(
            JsonWriter::new(),
            ChainConfig::default(),
            &[
                Event::new(Value::Int(1)),
                Event::new(Value::SequenceBegin),
                Event::new(Value::Int(2)),
            ],
        );
        assert_eq!(text, "1");
    }

    #[test]
    fn test_mismatched_end_is_refused() {
        let mut chain = Chain::new().with(JsonWriter::new());
        chain.ready().unwrap();
        chain.send(&Event::new(Value::SequenceBegin)).unwrap();
        let err = chain.send(&Event::new(Value::RecordEnd)).unwrap_err();
        assert!(err.is_mismatch());
    }

    #[test]
    fn test_nested_mode_forwards_text() {
        let mut chain = Chain::new()
            .with(JsonWriter::nested())
            .with(EventRecorder::new());
        chain.ready().unwrap();
        chain.send(&Event::named("tags", Value::SequenceBegin)).unwrap();
        assert_eq!(chain.capture(), Some(0));
        chain.send(&Event::new(Value::str("a"))).unwrap();
        chain.send(&Event::named("tags", Value::SequenceEnd)).unwrap();
        assert_eq!(chain.capture(), None);

        let events = chain.node::<EventRecorder>().unwrap().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name.as_deref(), Some("tags"));
        assert_eq!(events[0].value, Value::str("[\"a\"]"));
    }

    #[test]
    fn test_nested_mode_declines_scalars() {
        let mut chain = Chain::new()
            .with(JsonWriter::nested())
            .with(EventRecorder::new());
        chain.ready().unwrap();
        chain.send(&Event::named("n", Value::Int(1))).unwrap();
        let events = chain.node::<EventRecorder>().unwrap().events();
        assert_eq!(events[0].value, Value::Int(1));
    }

    #[test]
    fn test_depth_limit() {
        let mut chain =
            Chain::with_config(ChainConfig::default().with_max_depth(2)).with(JsonWriter::new());
        chain.ready().unwrap();
        chain.send(&Event::new(Value::SequenceBegin)).unwrap();
        chain.send(&Event::new(Value::SequenceBegin)).unwrap();
        let err = chain.send(&Event::new(Value::SequenceBegin)).unwrap_err();
        assert!(matches!(err, Error::TooManyNested { limit: 2 }));
        chain.finish().unwrap();
        assert_eq!(chain.node::<JsonWriter>().unwrap().text().unwrap(), "");
    }
}
