// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Textual encodings of opaque bytes.
//!
//! | Encoding | Text form      | Used by                     |
//! |----------|----------------|-----------------------------|
//! | `hex`    | `X'0aff'`      | SQLite / MySQL literals     |
//! | `pghex`  | `\x0aff`       | PostgreSQL `bytea` output   |
//! | `base64` | `Cv8=`         | JSON                        |
//! | `raw`    | (no text form) | peers that take raw bytes   |

use super::{ChainNode, Ctrl, Forward, NodeInfo, Product};
use crate::error::Result;
use crate::event::{Event, EventKind, KindSet, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::any::Any;
use std::borrow::Cow;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(rename_all = "lowercase"))]
pub enum BlobEncoding {
    /// Bytes stay raw.
    Raw,
    Hex,
    PgHex,
    #[default]
    Base64,
}

fn hex_digits(bytes: &[u8], out: &mut String) {
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
}

/// Text form of `bytes`, or `None` for [`BlobEncoding::Raw`].
pub fn encode(bytes: &[u8], encoding: BlobEncoding) -> Option<String> {
    match encoding {
        BlobEncoding::Raw => None,
        BlobEncoding::Hex => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            hex_digits(bytes, &mut out);
            out.push('\'');
            Some(out)
        }
        BlobEncoding::PgHex => {
            let mut out = String::with_capacity(bytes.len() * 2 + 2);
            out.push_str("\\x");
            hex_digits(bytes, &mut out);
            Some(out)
        }
        BlobEncoding::Base64 => Some(STANDARD.encode(bytes)),
    }
}

/// Plain hex digits, even length.
pub fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    let digits = digits.as_bytes();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

/// Decode any supported text form. Tried in order: `\x..`, `X'..'`, base64.
pub fn decode_text(text: &str) -> Option<Vec<u8>> {
    if let Some(digits) = text.strip_prefix("\\x") {
        return decode_hex(digits);
    }
    if let Some(digits) = text
        .strip_prefix("X'")
        .or_else(|| text.strip_prefix("x'"))
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return decode_hex(digits);
    }
    STANDARD.decode(text).ok()
}

/// Encodes `Raw` events for peers that cannot take raw bytes.
///
/// The encoding is picked at READY: an explicit one, then the chain
/// configuration, then what the destination's product wants. A destination
/// that accepts `Raw` gets the bytes unchanged.
#[derive(Debug, Default)]
pub struct BlobCodec {
    forced: Option<BlobEncoding>,
    active: BlobEncoding,
}

impl BlobCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use `encoding`.
    pub fn with_encoding(encoding: BlobEncoding) -> Self {
        Self {
            forced: Some(encoding),
            active: encoding,
        }
    }

    /// Encoding chosen for the current run.
    pub fn active(&self) -> BlobEncoding {
        self.active
    }
}

impl ChainNode for BlobCodec {
    fn info(&self) -> NodeInfo {
        NodeInfo {
            name: "blob-codec",
            accepts: KindSet::ALL,
            emits: KindSet::ALL,
            product: Product::None,
        }
    }

    fn ctrl(&mut self, ctrl: Ctrl<'_>) -> Result<()> {
        match ctrl {
            Ctrl::Ready(cx) => {
                let dest = cx.dest;
                self.active = self
                    .forced
                    .or(cx.config.blob_encoding)
                    .or_else(|| dest.and_then(|d| d.product.blob_encoding()))
                    .unwrap_or(match dest {
                        Some(d) if d.accepts.contains(EventKind::Raw) => BlobEncoding::Raw,
                        _ => BlobEncoding::Base64,
                    });
                log::debug!("[chain] blob-codec: using {:?}", self.active);
                Ok(())
            }
            Ctrl::Finish => Ok(()),
            other => Err(other.unsupported("blob-codec")),
        }
    }

    fn send(&mut self, event: &Event<'_>, out: &mut Forward<'_>) -> Result<()> {
        match &event.value {
            Value::Raw(bytes) => match encode(bytes, self.active) {
                Some(text) => out.forward(&Event {
                    name: event.name,
                    value: Value::Str(Cow::Owned(text)),
                    field: event.field,
                }),
                None => out.forward(event),
            },
            _ => out.forward(event),
        }
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
    use crate::chain::{Chain, EventRecorder, JsonWriter};
    use crate::config::ChainConfig;

    #[test]
    fn test_encode_forms() {
        let bytes = [0x0a, 0xff];
        assert_eq!(encode(&bytes, BlobEncoding::Hex).unwrap(), "X'0aff'");
        assert_eq!(encode(&bytes, BlobEncoding::PgHex).unwrap(), "\\x0aff");
        assert_eq!(encode(&bytes, BlobEncoding::Base64).unwrap(), "Cv8=");
        assert!(encode(&bytes, BlobEncoding::Raw).is_none());
    }

    #[test]
    fn test_decode_text_forms() {
        assert_eq!(decode_text("\\x0aFF").unwrap(), vec![0x0a, 0xff]);
        assert_eq!(decode_text("x'0aff'").unwrap(), vec![0x0a, 0xff]);
        assert_eq!(decode_text("Cv8=").unwrap(), vec![0x0a, 0xff]);
        assert!(decode_text("\\x0").is_none());
        assert!(decode_text("X'zz'").is_none());
        assert!(decode_text("not base64!").is_none());
    }

    #[test]
    fn test_codec_follows_destination() {
        let mut chain = Chain::new().with(BlobCodec::new()).with(JsonWriter::new());
        chain.ready().unwrap();
        assert_eq!(chain.node::<BlobCodec>().unwrap().active(), BlobEncoding::Base64);

        let mut chain = Chain::new().with(BlobCodec::new()).with(EventRecorder::new());
        chain.ready().unwrap();
        assert_eq!(chain.node::<BlobCodec>().unwrap().active(), BlobEncoding::Raw);

        let config = ChainConfig::default().with_blob_encoding(BlobEncoding::PgHex);
        let mut chain = Chain::with_config(config)
            .with(BlobCodec::new())
            .with(EventRecorder::new());
        chain.ready().unwrap();
        assert_eq!(chain.node::<BlobCodec>().unwrap().active(), BlobEncoding::PgHex);
    }

    #[test]
    fn test_codec_encodes_raw_only() {
        let mut chain = Chain::new()
            .with(BlobCodec::with_encoding(BlobEncoding::Hex))
            .with(EventRecorder::new());
        chain.ready().unwrap();
        chain.send(&Event::named("data", Value::raw(&[1, 2]))).unwrap();
        chain.send(&Event::named("n", Value::Int(3))).unwrap();

        let events = chain.node::<EventRecorder>().unwrap().events();
        assert_eq!(events[0].value, Value::str("X'0102'"));
        assert_eq!(events[0].name.as_deref(), Some("data"));
        assert_eq!(events[1].value, Value::Int(3));
    }
}
