// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use sqxc::chain::{BlobCodec, Chain, JsonParser, JsonWriter, StatementWriter, ValueMaterializer};
use sqxc::config::ChainConfig;
use sqxc::{Dialect, Event, Record, Value};

#[derive(Record, Default, Debug)]
struct Row {
    id: i64,
    name: Option<String>,
    tags: Vec<String>,
    child: Option<Box<Leaf>>,
}

#[derive(Record, Default, Debug)]
struct Leaf {
    flag: bool,
    values: Vec<f64>,
}

const NAMES: [&str; 6] = ["id", "name", "tags", "child", "flag", "values"];

/// Arbitrary event stream from raw bytes, two bytes per event.
fn events(data: &[u8]) -> impl Iterator<Item = Event<'_>> {
    data.chunks_exact(2).map(|pair| {
        let value = match pair[0] % 12 {
            0 => Value::Null,
            1 => Value::Bool(pair[1] & 1 == 1),
            2 => Value::Int(i32::from(pair[1]) - 128),
            3 => Value::Int64(i64::from(pair[1]) << 40),
            4 => Value::Double(f64::from(pair[1]) / 3.0),
            5 => Value::str("[1,2]"),
            6 => Value::raw(&pair[1..]),
            7 => Value::RecordBegin,
            8 => Value::RecordEnd,
            9 => Value::SequenceBegin,
            10 => Value::SequenceEnd,
            _ => Value::str("x"),
        };
        match pair[1] as usize % (NAMES.len() + 1) {
            0 => Event::new(value),
            n => Event::named(NAMES[n - 1], value),
        }
    })
}

fuzz_target!(|data: &[u8]| {
    let config = ChainConfig::default().with_max_depth(8);

    let mut chains = [
        Chain::with_config(config.clone())
            .with(ValueMaterializer::of::<Row>())
            .with(JsonParser::new()),
        Chain::with_config(config.clone())
            .with(BlobCodec::new())
            .with(JsonWriter::new()),
        Chain::with_config(config)
            .with(StatementWriter::new(Dialect::Postgres))
            .with(JsonWriter::nested()),
    ];

    for chain in &mut chains {
        if chain.ready().is_err() {
            return;
        }
        for event in events(data) {
            // Errors are expected, panics are not
            let _ = chain.send(&event);
        }
        let _ = chain.finish();
    }
});
