// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use sqxc::chain::{Chain, JsonReader, JsonWriter, ValueMaterializer};
use sqxc::{from_json, Record};

#[derive(Record, Default, Debug)]
struct Inner {
    a: Option<i64>,
    b: Vec<String>,
}

#[derive(Record, Default, Debug)]
struct Outer {
    id: i32,
    name: String,
    ratio: f64,
    data: sqxc::Blob,
    inner: Inner,
    boxed: Option<Box<Inner>>,
    list: Vec<Inner>,
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Typed materialization
    if let Ok(value) = from_json::<Outer>(text) {
        let _ = sqxc::to_json(&value);
    }

    // Text re-emission: a document that reads must write back
    let mut chain = Chain::new().with(JsonWriter::new());
    if chain.ready().is_ok() && JsonReader::new().feed(text, &mut chain).is_ok() {
        assert!(chain.finish().is_ok());
    }

    // Materializer left dangling mid-document
    let mut chain = Chain::new().with(ValueMaterializer::of::<Vec<Outer>>());
    if chain.ready().is_ok() {
        let _ = JsonReader::new().feed(text, &mut chain);
        let _ = chain.finish();
        let node = chain.node::<ValueMaterializer>();
        assert!(node.is_some_and(|n| n.depth() == 0));
    }
});
