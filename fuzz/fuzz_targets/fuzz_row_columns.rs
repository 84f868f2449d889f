// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use sqxc::chain::blob;
use sqxc::{from_row, Blob, Cell, Record};

#[derive(Record, Default, Debug)]
struct Account {
    id: i64,
    owner: String,
    key: Blob,
    tags: Vec<String>,
    home: Option<Box<Home>>,
}

#[derive(Record, Default, Debug)]
struct Home {
    zip: u32,
}

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    // Blob text decoding
    let _ = blob::decode_text(&text);

    // Text columns that may or may not hold JSON
    let columns = ["id", "owner", "key", "tags", "home"];
    let cells = [
        Cell::from(text.as_ref()),
        Cell::from(text.as_ref()),
        Cell::from(text.as_ref()),
        Cell::from(text.as_ref()),
        Cell::from(text.as_ref()),
    ];
    let _ = from_row::<Account>(&columns, &cells);
});
