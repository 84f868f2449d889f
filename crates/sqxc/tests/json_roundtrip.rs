// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::float_cmp)] // Exact values survive the round trip
#![allow(clippy::cast_precision_loss)] // Test data conversions
#![allow(clippy::too_many_lines)] // Test scenarios

//! JSON in and out of derived records.

use sqxc::chain::{Chain, JsonReader, JsonWriter, ValueMaterializer};
use sqxc::config::ChainConfig;
use sqxc::{
    from_json, from_json_with, to_json, Blob, Error, FieldFlags, Record, UnknownFieldPolicy,
};
use std::io::Read;

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct Address {
    street: String,
    zip: u32,
}

#[derive(Record, Default, Debug, Clone, PartialEq)]
#[sqxc(rename = "users")]
struct User {
    #[sqxc(primary)]
    id: i64,
    name: String,
    email: Option<String>,
    score: f64,
    active: bool,
    tags: Vec<String>,
    home: Address,
    work: Option<Box<Address>>,
    avatar: Blob,
    #[sqxc(hidden)]
    password: String,
    #[sqxc(hidden_null)]
    nickname: Option<String>,
    #[sqxc(rename = "lvl")]
    level: u64,
    #[sqxc(skip)]
    cache: Vec<u8>,
}

fn sample() -> User {
    User {
        id: 42,
        name: "Ada \"the\" Countess".into(),
        email: None,
        score: 97.25,
        active: true,
        tags: vec!["admin".into(), "ops".into()],
        home: Address {
            street: "1 Main St".into(),
            zip: 12345,
        },
        work: Some(Box::new(Address {
            street: "Lab".into(),
            zip: 9,
        })),
        avatar: Blob(vec![0, 1, 254, 255]),
        password: "secret".into(),
        nickname: None,
        level: u64::MAX,
        cache: vec![1, 2, 3],
    }
}

#[test]
fn test_descriptor_from_derive() {
    let ty = User::type_descriptor();
    assert_eq!(ty.name(), "users");
    assert!(ty.is_record());
    assert!(ty.find_field("cache").is_none());
    assert!(ty.find_field("level").is_none());

    let id = ty.find_field("id").unwrap();
    assert!(id.flags().contains(FieldFlags::PRIMARY));
    assert_eq!(id.offset(), std::mem::offset_of!(User, id));

    let work = ty.find_field("work").unwrap();
    assert!(work.is_pointer());
    assert!(work.is_nullable());
    assert_eq!(work.type_ref().name(), "Address");

    let tags = ty.find_field("tags").unwrap();
    assert_eq!(tags.type_ref().element().unwrap().name(), "str");
}

#[test]
fn test_write_respects_flags() {
    let json = to_json(&sample()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed["id"], 42);
    assert_eq!(parsed["name"], "Ada \"the\" Countess");
    assert!(parsed["email"].is_null());
    assert!(parsed.get("password").is_none());
    assert!(parsed.get("nickname").is_none());
    assert!(parsed.get("cache").is_none());
    assert_eq!(parsed["avatar"], "AAH+/w==");
    assert_eq!(parsed["home"]["zip"], 12345);
    assert_eq!(parsed["work"]["street"], "Lab");
    assert_eq!(parsed["lvl"], "18446744073709551615");

    // Declaration order.
    assert!(json.starts_with(r#"{"id":42,"name":"#));
}

#[test]
fn test_round_trip() {
    let user = sample();
    let back: User = from_json(&to_json(&user).unwrap()).unwrap();
    assert_eq!(
        back,
        User {
            password: String::new(),
            cache: Vec::new(),
            ..user
        }
    );
}

#[test]
fn test_unsigned_beyond_int64_keeps_its_value() {
    assert_eq!(to_json(&u64::MAX).unwrap(), r#""18446744073709551615""#);
    assert_eq!(to_json(&(i64::MAX as u64)).unwrap(), "9223372036854775807");
    assert_eq!(from_json::<u64>("18446744073709551615").unwrap(), u64::MAX);
    assert_eq!(from_json::<u64>(r#""18446744073709551615""#).unwrap(), u64::MAX);
    assert!(matches!(from_json::<u64>("-1"), Err(Error::OutOfRange { .. })));
    assert!(from_json::<i64>("18446744073709551615").unwrap_err().is_mismatch());

    let user: User = from_json(r#"{"lvl": 18446744073709551615}"#).unwrap();
    assert_eq!(user.level, u64::MAX);
}

#[test]
fn test_unknown_fields_are_skipped() {
    let text = r#"{
        "id": 1,
        "legacy": {"a": [1, 2, {"b": null}], "c": "x"},
        "name": "n",
        "also_unknown": [[], {}],
        "zip_code": 3
    }"#;
    let user: User = from_json(text).unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.name, "n");
}

#[test]
fn test_unknown_fields_abort_when_asked() {
    let config = ChainConfig::default().with_unknown_field(UnknownFieldPolicy::Abort);
    let err = from_json_with::<User>(r#"{"id": 1, "legacy": 2}"#, config).unwrap_err();
    assert!(matches!(err, Error::EntryNotFound(ref name) if name == "legacy"));
}

#[test]
fn test_null_clears_optional_and_resets_inline() {
    let user: User = from_json(
        r#"{"work": {"street": "w", "zip": 1}, "home": {"street": "h", "zip": 2}}"#,
    )
    .unwrap();
    assert_eq!(user.work.as_ref().unwrap().street, "w");

    let mut chain = Chain::new().with(ValueMaterializer::of::<User>());
    chain.ready().unwrap();
    JsonReader::new()
        .feed(r#"{"work": {"street": "w", "zip": 1}, "home": {"zip": 2}}"#, &mut chain)
        .unwrap();
    JsonReader::new()
        .feed(r#"{"work": null, "home": null, "email": "e@x"}"#, &mut chain)
        .unwrap();
    chain.finish().unwrap();

    let user = chain
        .node_mut::<ValueMaterializer>()
        .unwrap()
        .take::<User>()
        .unwrap();
    assert!(user.work.is_none());
    assert_eq!(user.home, Address::default());
    assert_eq!(user.email.as_deref(), Some("e@x"));
}

#[test]
fn test_type_mismatch_reports_field() {
    let err = from_json::<User>(r#"{"id": "seven"}"#).unwrap_err();
    match err {
        Error::TypeMismatch { at, .. } => assert_eq!(at, "id"),
        other => panic!("unexpected {other:?}"),
    }
    let err = from_json::<User>(r#"{"tags": "not a list"}"#).unwrap_err();
    assert!(err.is_mismatch());
}

#[test]
fn test_randomized_round_trip() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..200 {
        let tags: Vec<String> = (0..rng.usize(0..5))
            .map(|_| {
                (0..rng.usize(0..12))
                    .map(|_| rng.choice(['a', 'Z', '"', '\\', '\n', 'é', '😀', ' ']).unwrap())
                    .collect()
            })
            .collect();
        let user = User {
            id: rng.i64(..),
            name: rng.u32(..).to_string(),
            email: rng.bool().then(|| "x@y".to_string()),
            score: f64::from(rng.i32(..)) / 8.0,
            active: rng.bool(),
            tags,
            home: Address {
                street: String::new(),
                zip: rng.u32(..),
            },
            work: None,
            avatar: Blob((0..rng.usize(0..16)).map(|_| rng.u8(..)).collect()),
            password: String::new(),
            nickname: rng.bool().then(|| "nick".to_string()),
            level: rng.u64(..),
            cache: Vec::new(),
        };
        let json = to_json(&user).unwrap();
        let back: User = from_json(&json).unwrap_or_else(|e| panic!("{e} in {json}"));
        assert_eq!(back, user, "{json}");
    }
}

#[test]
fn test_streaming_to_a_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let handle = file.reopen().unwrap();

    let mut chain = Chain::with_config(ChainConfig::default().pretty())
        .with(JsonWriter::to_writer(handle));
    chain.ready().unwrap();
    chain.write_value(&Address {
        street: "a".into(),
        zip: 1,
    })
    .unwrap();
    chain.write_value(&Address {
        street: "b".into(),
        zip: 2,
    })
    .unwrap();
    chain.finish().unwrap();

    let mut text = String::new();
    file.reopen().unwrap().read_to_string(&mut text).unwrap();
    let documents: Vec<serde_json::Value> = serde_json::Deserializer::from_str(&text)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[1]["street"], "b");
    assert!(text.contains("\n  \"zip\": 1\n"));
}

#[test]
fn test_deep_input_is_refused() {
    let config = ChainConfig::default().with_max_depth(4);
    // Skipped unknown fields count against the limit too.
    let text = format!(r#"{{"legacy": {}{}}}"#, "[".repeat(10), "]".repeat(10));
    let err = from_json_with::<User>(&text, config).unwrap_err();
    assert!(matches!(err, Error::TooManyNested { limit: 4 }));
}
