//! Tests for the record codec
//!
//! These tests verify:
//! - Fast-format values decode back to equal values
//! - Fixed-length sequences narrow to lists
//! - Anything else goes through the fallback format and survives
//! - Decoding is driven by the tag alone

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use vaults::codec::{self, Format, Value};
use vaults::VaultError;

// =============================================================================
// Helper Functions
// =============================================================================

fn fast_samples() -> Vec<Value> {
    let mut map = BTreeMap::new();
    map.insert(Value::from("k"), Value::list([1, 2, 3]));
    map.insert(Value::Int(-1), Value::Float(2.5));
    map.insert(Value::set(["x"]), Value::Bool(false));

    vec![
        Value::Nil,
        Value::Bool(true),
        Value::Int(0),
        Value::Int(i64::MIN),
        Value::Int(i64::MAX),
        Value::Float(-0.125),
        Value::Float(f64::INFINITY),
        Value::from(""),
        Value::from("unicode ✓ text"),
        Value::Bytes(vec![]),
        Value::Bytes((0..=255).collect()),
        Value::List(vec![]),
        Value::list([Value::Nil, Value::list([Value::Int(1)])]),
        Value::Set(Default::default()),
        Value::set([3, 1, 2]),
        Value::Map(BTreeMap::new()),
        Value::Map(map),
    ]
}

fn assert_fast(record: &[u8]) {
    assert_eq!(codec::split(record).unwrap().0, Format::Fast);
}

fn assert_fallback(record: &[u8]) {
    assert_eq!(codec::split(record).unwrap().0, Format::Fallback);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
enum Shape {
    Empty,
    Circle { center: Point, radius: f64 },
    Polygon(Vec<Point>),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Meters(f64);

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Doc {
    id: u32,
    body: Value,
    tags: Value,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum Event {
    Click { x: i32 },
    Close,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Loose {
    Num(i64),
    Words(Vec<String>),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Labelled {
    label: String,
    #[serde(flatten)]
    point: Point,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Tagged {
    name: String,
    labels: HashMap<String, u32>,
}

// =============================================================================
// Fast Format Tests
// =============================================================================

#[test]
fn test_codec_fast_values_round_trip() {
    for value in fast_samples() {
        let record = codec::encode(&value).unwrap();
        assert_fast(&record);
        assert_eq!(codec::decode::<Value>(&record).unwrap(), value, "value {}", value);
        assert_eq!(codec::decode_value(&record).unwrap(), value, "value {}", value);
    }
}

#[test]
fn test_codec_native_types_use_fast_format() {
    let mut scores = HashMap::new();
    scores.insert("a".to_string(), vec![1.5, 2.5]);

    assert_fast(&codec::encode(&Some(3u32)).unwrap());
    assert_fast(&codec::encode(&None::<String>).unwrap());
    assert_fast(&codec::encode(&scores).unwrap());
    assert_fast(&codec::encode(&vec!["a", "b"]).unwrap());
    assert_fast(&codec::encode(&'c').unwrap());

    let record = codec::encode(&scores).unwrap();
    assert_eq!(
        codec::decode::<HashMap<String, Vec<f64>>>(&record).unwrap(),
        scores
    );
}

#[test]
fn test_codec_nan_round_trips() {
    let record = codec::encode(&f64::NAN).unwrap();
    assert!(codec::decode::<f64>(&record).unwrap().is_nan());
}

#[test]
fn test_codec_tuple_narrows_to_list() {
    let record = codec::encode(&(1u8, "a", (2.0, false))).unwrap();
    assert_fast(&record);
    assert_eq!(
        codec::decode_value(&record).unwrap(),
        Value::list([
            Value::Int(1),
            Value::from("a"),
            Value::list([Value::Float(2.0), Value::Bool(false)]),
        ])
    );
}

#[test]
fn test_codec_array_and_vec_share_encoding() {
    assert_eq!(
        codec::encode(&[1, 2, 3]).unwrap(),
        codec::encode(&vec![1, 2, 3]).unwrap()
    );
    assert_eq!(
        codec::encode(&(1, 2, 3)).unwrap(),
        codec::encode(&vec![1, 2, 3]).unwrap()
    );
}

#[test]
fn test_codec_rust_set_is_a_sequence() {
    let set: HashSet<i64> = [1, 2].into_iter().collect();
    let record = codec::encode(&set).unwrap();
    assert!(matches!(codec::decode_value(&record).unwrap(), Value::List(_)));
    assert_eq!(codec::decode::<HashSet<i64>>(&record).unwrap(), set);
}

#[test]
fn test_codec_large_unsigned_falls_back() {
    let big = u64::MAX;
    let record = codec::encode(&big).unwrap();
    assert_fallback(&record);
    assert_eq!(codec::decode::<u64>(&record).unwrap(), big);
}

// =============================================================================
// Fallback Format Tests
// =============================================================================

#[test]
fn test_codec_structs_and_enums_fall_back() {
    let shapes = vec![
        Shape::Empty,
        Shape::Circle {
            center: Point { x: 1, y: -1 },
            radius: 0.5,
        },
        Shape::Polygon(vec![Point { x: 0, y: 0 }, Point { x: 3, y: 4 }]),
    ];
    for shape in shapes {
        let record = codec::encode(&shape).unwrap();
        assert_fallback(&record);
        assert_eq!(codec::decode::<Shape>(&record).unwrap(), shape);
    }

    let record = codec::encode(&Meters(3.5)).unwrap();
    assert_fallback(&record);
    assert_eq!(codec::decode::<Meters>(&record).unwrap(), Meters(3.5));
}

#[test]
fn test_codec_container_of_structs_falls_back_whole() {
    let points = vec![Point { x: 1, y: 2 }];
    let record = codec::encode(&points).unwrap();
    assert_fallback(&record);
    assert_eq!(codec::decode::<Vec<Point>>(&record).unwrap(), points);
}

#[test]
fn test_codec_struct_holding_a_value_round_trips() {
    let doc = Doc {
        id: 1,
        body: Value::from("hi"),
        tags: Value::set(["a", "b"]),
    };
    let record = codec::encode(&doc).unwrap();
    assert_fallback(&record);
    assert_eq!(codec::decode::<Doc>(&record).unwrap(), doc);
}

#[test]
fn test_codec_tagged_untagged_and_flattened_round_trip() {
    for event in [Event::Click { x: 3 }, Event::Close] {
        let record = codec::encode(&event).unwrap();
        assert_fallback(&record);
        assert_eq!(codec::decode::<Event>(&record).unwrap(), event);
    }

    for loose in [Loose::Num(4), Loose::Words(vec!["w".to_string()])] {
        let record = codec::encode(&loose).unwrap();
        assert_eq!(codec::decode::<Loose>(&record).unwrap(), loose);
    }

    let labelled = Labelled {
        label: "origin".to_string(),
        point: Point { x: 0, y: 5 },
    };
    let record = codec::encode(&labelled).unwrap();
    assert_eq!(codec::decode::<Labelled>(&record).unwrap(), labelled);
}

#[test]
fn test_codec_nested_none_survives() {
    let record = codec::encode(&Some(None::<i32>)).unwrap();
    assert_fallback(&record);
    assert_eq!(codec::decode::<Option<Option<i32>>>(&record).unwrap(), Some(None));

    let record = codec::encode(&vec![Some(None::<u8>), None, Some(Some(2))]).unwrap();
    assert_eq!(
        codec::decode::<Vec<Option<Option<u8>>>>(&record).unwrap(),
        vec![Some(None), None, Some(Some(2))]
    );
}

#[test]
fn test_codec_equal_struct_keys_share_bytes() {
    let build = |order: Vec<u32>| Tagged {
        name: "k".to_string(),
        labels: order.into_iter().map(|i| (format!("l{}", i), i % 3)).collect(),
    };
    let ascending = build((0..32).collect());
    let descending = build((0..32).rev().collect());
    assert_eq!(ascending, descending);

    let record = codec::encode(&ascending).unwrap();
    assert_fallback(&record);
    assert_eq!(record, codec::encode(&descending).unwrap());
}

// =============================================================================
// Tag Dispatch Tests
// =============================================================================

#[test]
fn test_codec_rejects_untagged_and_unknown_records() {
    assert!(matches!(codec::decode::<Value>(&[]), Err(VaultError::Decode(_))));
    assert!(matches!(codec::decode::<Value>(&[0x00]), Err(VaultError::Decode(_))));
    assert!(matches!(codec::decode::<Value>(&[0x03, 0xc0]), Err(VaultError::Decode(_))));
}

#[test]
fn test_codec_fallback_is_not_a_fast_value() {
    let record = codec::encode(&Point { x: 1, y: 2 }).unwrap();
    assert!(matches!(codec::decode_value(&record), Err(VaultError::Decode(_))));

    // A typed read into `Value` still sees the struct as a map
    let mut fields = BTreeMap::new();
    fields.insert(Value::from("x"), Value::Int(1));
    fields.insert(Value::from("y"), Value::Int(2));
    assert_eq!(codec::decode::<Value>(&record).unwrap(), Value::Map(fields));
}

#[test]
fn test_codec_record_layout() {
    let record = codec::encode("x").unwrap();
    assert_eq!(record[0], Format::Fast.tag());
    assert!(record.len() > codec::TAG_SIZE);

    let record = codec::encode(&Point { x: 0, y: 0 }).unwrap();
    assert_eq!(record[0], Format::Fallback.tag());
    assert!(record.len() > codec::TAG_SIZE);
    assert!(codec::decode::<Point>(&record[..record.len() - 1]).is_err());
}
