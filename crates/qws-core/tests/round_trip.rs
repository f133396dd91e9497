//! Encode/decode round trip for both payload kinds.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::Bytes;
use proptest::prelude::*;
use serde_json::json;

use qws_core::protocol::{decode, encode, Envelope, Headers, Payload, PayloadKind};
use qws_core::ErrorCode;

fn headers(v: serde_json::Value) -> Headers {
    match v {
        serde_json::Value::Object(m) => m,
        _ => unreachable!(),
    }
}

#[test]
fn structured_round_trip() {
    let env = Envelope::new(
        json!({ "user": "ada", "tags": ["a", "b"], "n": 3, "nested": { "ok": true } }),
        headers(json!({ "type": "greet", "id": 42, "meta": { "trace": "t-1" } })),
    );
    let frame = encode(&env).unwrap();
    let back = decode(frame).unwrap();
    assert_eq!(back, env);
    assert_eq!(back.kind(), PayloadKind::Structured);
}

#[test]
fn binary_round_trip_keeps_bytes_opaque() {
    // Bytes that happen to form valid JSON stay binary.
    let env = Envelope::new(
        Payload::Binary(Bytes::from_static(b"{\"a\":1}")),
        headers(json!({ "mime": "application/octet-stream" })),
    );
    let back = decode(encode(&env).unwrap()).unwrap();
    assert_eq!(back, env);
    assert_eq!(back.kind(), PayloadKind::Binary);
}

#[test]
fn non_utf8_binary_round_trip() {
    let env = Envelope::binary(vec![0u8, 0xff, 0xfe, 0x80, 0x01]);
    assert_eq!(decode(encode(&env).unwrap()).unwrap(), env);
}

#[test]
fn empty_headers_encode_without_header_section() {
    let frame = encode(&Envelope::structured(json!(null))).unwrap();
    assert_eq!(&frame[..6], &[1, 1, 0, 0, 0, 0]);
    assert_eq!(&frame[6..], b"null");
}

#[test]
fn truncated_frame_is_malformed() {
    let frame = encode(&Envelope::new(json!({ "k": "v" }), headers(json!({ "h": 1 })))).unwrap();
    let cut = frame.slice(..frame.len() - 3);
    let err = decode(cut).expect_err("truncated structured payload");
    assert_eq!(err.code(), ErrorCode::MalformedEnvelope);
}

#[test]
fn float_with_long_shortest_repr_round_trips() {
    let f = 1.0715660391465826e-75_f64;
    let env = Envelope::new(json!(f), headers(json!({ "f": f })));
    let back = decode(encode(&env).unwrap()).unwrap();
    assert_eq!(back, env);
    assert_eq!(back.payload, Payload::Structured(json!(f)));
}

fn finite_f64() -> impl Strategy<Value = f64> {
    any::<u64>()
        .prop_map(f64::from_bits)
        .prop_filter("finite", |f| f.is_finite())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2048))]

    #[test]
    fn floats_round_trip_bit_exact(payload in finite_f64(), header in finite_f64()) {
        let env = Envelope::new(
            json!({ "v": payload, "list": [payload, header] }),
            headers(json!({ "f": header })),
        );
        let back = decode(encode(&env).unwrap()).unwrap();

        let Payload::Structured(v) = &back.payload else {
            panic!("structured payload decoded as binary");
        };
        prop_assert_eq!(v["v"].as_f64().unwrap().to_bits(), payload.to_bits());
        prop_assert_eq!(back.headers["f"].as_f64().unwrap().to_bits(), header.to_bits());
        prop_assert_eq!(back, env);
    }
}
