//! Envelope decode vectors.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::Bytes;
use serde_json::Value;

use qws_core::protocol::{decode, encode, Payload};

mod vector_loader;
use vector_loader::load;

#[test]
fn envelope_vectors() {
    let files = [
        "structured_min.json",
        "structured_headers.json",
        "binary_headers.json",
        "binary_empty.json",
        "binary_looks_like_json.json",
        "too_short.json",
        "bad_version.json",
        "unknown_tag.json",
        "header_overrun.json",
        "headers_not_object.json",
        "structured_invalid.json",
        "structured_empty.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = decode(Bytes::from(raw.clone()));

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(
            Value::Object(env.headers.clone()),
            ex["headers"],
            "vector={}",
            v.description
        );

        match (&env.payload, ex["kind"].as_str().unwrap()) {
            (Payload::Structured(p), "structured") => {
                assert_eq!(p, &ex["payload"], "vector={}", v.description);
            }
            (Payload::Binary(b), "binary") => {
                let want = hex::decode(ex["payload_hex"].as_str().unwrap()).unwrap();
                assert_eq!(b.as_ref(), want.as_slice(), "vector={}", v.description);
            }
            (p, k) => panic!("kind mismatch: got {:?}, want {k} (vector={})", p.kind(), v.description),
        }

        // Re-encoding a decoded envelope must decode to the same envelope.
        let again = decode(encode(&env).unwrap()).unwrap();
        assert_eq!(again, env, "vector={}", v.description);
    }
}
