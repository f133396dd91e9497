#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use qws_runtime::config;

fn expect_invalid(yaml: &str) {
    let err = config::load_from_str(yaml).expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG", "{err}");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.listen_addr().unwrap().port(), 3000);

    let opts = cfg.connection_options();
    assert_eq!(opts.ping_interval, Some(Duration::from_secs(20)));
    assert_eq!(opts.idle_timeout, Some(Duration::from_secs(60)));
    assert!(opts.reconnect.enabled);
    assert_eq!(cfg.endpoint_options().close_grace, Duration::from_secs(5));
}

#[test]
fn full_config_round_trips_into_options() {
    let cfg = config::load_from_str(
        r#"
version: 1
endpoint:
  listen: "127.0.0.1:9001"
  close_grace_ms: 750
connection:
  ping_interval_ms: 0
  idle_timeout_ms: 0
reconnect:
  enabled: false
  initial_delay_ms: 50
  max_delay_ms: 400
  multiplier: 1.5
"#,
    )
    .unwrap();

    assert_eq!(cfg.listen_addr().unwrap().to_string(), "127.0.0.1:9001");
    let opts = cfg.connection_options();
    assert_eq!(opts.ping_interval, None);
    assert_eq!(opts.idle_timeout, None);

    let policy = cfg.reconnect_policy();
    assert!(!policy.enabled);
    assert_eq!(policy.delay(0), Duration::from_millis(50));
    assert_eq!(policy.delay(1), Duration::from_millis(75));
    assert_eq!(policy.delay(10), Duration::from_millis(400));
}

#[test]
fn deny_unknown_fields_nested() {
    expect_invalid(
        r#"
version: 1
reconnect:
  enabled: true
  max_retries: 3 # not a knob
"#,
    );
    expect_invalid("version: 1\nlisten: \"0.0.0.0:1\"\n");
}

#[test]
fn rejects_wrong_version() {
    expect_invalid("version: 2");
}

#[test]
fn rejects_out_of_range_values() {
    expect_invalid("version: 1\nendpoint:\n  listen: \"not an addr\"\n");
    expect_invalid("version: 1\nendpoint:\n  close_grace_ms: 10\n");
    expect_invalid("version: 1\nconnection:\n  ping_interval_ms: 500\n");
    expect_invalid("version: 1\nconnection:\n  ping_interval_ms: 5000\n  idle_timeout_ms: 5000\n");
    expect_invalid("version: 1\nreconnect:\n  initial_delay_ms: 5\n");
    expect_invalid("version: 1\nreconnect:\n  initial_delay_ms: 500\n  max_delay_ms: 100\n");
    expect_invalid("version: 1\nreconnect:\n  multiplier: 0.5\n");
}

#[test]
fn load_from_missing_file_is_invalid_config() {
    let err = config::load_from_file("/definitely/not/here/qws.yaml").unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}
