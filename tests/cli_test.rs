#[path = "common/mod.rs"]
mod common;

use common::BridgeTest;
use ticketbridge::sync::resolver::NOT_FOUND_SUFFIX;
use ticketbridge::ticket::LocalTicket;

const CONFIG: &str = r#"
ticket_source:
  url: https://connect.example.com
  api_path: /v4_6_release/apis/3.0/service/tickets
  login: client-id
  password: super-secret-password
priority:
  to_remote:
    Major: "91"
    Minor: "8"
  to_local:
    "91": Major
    "8": Minor
"#;

// ============================================================================
// config show / check
// ============================================================================

#[test]
fn test_config_show_masks_credentials() {
    let bridge = BridgeTest::new();
    bridge.write_config(CONFIG);

    let output = bridge.run_success(&["config", "show"]);
    assert!(output.contains("Configuration"));
    assert!(output.contains("https://connect.example.com"));
    assert!(output.contains("cl...id"));
    assert!(output.contains("Minor -> 8"));
    assert!(!output.contains("client-id"));
    assert!(!output.contains("super-secret-password"));
}

#[test]
fn test_config_show_json() {
    let bridge = BridgeTest::new();
    let path = bridge.write_config(CONFIG);

    let output = bridge.run_success(&["config", "show", "--json", "--config", path.to_str().unwrap()]);
    let json: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(json["ticket_source"]["password_configured"], true);
    assert_eq!(json["ticket_source"]["board_id"], 199);
    assert_eq!(json["priority"]["to_remote"]["Major"], "91");
    assert!(!output.contains("super-secret-password"));
}

#[test]
fn test_config_show_missing_file() {
    let bridge = BridgeTest::new();

    let stderr = bridge.run_failure(&["config", "show"]);
    assert!(stderr.contains("cannot read"));
}

#[test]
fn test_config_check_ok() {
    let bridge = BridgeTest::new();
    bridge.write_config(CONFIG);

    let output = bridge.run_success(&["config", "check"]);
    assert!(output.contains("Configuration OK"));
}

#[test]
fn test_config_check_reports_problems() {
    let bridge = BridgeTest::new();
    bridge.write_config(
        r#"
ticket_source:
  url: https://connect.example.com
status:
  to_remote:
    Open: New
"#,
    );

    let output = bridge.run(&["config", "check", "--json"]);
    assert!(!output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["missing"].as_array().unwrap().len(), 3);
    assert_eq!(json["mapping_inconsistencies"].as_array().unwrap().len(), 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("4 problem(s)"));
}

// ============================================================================
// sync
// ============================================================================

#[test]
fn test_sync_without_remote_configuration_fails() {
    let bridge = BridgeTest::new();
    bridge.write_config("priority:\n  to_remote:\n    Major: \"91\"\n");
    let ticket = r#"{"localId": "LT-9", "subject": "Projector offline"}"#;
    bridge.write_file("ticket.json", ticket);

    let stderr = bridge.run_failure(&["sync", "ticket.json"]);
    assert!(stderr.contains("cannot sync ticket 'LT-9'"));
    assert!(stderr.contains("configuration error"));
    assert_eq!(bridge.read_file("ticket.json").as_deref(), Some(ticket));
}

#[test]
fn test_failed_sync_keeps_retry_guard() {
    let bridge = BridgeTest::new();
    // Nothing listens on the discard port, so every remote call fails.
    bridge.write_config(
        "ticket_source:\n  url: http://127.0.0.1:9\n  api_path: /tickets\n  login: client-id\n  password: secret\n",
    );
    bridge.write_file(
        "ticket.json",
        r#"{"localId": "LT-9", "remoteId": "42", "remoteLink": "http://127.0.0.1:9/tickets/42", "subject": "Projector offline"}"#,
    );

    let stderr = bridge.run_failure(&["sync", "ticket.json"]);
    assert!(stderr.contains("cannot sync ticket 'LT-9'"));

    let written = bridge.read_file("ticket.json").unwrap();
    let ticket: LocalTicket = serde_json::from_str(&written).unwrap();
    assert!(ticket.connection_failed());
    assert_eq!(
        ticket.subject,
        Some(format!("Projector offline{NOT_FOUND_SUFFIX}"))
    );
}

#[test]
fn test_sync_rejects_invalid_ticket() {
    let bridge = BridgeTest::new();
    bridge.write_config(CONFIG);
    bridge.write_file("ticket.json", "not json");

    let stderr = bridge.run_failure(&["sync", "ticket.json"]);
    assert!(stderr.contains("JSON error"));
}

#[test]
fn test_sync_missing_ticket_file() {
    let bridge = BridgeTest::new();
    bridge.write_config(CONFIG);

    let stderr = bridge.run_failure(&["sync", "absent.json"]);
    assert!(stderr.contains("cannot read ticket"));
}
