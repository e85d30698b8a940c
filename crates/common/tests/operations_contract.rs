use std::collections::BTreeSet;

use creatio_fs_common::protocol::{ALL_OPERATIONS, CSRF_COOKIE, CSRF_HEADER, LOGIN_PATH};
use creatio_fs_common::types::SchemaType;

fn load_contract() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/operations.json");
    let content = std::fs::read_to_string(path).expect("contract file should be readable");
    serde_json::from_str(&content).expect("contract file should be valid JSON")
}

#[test]
fn operation_paths_match_contract() {
    let contract = load_contract();
    let expected: BTreeSet<&str> = contract["operation_paths"]
        .as_array()
        .expect("operation_paths should be an array")
        .iter()
        .map(|v| v.as_str().expect("path should be a string"))
        .collect();

    let actual: BTreeSet<&str> = ALL_OPERATIONS.iter().map(|op| op.path()).collect();
    assert_eq!(actual, expected, "ALL_OPERATIONS diverged from contract");
}

#[test]
fn session_constants_match_contract() {
    let contract = load_contract();
    assert_eq!(contract["login_path"].as_str(), Some(LOGIN_PATH));
    assert_eq!(contract["csrf_cookie"].as_str(), Some(CSRF_COOKIE));
    assert_eq!(contract["csrf_header"].as_str(), Some(CSRF_HEADER));
}

#[test]
fn extensions_match_contract() {
    let contract = load_contract();
    let extensions = contract["extensions"].as_object().expect("extensions should be an object");
    assert_eq!(extensions.len(), SchemaType::ALL.len());
    for kind in SchemaType::ALL {
        assert_eq!(
            extensions.get(kind.config_name()).and_then(|v| v.as_str()),
            Some(kind.extension()),
            "extension for {kind} diverged from contract"
        );
    }
}
