use std::{env, fs};

use zipsync_server::config::StorageBackend;
use zipsync_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("zipsync.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
request_timeout_ms = 1000
body_limit_bytes = 4096

[storage]
backend = "memory"

[logging]
level = "debug"

[[entities]]
route = "store"
collection = "Stores"
fields = [
    { name = "Manager", aliases = ["Store_Manager"], required_column = true },
    { name = "Modified User", aliases = ["Modified_User"] },
]
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.body_limit_bytes, 4096);
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(cfg.entities.len(), 1);
    let store = &cfg.entities[0];
    assert_eq!(store.key_field, "Zip");
    assert_eq!(store.attribution_field, "Modified User");
    assert_eq!(store.fields[0].aliases, vec!["Store_Manager".to_string()]);
    assert!(cfg.registry().expect("registry").get("store").is_some());

    // 2) Env override should win over file
    unsafe {
        env::set_var("ZIPSYNC__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    // cleanup env var
    unsafe {
        env::remove_var("ZIPSYNC__SERVER__PORT");
    }

    // 3) An entity whose attribution field is not one of its fields fails validation
    let bad_toml = r#"
[storage]
backend = "memory"

[[entities]]
route = "store"
collection = "Stores"
fields = [{ name = "Manager" }]
"#;
    let bad_path = dir.path().join("bad.toml");
    fs::write(&bad_path, bad_toml).expect("write bad toml");
    let err = load_config(bad_path.to_str()).expect_err("validation should fail");
    assert!(err.contains("attribution_field"), "unexpected error: {err}");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults should validate");
    assert_eq!(cfg.entities.len(), 2);
    assert!(cfg.registry().expect("registry").get("product").is_some());
    assert!(cfg.registry().expect("registry").get("population").is_some());
}
