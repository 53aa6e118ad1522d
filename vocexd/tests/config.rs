use figment::Jail;
use std::path::PathBuf;

use vocex_common::DatabaseSize;
// Use the explicit library name `vocexdlib` as defined in Cargo.toml [lib] name.
use vocexdlib::config::{load_config, VocexdConfig};
use vocexdlib::error::IndexerError;

#[test]
// Validates loading a complete configuration, with every section overridden.
fn test_deserialize_full_valid_config() {
    Jail::expect_with(|jail| {
        let toml_str = r#"
            [node]
            rpc_url = "wss://node.example.org:26657/websocket"
            pool_size = 4
            request_timeout = 5
            dial_timeout = 3
            connect_attempts = 2

            [gateway]
            url = "https://gw.example.org/dvote"
            request_timeout = 7
            connect_attempts = 3

            [database]
            path = "explorer_db"
            chain_id = "vochain-dev"
            size = { mb = 512 }

            [sync]
            max_block_batch = 50
            validator_page_size = 30
            list_page_size = 64
            retry_cap = 4
            idle_wait_ms = 250
            tick_interval_ms = 2000
            validator_every = 10
        "#;
        let temp_toml_path = jail.directory().join("full_config.toml");
        jail.create_file(&temp_toml_path, toml_str)?;

        let config_result = load_config(&temp_toml_path);
        assert!(
            config_result.is_ok(),
            "load_config failed: {:?}",
            config_result.err()
        );
        let config = config_result.unwrap();

        assert_eq!(
            config.node.rpc_url.as_str(),
            "wss://node.example.org:26657/websocket"
        );
        assert_eq!(config.node.pool_size, 4);
        assert_eq!(config.node.connect_attempts, 2);
        assert_eq!(config.gateway.url.scheme(), "https");
        assert_eq!(config.gateway.request_timeout, 7);
        assert_eq!(config.database.path, PathBuf::from("explorer_db"));
        assert_eq!(config.database.size, DatabaseSize::Mb(512));
        assert_eq!(
            config.database.env_path(),
            PathBuf::from("explorer_db").join("vochain-dev")
        );
        assert_eq!(config.sync.max_block_batch, 50);
        assert_eq!(config.sync.retry_cap, 4);
        assert_eq!(config.sync.validator_every, 10);
        Ok(())
    });
}

#[test]
// Fields missing from the TOML file keep their defaults.
fn test_deserialize_optional_fields_missing() {
    Jail::expect_with(|jail| {
        let toml_str = r#"
            [sync]
            retry_cap = 3
        "#;
        let temp_toml_path = jail.directory().join("partial_config.toml");
        jail.create_file(&temp_toml_path, toml_str)?;

        let config = load_config(&temp_toml_path).expect("load_config failed");
        let defaults = VocexdConfig::default();
        assert_eq!(config.sync.retry_cap, 3);
        assert_eq!(config.sync.max_block_batch, defaults.sync.max_block_batch);
        assert_eq!(config.node, defaults.node);
        assert_eq!(config.gateway, defaults.gateway);
        assert_eq!(config.database, defaults.database);
        Ok(())
    });
}

#[test]
// A missing file is not an error: the defaults are used.
fn test_figment_all_defaults() {
    Jail::expect_with(|jail| {
        let missing = jail.directory().join("does_not_exist.toml");
        let config = load_config(&missing).expect("defaults should load");
        assert_eq!(config, VocexdConfig::default());
        assert_eq!(config.node.pool_size, 10);
        assert_eq!(config.sync.retry_cap, 10);
        assert_eq!(config.sync.validator_every, 40);
        assert_eq!(config.database.size, DatabaseSize::Gb(64));
        Ok(())
    });
}

#[test]
// Environment variables override both the TOML file and the defaults.
fn test_figment_env_override_toml_and_defaults() {
    Jail::expect_with(|jail| {
        let toml_str = r#"
            [sync]
            retry_cap = 3
            max_block_batch = 20
        "#;
        let temp_toml_path = jail.directory().join("env_config.toml");
        jail.create_file(&temp_toml_path, toml_str)?;
        jail.set_env("VOCEX_SYNC__RETRY_CAP", "7");
        jail.set_env("VOCEX_NODE__POOL_SIZE", "2");

        let config = load_config(&temp_toml_path).expect("load_config failed");
        assert_eq!(config.sync.retry_cap, 7);
        assert_eq!(config.sync.max_block_batch, 20);
        assert_eq!(config.node.pool_size, 2);
        Ok(())
    });
}

#[test]
fn test_figment_invalid_env_var_type() {
    Jail::expect_with(|jail| {
        jail.set_env("VOCEX_SYNC__RETRY_CAP", "not_a_number");
        let result = load_config(&jail.directory().join("none.toml"));
        assert!(matches!(result, Err(IndexerError::ConfigError(_))));
        Ok(())
    });
}

#[test]
fn test_node_url_must_be_websocket() {
    Jail::expect_with(|jail| {
        let toml_str = r#"
            [node]
            rpc_url = "http://127.0.0.1:26657"
        "#;
        let temp_toml_path = jail.directory().join("bad_node.toml");
        jail.create_file(&temp_toml_path, toml_str)?;

        let result = load_config(&temp_toml_path);
        match result {
            Err(IndexerError::ConfigError(message)) => assert!(message.contains("ws://")),
            other => panic!("expected a config error, got {other:?}"),
        }
        Ok(())
    });
}

#[test]
fn test_gateway_scheme_is_checked() {
    Jail::expect_with(|jail| {
        let toml_str = r#"
            [gateway]
            url = "ftp://127.0.0.1/dvote"
        "#;
        let temp_toml_path = jail.directory().join("bad_gateway.toml");
        jail.create_file(&temp_toml_path, toml_str)?;

        assert!(matches!(
            load_config(&temp_toml_path),
            Err(IndexerError::ConfigError(_))
        ));
        Ok(())
    });
}

#[test]
fn test_zero_sizes_are_rejected() {
    let mut config = VocexdConfig::default();
    assert!(config.check_config().is_ok());

    config.sync.max_block_batch = 0;
    assert!(config.check_config().is_err());

    let mut config = VocexdConfig::default();
    config.node.pool_size = 0;
    assert!(config.check_config().is_err());

    let mut config = VocexdConfig::default();
    config.sync.validator_page_size = 0;
    assert!(config.check_config().is_err());
}
