use gdstore::error::GdstoreError;
use gdstore::StoreConfig;

#[test]
fn file_settings_fill_in_over_defaults() {
    let path = "test_gdstore_config.toml";
    let _ = std::fs::remove_file(path);
    std::fs::write(
        path,
        r#"
dataset_id = "orders-prod"
service_account = "adapter@orders.iam.gserviceaccount.com"
scopes = ["https://www.googleapis.com/auth/datastore", "https://www.googleapis.com/auth/userinfo.email"]
access_token = "ya29.token"
timeout_secs = 5
"#,
    )
    .expect("write config");
    let loaded = StoreConfig::load(Some(path));
    let _ = std::fs::remove_file(path);

    let config = loaded.expect("loaded");
    assert_eq!(config.dataset_id, "orders-prod");
    assert_eq!(config.scopes.len(), 2);
    assert_eq!(config.access_token.as_deref(), Some("ya29.token"));
    assert_eq!(config.timeout().as_secs(), 5);
    assert_eq!(config.endpoint, "https://www.googleapis.com");
    assert_eq!(config.api_version, "v1beta2");
    config.validate().expect("complete");
    assert_eq!(
        config.method_url("runQuery"),
        "https://www.googleapis.com/datastore/v1beta2/datasets/orders-prod/runQuery"
    );
}

#[test]
fn missing_file_is_a_config_error() {
    assert!(matches!(
        StoreConfig::load(Some("no_such_gdstore_config.toml")),
        Err(GdstoreError::Config(_))
    ));
}

#[test]
fn validation_names_every_missing_parameter() {
    match StoreConfig::default().validate() {
        Err(GdstoreError::Config(message)) => {
            assert!(message.contains("dataset_id"), "{}", message);
            assert!(message.contains("service_account"), "{}", message);
            assert!(message.contains("scopes"), "{}", message);
            assert!(message.contains("private_key_file"), "{}", message);
        }
        other => panic!("expected a config error, got {:?}", other),
    }
}

#[test]
fn either_key_file_or_token_authorises() {
    let base = StoreConfig {
        dataset_id: "d".into(),
        service_account: "adapter@d.iam.gserviceaccount.com".into(),
        scopes: vec!["https://www.googleapis.com/auth/datastore".into()],
        ..Default::default()
    };
    assert_eq!(base.token_uri, "https://oauth2.googleapis.com/token");
    assert!(matches!(base.validate(), Err(GdstoreError::Config(_))));
    let keyed = StoreConfig { private_key_file: Some("key.pem".into()), ..base.clone() };
    keyed.validate().expect("key file is enough");
    let tokened = StoreConfig { access_token: Some("ya29.token".into()), ..base };
    tokened.validate().expect("token is enough");
}

#[test]
fn trailing_slash_on_endpoint_is_ignored() {
    let config = StoreConfig {
        dataset_id: "d".into(),
        endpoint: "http://localhost:8080/".into(),
        ..Default::default()
    };
    assert_eq!(config.method_url("commit"), "http://localhost:8080/datastore/v1beta2/datasets/d/commit");
}
