use config::ConfigError;

use crate::Error;
use crate::StoreError;

#[test]
fn test_store_error_already_exists() {
    let err = StoreError::AlreadyExists {
        key: "ns1/web".to_string(),
    };
    assert_eq!(err.to_string(), "Object ns1/web already exists");
}

#[test]
fn test_store_error_not_found_converts_transparently() {
    let err: Error = StoreError::NotFound {
        key: "ns1/db".to_string(),
    }
    .into();
    assert!(matches!(err, Error::Store(StoreError::NotFound { .. })));
    assert_eq!(err.to_string(), "Object ns1/db not found");
}

#[test]
fn test_store_error_not_running() {
    let err: Error = StoreError::NotRunning.into();
    assert_eq!(err.to_string(), "Store is not running");
}

#[test]
fn test_config_error_is_transparent() {
    let err: Error = ConfigError::Message("watch.watcher_buffer_size must be greater than 0".into()).into();
    assert!(err.to_string().contains("watcher_buffer_size"));
}
