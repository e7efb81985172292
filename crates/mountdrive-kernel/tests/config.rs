//! Loading volume settings from disk.

use mountdrive_contract::StorageOps;
use mountdrive_kernel::{ConfigError, MemoryStorage, MemoryStorageConfig};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_partial_file() {
    let file = write_config(
        r#"
volume_label = "ramdisk"
volume_size_mb = 64
"#,
    );
    let config = MemoryStorageConfig::load(file.path()).unwrap();
    assert_eq!(config.volume_label, "ramdisk");
    assert_eq!(config.volume_size_mb, 64);
    assert_eq!(config.max_component_length, 255);
    assert_eq!(config.file_system_name, "MemoryStorage");

    let store = MemoryStorage::from_config(config);
    assert_eq!(store.volume_label(), "ramdisk");
    assert_eq!(store.total_space(), 64_000_000);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = MemoryStorageConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_load_rejects_unknown_keys() {
    let file = write_config("volume_label = \"x\"\nmount_point = \"M:\\\\\"\n");
    let err = MemoryStorageConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().contains("mount_point"));
}

#[test]
fn test_load_rejects_wrong_types() {
    let file = write_config("volume_size_mb = \"lots\"\n");
    assert!(matches!(
        MemoryStorageConfig::load(file.path()),
        Err(ConfigError::Parse(_))
    ));
}
