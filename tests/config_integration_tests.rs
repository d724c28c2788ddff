//! Configuration loading from files and arguments
use std::fs;

use clap::Parser;
use gcode_document::config::{Args, Config, FileConfig};
use gcode_document::DocumentError;

#[test]
fn test_load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[document]
strict = true
buffer_capacity = 512
stream_threshold_bytes = 1000

[filament]
density = 1.04
"#,
    )
    .unwrap();

    let config = FileConfig::load(&path).unwrap();
    assert!(config.document.strict);
    assert_eq!(config.document.buffer_capacity, 512);
    assert_eq!(config.document.stream_threshold_bytes, 1000);
    assert_eq!(config.filament.density, 1.04);
    assert_eq!(config.filament.diameter, 1.75);
}

#[test]
fn test_missing_config_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = FileConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, FileConfig::default());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[document\nstrict = ").unwrap();

    assert!(matches!(
        FileConfig::load(&path),
        Err(DocumentError::Config(_))
    ));
}

#[test]
fn test_explicit_config_path_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[document]\nbuffer_capacity = 32\n[filament]\ndiameter = 2.85\n").unwrap();

    let args = Args::parse_from([
        "gcode-info",
        "print.gcode",
        "--config",
        path.to_str().unwrap(),
        "--stream",
        "--density",
        "1.27",
        "--json",
    ]);
    let config = Config::from_args(args).unwrap();

    assert_eq!(config.document.buffer_capacity, 32);
    assert!(config.document.force_streaming);
    assert_eq!(config.filament.diameter, 2.85);
    assert_eq!(config.filament.density, 1.27);
    assert!(config.json);
    assert_eq!(config.line, None);
}
