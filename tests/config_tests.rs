use formsight::utils::config::{AppConfig, GeometryConfig, SessionConfig};
use formsight::utils::error::ConfigError;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_parse_minimal_config_from_json() {
    let json = r#"{
        "max_file_size": 52428800,
        "model_directory": "models"
    }"#;

    let config: AppConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.max_file_size, 52428800);
    assert_eq!(&*config.model_directory, "models");
    assert_eq!(config.inference_threads, 4);
    assert!(config.debug_dump_directory.is_none());
    assert_eq!(config.geometry, GeometryConfig::default());
    assert_eq!(config.session, SessionConfig::default());
    assert_eq!(config.pdf.max_pages, 50);
}

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let json = r#"{
        "max_file_size": 104857600,
        "model_directory": "/opt/models",
        "inference_threads": 2,
        "debug_dump_directory": "/tmp/dumps",
        "geometry": { "max_dimension": 1600, "decisiveness_margin": 0.5 },
        "session": { "timeout_secs": 60 },
        "pdf": { "render_dpi": 150.0 }
    }"#;
    temp_file.write_all(json.as_bytes()).unwrap();

    let config = AppConfig::from_file(temp_file.path()).unwrap();

    assert_eq!(config.max_file_size, 104857600);
    assert_eq!(config.inference_threads, 2);
    assert_eq!(config.debug_dump_directory.as_deref(), Some("/tmp/dumps"));
    assert_eq!(config.geometry.max_dimension, 1600);
    assert_eq!(config.geometry.decisiveness_margin, 0.5);
    // Unset nested fields keep their defaults.
    assert_eq!(config.geometry.detection_dimension, 1000);
    assert_eq!(config.session.timeout(), Duration::from_secs(60));
    assert_eq!(config.session.sweep_interval(), Duration::from_secs(300));
    assert_eq!(config.pdf.render_dpi, 150.0);
    assert_eq!(config.pdf.max_pages, 50);
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.max_file_size, 50 * 1024 * 1024);
    assert_eq!(&*config.model_directory, "models");
    assert_eq!(config.geometry.max_dimension, 2000);
    assert_eq!(config.session.timeout_secs, 3600);
    assert_eq!(config.pdf.render_dpi, 300.0);
}

#[test]
fn test_model_path_joins_directory() {
    let config = AppConfig::default();
    let path = config.model_path("onnx/model.onnx");
    assert_eq!(path, std::path::Path::new("models").join("onnx/model.onnx"));
}

#[test]
fn test_check_upload_size() {
    let config = AppConfig::default();
    assert!(config.check_upload_size(1024).is_ok());

    let err = config
        .check_upload_size(config.max_file_size as usize + 1)
        .unwrap_err();
    assert!(matches!(err, ConfigError::UploadTooLarge { .. }));
}

#[test]
fn test_invalid_json_fails() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"{ not json").unwrap();

    let result = AppConfig::from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_fails() {
    let result = AppConfig::from_file("/nonexistent/formsight.json");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_config_serialization_roundtrip() {
    let config = AppConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let parsed: AppConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.max_file_size, config.max_file_size);
    assert_eq!(parsed.geometry, config.geometry);
    assert_eq!(parsed.session, config.session);
    assert_eq!(parsed.pdf, config.pdf);
}
