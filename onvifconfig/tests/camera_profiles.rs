//! Tests de chargement des profils de caméras

use onvifconfig::{CameraConfig, Config};
use std::fs;
use tempfile::TempDir;

const CONFIG_YAML: &str = r#"
host:
  http_timeout_secs: 4
defaults:
  token_age_secs: -2
cameras:
  Entrance:
    address: http://192.168.1.10/onvif/device_service
    username: admin
    password: secret
    namespaces:
      - xmlns:tds="http://www.onvif.org/ver10/device/wsdl"
  garage:
    address: http://192.168.1.11/onvif/device_service
    token_age_secs: 30
    quiet: true
"#;

fn load(yaml: Option<&str>, vars: Vec<(&str, &str)>) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    if let Some(yaml) = yaml {
        fs::write(dir.path().join("config.yaml"), yaml).unwrap();
    }
    let vars = vars
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()));
    let config = Config::load_config_with_env(Some(dir.path()), vars).unwrap();
    (dir, config)
}

#[test]
fn test_missing_file_uses_defaults() {
    let (dir, config) = load(None, vec![]);

    assert_eq!(config.config_dir(), dir.path());
    assert_eq!(config.get_http_timeout_secs(), 10);
    assert_eq!(config.get_default_token_age_secs(), 0);
    assert_eq!(config.get_log_min_level(), "info");
    assert!(config.camera_names().is_empty());
}

#[test]
fn test_camera_profiles() {
    let (_dir, config) = load(Some(CONFIG_YAML), vec![]);

    assert_eq!(config.camera_names(), vec!["entrance", "garage"]);
    assert_eq!(config.get_http_timeout_secs(), 4);
    // Valeur par défaut intégrée conservée par la fusion
    assert_eq!(config.get_log_min_level(), "info");

    let entrance = config.get_camera("Entrance").unwrap();
    assert_eq!(entrance.username, "admin");
    assert_eq!(entrance.password, "secret");
    assert_eq!(entrance.namespaces.len(), 1);
    assert!(!entrance.quiet);
    assert_eq!(config.token_age_secs(&entrance), -2);

    let garage = config.get_camera("garage").unwrap();
    assert_eq!(garage.username, "");
    assert!(garage.quiet);
    assert_eq!(config.token_age_secs(&garage), 30);
}

#[test]
fn test_unknown_camera_is_an_error() {
    let (_dir, config) = load(Some(CONFIG_YAML), vec![]);
    let err = config.get_camera("backyard").unwrap_err();
    assert!(err.to_string().contains("backyard"));
}

#[test]
fn test_env_override_wins() {
    let (_dir, config) = load(
        Some(CONFIG_YAML),
        vec![
            ("ONVIFSOAP_CONFIG__HOST__HTTP_TIMEOUT_SECS", "25"),
            ("ONVIFSOAP_CONFIG__CAMERAS__GARAGE__USERNAME", "operator"),
        ],
    );

    assert_eq!(config.get_http_timeout_secs(), 25);
    assert_eq!(config.get_camera("garage").unwrap().username, "operator");
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.yaml"), "cameras: [unclosed").unwrap();
    assert!(Config::load_config_with_env(Some(dir.path()), Vec::new()).is_err());
}

#[test]
fn test_unreadable_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    // Un répertoire à la place du fichier : présent mais illisible
    fs::create_dir(dir.path().join("config.yaml")).unwrap();

    let err = Config::load_config_with_env(Some(dir.path()), Vec::new()).unwrap_err();
    assert!(err.to_string().contains("config.yaml"), "{err:#}");
}

#[test]
fn test_set_camera_and_save() {
    let (dir, config) = load(None, vec![]);
    let camera = CameraConfig {
        address: "http://10.0.0.5/onvif/device_service".to_string(),
        username: "admin".to_string(),
        password: "pass".to_string(),
        token_age_secs: None,
        namespaces: vec![],
        quiet: false,
    };
    config.set_camera("porch", &camera).unwrap();
    config.set_http_timeout_secs(3).unwrap();
    config.save().unwrap();

    let reloaded = Config::load_config_with_env(Some(dir.path()), Vec::new()).unwrap();
    assert_eq!(reloaded.get_camera("porch").unwrap(), camera);
    assert_eq!(reloaded.get_http_timeout_secs(), 3);
}
