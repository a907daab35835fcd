//! # onvifsoap Configuration Module
//!
//! Configuration des caméras ONVIF connues et des réglages du client :
//! - Chargement depuis un fichier YAML
//! - Fusion avec la configuration par défaut intégrée
//! - Surcharges par variables d'environnement
//! - Accès typé aux profils de caméras
//!
//! ## Usage
//!
//! ```no_run
//! use onvifconfig::Config;
//!
//! let config = Config::load_config(None)?;
//! let camera = config.get_camera("entrance")?;
//! println!("{} -> {}", camera.username, camera.address);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("onvifsoap.yaml");

const CONFIG_FILE: &str = "config.yaml";
const CONFIG_DIR_NAME: &str = ".onvifsoap";
const ENV_CONFIG_DIR: &str = "ONVIFSOAP_CONFIG";
const ENV_PREFIX: &str = "ONVIFSOAP_CONFIG__";

const DEFAULT_HTTP_TIMEOUT_SECS: i64 = 10;
const DEFAULT_TOKEN_AGE_SECS: i64 = 0;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Macro to generate getter/setter for integer values with default
macro_rules! impl_i64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> i64 {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap_or($default),
                Ok(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                    warn!(path = %$path.join("."), value = %s, "Invalid integer, using default {}", $default);
                    $default
                }),
                _ => $default,
            }
        }

        pub fn $setter(&self, value: i64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Profil d'une caméra
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Adresse du service (XAddr), ex. `http://192.168.1.10/onvif/device_service`
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Décalage de l'horodatage WS-Security ; à défaut, la valeur globale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_age_secs: Option<i64>,
    /// Déclarations de namespaces ajoutées à chaque enveloppe
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Coupe la trace des corps de requête et de réponse
    #[serde(default)]
    pub quiet: bool,
}

/// Configuration manager
///
/// Les clés sont normalisées en minuscules, y compris les noms de caméras.
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Finds the config directory
    ///
    /// Order: explicit argument, `ONVIFSOAP_CONFIG`, `./.onvifsoap`,
    /// `~/.onvifsoap`. The first existing candidate wins; the local
    /// directory is the fallback.
    fn find_config_dir(directory: Option<&Path>) -> PathBuf {
        if let Some(directory) = directory {
            return directory.to_path_buf();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Using config directory from env");
            return PathBuf::from(env_path);
        }

        let local = PathBuf::from(CONFIG_DIR_NAME);
        if local.exists() {
            return local;
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        local
    }

    /// Loads the configuration, applying `ONVIFSOAP_CONFIG__*` overrides
    /// from the process environment
    pub fn load_config(directory: Option<&Path>) -> Result<Self> {
        Self::load_config_with_env(directory, env::vars())
    }

    /// Loads the configuration with an explicit set of environment variables
    ///
    /// The embedded defaults are merged with `config.yaml` when it exists;
    /// a missing file is not an error.
    pub fn load_config_with_env<I>(directory: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config_dir = Self::find_config_dir(directory);
        let path = config_dir.join(CONFIG_FILE);

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                merge_yaml(&mut value, &external);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(config_file = %path.display(), "Config file not found, using embedded defaults");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        }

        let mut value = lower_keys(value);
        apply_env_overrides(&mut value, vars);

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(value),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Writes the current configuration to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = {
            let data = self.lock()?;
            serde_yaml::to_string(&*data)?
        };
        fs::create_dir_all(&self.config_dir)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    /// Sets a value at `path` (e.g. `&["host", "http_timeout_secs"]`)
    ///
    /// The change stays in memory until [`Config::save`].
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock()?;
        set_value_internal(&mut data, path, value)
    }

    /// Gets the value at `path`
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            let Value::Mapping(map) = current else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            };
            current = map
                .get(Value::String(key.to_lowercase()))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join(".")))?;
        }
        Ok(current.clone())
    }

    /// Profil de la caméra `name`
    pub fn get_camera(&self, name: &str) -> Result<CameraConfig> {
        let value = self
            .get_value(&["cameras", name])
            .with_context(|| format!("Unknown camera '{}'", name))?;
        serde_yaml::from_value(value).with_context(|| format!("Invalid profile for camera '{}'", name))
    }

    /// Enregistre (ou remplace) le profil d'une caméra
    pub fn set_camera(&self, name: &str, camera: &CameraConfig) -> Result<()> {
        self.set_value(&["cameras", name], serde_yaml::to_value(camera)?)
    }

    /// Noms des caméras configurées, triés
    pub fn camera_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.get_value(&["cameras"]) {
            Ok(Value::Mapping(map)) => map
                .keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        names.sort();
        names
    }

    /// Décalage effectif de l'horodatage pour une caméra
    pub fn token_age_secs(&self, camera: &CameraConfig) -> i64 {
        camera
            .token_age_secs
            .unwrap_or_else(|| self.get_default_token_age_secs())
    }

    impl_i64_config!(
        get_http_timeout_secs,
        set_http_timeout_secs,
        &["host", "http_timeout_secs"],
        DEFAULT_HTTP_TIMEOUT_SECS
    );

    impl_i64_config!(
        get_default_token_age_secs,
        set_default_token_age_secs,
        &["defaults", "token_age_secs"],
        DEFAULT_TOKEN_AGE_SECS
    );

    /// Niveau de log minimum (`trace`, `debug`, `info`…)
    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    pub fn set_log_min_level(&self, level: &str) -> Result<()> {
        self.set_value(
            &["host", "logger", "min_level"],
            Value::String(level.to_string()),
        )
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((head, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a mapping"));
    };

    let key = Value::String(head.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
        set_value_internal(entry, rest, value)
    }
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path: Vec<&str> = suffix.split("__").collect();
        // Valeur interprétée comme du YAML, sinon prise comme chaîne
        let yaml = serde_yaml::from_str::<Value>(&value).unwrap_or(Value::String(value.clone()));
        if let Err(e) = set_value_internal(config, &path, lower_keys(yaml)) {
            warn!(variable = %key, error = %e, "Ignoring environment override");
        }
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        _ => value,
    }
}

/// Merges `external` into `default`: mappings are merged recursively,
/// scalars and sequences are replaced
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
