use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_interval", with = "humantime_duration")]
    pub interval: Duration,
    #[serde(default)]
    pub json: bool,
    #[serde(default, alias = "logFile")]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "default_cpu_threshold")]
    pub cpu: f64,
    #[serde(default = "default_memory_threshold")]
    pub memory: f64,
    #[serde(default = "default_disk_threshold")]
    pub disk: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            json: false,
            log_file: None,
            listen: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: default_cpu_threshold(),
            memory: default_memory_threshold(),
            disk: default_disk_threshold(),
        }
    }
}

/// Values given on the command line; `None` keeps what the file (or default) says.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval: Option<Duration>,
    pub json: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub listen: Option<String>,
    pub cpu_threshold: Option<f64>,
    pub memory_threshold: Option<f64>,
    pub disk_threshold: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("failed to parse JSON in {path}: {source}")]
    ParseJson {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let is_json = path_ref
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let cfg: Config = if is_json {
            serde_json::from_str(&text).map_err(|source| ConfigError::ParseJson {
                path: path_display,
                source,
            })?
        } else {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::ParseYaml {
                path: path_display,
                source,
            })?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        cfg.apply(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(interval) = overrides.interval {
            self.interval = interval;
        }
        if let Some(json) = overrides.json {
            self.json = json;
        }
        if let Some(log_file) = &overrides.log_file {
            self.log_file = Some(log_file.clone());
        }
        if let Some(listen) = &overrides.listen {
            self.listen = Some(listen.clone());
        }
        if let Some(cpu) = overrides.cpu_threshold {
            self.thresholds.cpu = cpu;
        }
        if let Some(memory) = overrides.memory_threshold {
            self.thresholds.memory = memory;
        }
        if let Some(disk) = overrides.disk_threshold {
            self.thresholds.disk = disk;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Validation(
                "interval must be positive".to_string(),
            ));
        }
        if self.interval > MAX_INTERVAL {
            return Err(ConfigError::Validation(format!(
                "interval too large (max 1h), got {}",
                humantime::format_duration(self.interval)
            )));
        }
        if let Some(listen) = &self.listen {
            if !is_host_port(listen) {
                return Err(ConfigError::Validation(format!(
                    "listen must be a host:port address, got '{listen}'"
                )));
            }
        }

        validate_threshold("cpu", self.thresholds.cpu)?;
        validate_threshold("memory", self.thresholds.memory)?;
        validate_threshold("disk", self.thresholds.disk)?;
        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

// host may be a name; it is resolved when the exporter binds
fn is_host_port(listen: &str) -> bool {
    match listen.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

fn validate_threshold(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "thresholds.{name} must be within 0..100, got {value:.2}"
        )));
    }
    Ok(())
}

const fn default_interval() -> Duration {
    Duration::from_secs(1)
}

const fn default_cpu_threshold() -> f64 {
    80.0
}

const fn default_memory_threshold() -> f64 {
    85.0
}

const fn default_disk_threshold() -> f64 {
    90.0
}

mod humantime_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}
