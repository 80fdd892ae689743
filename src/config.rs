use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::detector::DetectorConfig;
use crate::pacer::PacerConfig;
use crate::signal::{EcgConfig, FilterConfig};
use crate::sim::{RunConfig, SimConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter; `RUST_LOG` takes precedence when set.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Result of reading a config file: the config in effect plus any fallback reasons.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn log_warnings(&self) {
        for message in &self.warnings {
            warn!("{message}");
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: RunConfig,
    #[serde(default)]
    pub signal: EcgConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub pacer: PacerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            run: self.simulation.clone(),
            signal: self.signal.clone(),
            filter: self.filter.clone(),
            detector: self.detector.clone(),
            pacer: self.pacer.clone(),
        }
    }

    /// Reads `path`, or writes a fully commented default file when it does not exist.
    /// Unreadable or malformed files fall back to defaults. Fallback reasons are
    /// returned rather than logged, so callers can report them once logging is up.
    pub fn load(path: &str) -> LoadedConfig {
        let path_obj = Path::new(path);
        let mut warnings = Vec::new();
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return LoadedConfig { config, warnings },
                    Err(err) => {
                        warnings.push(format!(
                            "Failed to parse config {path}: {err}. Using defaults."
                        ));
                    }
                },
                Err(err) => {
                    warnings.push(format!("Failed to read config {path}: {err}. Using defaults."));
                }
            }
            return LoadedConfig {
                config: Self::default(),
                warnings,
            };
        }

        match Self::commented_defaults() {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, text) {
                    warnings.push(format!("Failed to write default config to {path}: {err}"));
                }
            }
            Err(err) => {
                warnings.push(format!(
                    "Failed to serialize default config: {err}; continuing with defaults"
                ));
            }
        }
        LoadedConfig {
            config: Self::default(),
            warnings,
        }
    }

    /// `load`, with fallback reasons emitted as `warn!` events.
    pub fn load_or_default(path: &str) -> Self {
        let loaded = Self::load(path);
        loaded.log_warnings();
        loaded.config
    }

    /// Default config as TOML with every key commented out and section headers kept.
    pub fn commented_defaults() -> Result<String, toml::ser::Error> {
        let text = toml::to_string_pretty(&Self::default())?;
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                commented.push_str("# ");
                commented.push_str(line);
                commented.push('\n');
            }
        }
        Ok(commented)
    }
}
