use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const WXAPI_URL_ENV: &str = "HFI_WXAPI_URL";
pub const GEOAPI_URL_ENV: &str = "HFI_GEOAPI_URL";

/// Base URLs of the services this client talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Serves `nearby` and `hfi`.
    pub wxapi_base_url: String,
    /// Serves `countries` and `cities`.
    pub geoapi_base_url: String,
    /// Empty disables automatic location detection.
    pub geolocation_url: String,
    pub geocoder_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            wxapi_base_url: "http://localhost:8080/wxapi".to_string(),
            geoapi_base_url: "http://localhost:8080/geoapi".to_string(),
            geolocation_url: "https://ipapi.co/json/".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org/search".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub request_timeout_secs: u64,
    pub geolocation_timeout_secs: u64,
    pub debounce_ms: u64,
    pub min_query_len: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            geolocation_timeout_secs: 10,
            debounce_ms: 300,
            min_query_len: 2,
        }
    }
}

impl Timing {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_secs(self.geolocation_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Celsius and km/h instead of Fahrenheit and mph.
    pub metric: bool,
    pub max_intervals: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { metric: false, max_intervals: 8 }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [endpoints]
/// wxapi_base_url = "https://example.org/wxapi"
///
/// [display]
/// metric = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    pub timing: Timing,
    pub display: DisplaySettings,
}

impl Config {
    /// Load config from the platform config dir, or defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to the platform config dir, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "hair-forecast", "hfi")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overrides base URLs from the environment. `lookup` is injectable for tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(WXAPI_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoints.wxapi_base_url = url;
        }
        if let Some(url) = lookup(GEOAPI_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoints.geoapi_base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("wxapi_base_url", &self.endpoints.wxapi_base_url),
            ("geoapi_base_url", &self.endpoints.geoapi_base_url),
            ("geolocation_url", &self.endpoints.geolocation_url),
            ("geocoder_url", &self.endpoints.geocoder_url),
        ];
        for (name, url) in urls {
            if name == "geolocation_url" && url.is_empty() {
                continue;
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!(
                    "Invalid endpoint `{name}` = '{url}': expected an http:// or https:// URL.\n\
                     Hint: run `hfi configure` to fix it."
                ));
            }
        }

        if self.timing.min_query_len == 0 {
            return Err(anyhow!("`timing.min_query_len` must be at least 1"));
        }
        if self.display.max_intervals == 0 {
            return Err(anyhow!("`display.max_intervals` must be at least 1"));
        }

        Ok(())
    }
}
