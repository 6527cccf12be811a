use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const MIN_COLUMNS: u16 = 1;
pub const MAX_COLUMNS: u16 = 10;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    #[serde(default)]
    pub viewer: ViewerConfigFile,
    #[serde(default)]
    pub library: LibraryConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub columns: Option<u16>,
    pub scroll_step: Option<u32>,
    pub frame_budget_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LibraryConfigFile {
    pub switch_poll_interval_ms: Option<u64>,
    pub switch_attempts: Option<u32>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub base_url: String,
    pub viewer: ViewerConfig,
    pub library: LibraryConfig,
}

pub struct ViewerConfig {
    pub columns: u16,
    pub scroll_step: u32,
    pub frame_budget: Duration,
    pub poll_interval: Duration,
}

pub struct LibraryConfig {
    pub switch_poll_interval: Duration,
    pub switch_attempts: u32,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, base_url: Option<String>, columns: Option<u16>) {
        if let Some(ref v) = base_url {
            debug!("config: CLI override base_url={v}");
            self.base_url = base_url;
        }
        if let Some(v) = columns {
            debug!("config: CLI override columns={v}");
            self.viewer.columns = columns;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let config = Config {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            viewer: ViewerConfig {
                columns: self
                    .viewer
                    .columns
                    .unwrap_or(4)
                    .clamp(MIN_COLUMNS, MAX_COLUMNS),
                scroll_step: self.viewer.scroll_step.unwrap_or(1).max(1),
                frame_budget: Duration::from_millis(self.viewer.frame_budget_ms.unwrap_or(32)),
                poll_interval: Duration::from_millis(
                    self.viewer.poll_interval_ms.unwrap_or(50).max(1),
                ),
            },
            library: LibraryConfig {
                switch_poll_interval: Duration::from_millis(
                    self.library.switch_poll_interval_ms.unwrap_or(1000),
                ),
                switch_attempts: self.library.switch_attempts.unwrap_or(30).max(1),
            },
        };
        info!(
            "config: resolved base_url={}, columns={}, scroll_step={}, \
             frame_budget={}ms, poll_interval={}ms, \
             switch_poll_interval={}ms, switch_attempts={}",
            config.base_url,
            config.viewer.columns,
            config.viewer.scroll_step,
            config.viewer.frame_budget.as_millis(),
            config.viewer.poll_interval.as_millis(),
            config.library.switch_poll_interval.as_millis(),
            config.library.switch_attempts,
        );
        config
    }
}

/// Resolve the XDG config path for eaglet.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("eaglet").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            Ok(ConfigFile::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> anyhow::Result<ConfigFile> {
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
