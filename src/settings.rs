use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::layout::PageSetup;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "folio";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub page_setup: PageSetup,

    /// Pixel size of a page at 100% zoom
    #[serde(default = "default_page_width")]
    pub page_width_px: u32,

    #[serde(default = "default_page_height")]
    pub page_height_px: u32,

    /// Show page numbers as a right-aligned column in the outline
    #[serde(default = "default_true")]
    pub toc_page_column: bool,

    #[serde(default)]
    pub filter_case_sensitive: bool,

    #[serde(default = "default_notification_ms")]
    pub notification_duration_ms: u64,

    #[serde(default = "default_cache_size")]
    pub pixmap_cache_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_page_width() -> u32 {
    595
}

fn default_page_height() -> u32 {
    842
}

fn default_notification_ms() -> u64 {
    5000
}

fn default_cache_size() -> usize {
    crate::render::DEFAULT_CACHE_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            page_setup: PageSetup::default(),
            page_width_px: default_page_width(),
            page_height_px: default_page_height(),
            toc_page_column: true,
            filter_case_sensitive: false,
            notification_duration_ms: default_notification_ms(),
            pixmap_cache_size: default_cache_size(),
        }
    }
}

impl Settings {
    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the user's settings into the global store, creating the file on first run
pub fn load_settings() {
    let Some(path) = config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Err(e) = save_settings_to_path(&get_settings(), &path) {
            warn!("{e}");
        }
        return;
    }
    match load_settings_from_path(&path) {
        Ok(settings) => set_settings(settings),
        Err(e) => warn!("{e}; using default settings"),
    }
}

pub fn load_settings_from_path(path: &Path) -> Result<Settings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: Settings =
        serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
    }
    Ok(settings)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_path(settings: &Settings, path: &Path) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let body = serde_yaml::to_string(settings).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, format!("{SETTINGS_HEADER}{body}")).map_err(io_err)?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn set_settings(settings: Settings) {
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
}

pub fn update_settings(f: impl FnOnce(&mut Settings)) {
    if let Ok(mut global) = SETTINGS.write() {
        f(&mut global);
    }
}

const SETTINGS_HEADER: &str = "# folio settings\n# page_setup controls pagination (text columns x lines per page).\n";
