use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StorageError};

pub const CONFIG_FILE_ENV: &str = "QUALIBRATE_CONFIG_FILE";

/// Qualibrate settings.
///
/// The storage root comes from the qualibrate settings file:
///
/// ```toml
/// [qualibrate.storage]
/// type = "local_storage"
/// location = "~/.qualibrate/user_storage/my_project"
/// ```
///
/// The file is `$QUALIBRATE_CONFIG_FILE` when set, otherwise
/// `~/.qualibrate/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub qualibrate: QualibrateSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualibrateSettings {
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub location: PathBuf,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Load from the default location (see [`Settings`]).
    pub fn resolve() -> Result<Self> {
        let path = config_path(std::env::var_os(CONFIG_FILE_ENV))?;
        log::debug!("reading settings from {}", path.display());
        Self::load(&path)
    }

    /// Root of the experiment storage tree, with `~` expanded.
    pub fn storage_location(&self) -> PathBuf {
        expand_home(&self.qualibrate.storage.location)
    }
}

/// Settings file path: the override if given, else the per-user default.
pub fn config_path(override_path: Option<OsString>) -> Result<PathBuf> {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".qualibrate").join("config.toml"))
        .ok_or_else(|| StorageError::Config("cannot determine the home directory".to_string()))
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Bundle file names
// ---------------------------------------------------------------------------

/// File names and extensions inside an experiment folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Extension of measurement-data files, without the dot.
    pub data_extension: String,
    pub metadata_filename: String,
    pub state_filename: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            data_extension: "parquet".to_string(),
            metadata_filename: "data.json".to_string(),
            state_filename: "quam_state.json".to_string(),
        }
    }
}
