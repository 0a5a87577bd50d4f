use canopy_common::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const PREFERENCES_VERSION: u32 = 1;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "canopy.json";

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub search: SearchPreferences,
    #[serde(default)]
    pub output: OutputPreferences,
    #[serde(default)]
    pub logging: LoggingPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            search: SearchPreferences::default(),
            output: OutputPreferences::default(),
            logging: LoggingPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.logging.sanitize();
    }
}

/// Defaults for relational search.
/// 關聯搜尋的預設值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPreferences {
    /// Whether matches are returned with `isMatched: true`.
    #[serde(default = "default_true")]
    pub mark_matches: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SearchPreferences {
    fn default() -> Self {
        Self { mark_matches: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPreferences {
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for OutputPreferences {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingPreferences {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingPreferences {
    fn sanitize(&mut self) {
        let level = self.level.trim().to_ascii_lowercase();
        self.level = if LOG_LEVELS.contains(&level.as_str()) {
            level
        } else {
            default_log_level()
        };
    }
}

/// Preferences bound to the JSON file they were loaded from.
/// 與來源 JSON 檔案綁定的偏好設定。
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    /// Loads preferences, returning sanitized defaults when the file is absent.
    /// 載入偏好設定；檔案不存在時回傳預設值。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "preferences file not found, using defaults");
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        debug!(path = %path.display(), "loaded preferences");
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.data
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the preferences atomically (temporary sibling, then rename).
    /// 以原子方式寫入偏好設定。
    pub fn save(&self) -> Result<(), PreferencesError> {
        let payload = self.render(&self.path)?;
        write_atomic(&self.path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<(), PreferencesError> {
        let path = path.as_ref().to_path_buf();
        let payload = self.render(&path)?;
        fs::write(&path, payload.as_bytes())
            .map_err(|source| PreferencesError::Write { path, source })
    }

    fn render(&self, destination: &Path) -> Result<String, PreferencesError> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        serde_json::to_string_pretty(&self.data).map_err(|source| PreferencesError::Serialize {
            path: destination.to_path_buf(),
            source,
        })
    }
}
