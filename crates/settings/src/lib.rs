//! Preferences for the canopy command-line tools.
//! canopy 命令列工具的偏好設定。

pub mod preferences;

pub use preferences::{
    LoggingPreferences, OutputPreferences, Preferences, PreferencesError, PreferencesStore,
    SearchPreferences, DEFAULT_CONFIG_FILE,
};
