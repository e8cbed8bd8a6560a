use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::transfer::{ApplyOptions, CaptureOptions, ControllerOptions};
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Transfer behavior
    pub transfer: TransferConfig,
    /// Entity categories included in a capture
    pub categories: CaptureOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    pub clear_after_apply: bool,
    pub rename_sessions: bool,
    pub warn_on_reapply: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            clear_after_apply: false,
            rename_sessions: true,
            warn_on_reapply: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            categories: CaptureOptions::default(),
        }
    }
}

/// TOML representation of the config file
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    transfer: Option<TomlTransferConfig>,
    categories: Option<CaptureOptions>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlTransferConfig {
    clear_after_apply: Option<bool>,
    rename_sessions: Option<bool>,
    warn_on_reapply: Option<bool>,
}

impl Config {
    /// Load configuration from the data directory, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from `path`. A missing or unreadable file yields
    /// the defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No config file loaded");
                return config;
            }
        };

        let toml_config = match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => toml_config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                return config;
            }
        };

        if let Some(transfer) = toml_config.transfer {
            if let Some(clear_after_apply) = transfer.clear_after_apply {
                config.transfer.clear_after_apply = clear_after_apply;
            }
            if let Some(rename_sessions) = transfer.rename_sessions {
                config.transfer.rename_sessions = rename_sessions;
            }
            if let Some(warn_on_reapply) = transfer.warn_on_reapply {
                config.transfer.warn_on_reapply = warn_on_reapply;
            }
        }

        if let Some(categories) = toml_config.categories {
            config.categories = categories;
        }

        config
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            capture: self.categories,
            apply: ApplyOptions {
                rename_sessions: self.transfer.rename_sessions,
            },
            clear_after_apply: self.transfer.clear_after_apply,
            warn_on_reapply: self.transfer.warn_on_reapply,
        }
    }
}
