//! The `config` module loads the relay's settings.
//!
//! Sources are layered from lowest to highest priority: built-in defaults,
//! an optional TOML file and `WSRELAY_`-prefixed environment variables
//! (`WSRELAY_SERVER__PORT=9000`). Command-line overrides are applied by the
//! binary on top of the result.

mod settings;

use std::path::Path;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LogSettings, RelaySettings, ServerSettings, Settings};

/// Default location of the optional configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "WSRELAY";

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Like [`load_config`], but reads `path` instead of the default file.
///
/// An explicit path must exist; the default file is optional.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    Ok(partial.merge_onto(Settings::default()))
}
