//! Startup configuration resolution.
//!
//! # Responsibilities
//! - Load the config file, or fall back to defaults
//! - Apply command-line overrides on top
//! - Validate the final configuration once
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Overrides are validated together with the file

use std::path::Path;

use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::RelayConfig;

/// Command-line values that replace file settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
}

/// Resolve the effective configuration.
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    if let Some(bind) = &overrides.bind_address {
        config.listener.bind_address = bind.clone();
    }
    if let Some(level) = &overrides.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = resolve_config(None, &Overrides::default()).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nbind_address = \"127.0.0.1:4000\"").unwrap();

        let overrides = Overrides {
            bind_address: Some("127.0.0.1:5000".into()),
            log_level: Some("debug".into()),
        };
        let config = resolve_config(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:5000");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let overrides = Overrides {
            bind_address: Some("not-an-address".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            resolve_config(None, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }
}
