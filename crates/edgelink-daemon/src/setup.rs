//! Config file location and loading.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::error::DaemonError;

/// Load configuration from the given path, or the default location.
///
/// A missing file yields the defaults; an unreadable or malformed one is an
/// error.
pub fn load_config(path: Option<&Path>) -> Result<Config, DaemonError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| DaemonError::Config(format!("failed to read config: {e}")))?;
        let config = parse_config(&content)?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        info!(path = %config_path.display(), "no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Parse TOML configuration text.
pub fn parse_config(content: &str) -> Result<Config, DaemonError> {
    toml::from_str(content).map_err(|e| DaemonError::Config(format!("failed to parse config: {e}")))
}

/// Render a configuration as TOML.
pub fn render_config(config: &Config) -> Result<String, DaemonError> {
    toml::to_string_pretty(config)
        .map_err(|e| DaemonError::Config(format!("failed to render config: {e}")))
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("edgelink")
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgelink_types::Role;

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("edgelink-no-such-dir/config.toml");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.session.role, Role::Server);
        assert_eq!(config.session.primary_port, 50007);
    }

    #[test]
    fn loads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("edgelink-setup-{}.toml", std::process::id()));
        std::fs::write(&path, "[session]\nrole = \"client\"\naddress = \"10.0.0.2\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.session.role, Role::Client);
        assert_eq!(config.session.address.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(matches!(
            parse_config("[session\nrole = 1"),
            Err(DaemonError::Config(_))
        ));
    }

    #[test]
    fn rendered_defaults_parse_back() {
        let text = render_config(&Config::default()).unwrap();
        assert!(text.contains("[session]"));
        let parsed = parse_config(&text).unwrap();
        assert_eq!(parsed.edge.margin, Config::default().edge.margin);
    }

    #[test]
    fn default_path_ends_in_edgelink() {
        assert!(default_config_path().ends_with("edgelink/config.toml"));
    }
}
