//! Search cluster configuration
//!
//! Resolution order, lowest to highest precedence:
//! 1. Compiled defaults
//! 2. TOML config file (explicit path, `$FSX_CONFIG`, or the user config dir)
//! 3. `FSX_SEARCH_*` environment variables
//!
//! Command-line flags are applied on top by each binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Connection settings for the search/analytics cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub host: String,
    pub port: u16,
    /// `https` for real clusters, `http` for local development ones.
    pub scheme: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Default index name used when a tool is not given one explicitly.
    pub index: String,
    /// Accept self-signed certificates. Dev clusters ship with those.
    pub insecure: bool,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            scheme: "https".to_string(),
            username: None,
            password: None,
            index: "fieldscan".to_string(),
            insecure: false,
            timeout_secs: 30,
        }
    }
}

/// On-disk configuration file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub search: SearchConfig,
}

impl SearchConfig {
    /// Resolve the effective configuration.
    ///
    /// An explicitly passed path must exist; the fallback locations are
    /// optional and silently skipped when absent.
    pub fn resolve(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match locate_config_file(config_path) {
            Some(path) => {
                debug!(path = %path.display(), "loading search config");
                let content = std::fs::read_to_string(&path)?;
                let parsed: TomlConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                parsed.search
            }
            None => SearchConfig::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `FSX_SEARCH_*` environment overrides in place.
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("FSX_SEARCH_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("FSX_SEARCH_PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid FSX_SEARCH_PORT: {port}")))?;
        }
        if let Ok(scheme) = std::env::var("FSX_SEARCH_SCHEME") {
            self.scheme = scheme;
        }
        if let Ok(user) = std::env::var("FSX_SEARCH_USER") {
            self.username = Some(user);
        }
        if let Ok(password) = std::env::var("FSX_SEARCH_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(index) = std::env::var("FSX_SEARCH_INDEX") {
            self.index = index;
        }
        if let Ok(insecure) = std::env::var("FSX_SEARCH_INSECURE") {
            self.insecure = matches!(insecure.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Root URL of the cluster, no trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("FSX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let user_config = dirs::config_dir()?.join("fsx").join("config.toml");
    user_config.exists().then_some(user_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_cluster() {
        let config = SearchConfig::default();
        assert_eq!(config.base_url(), "https://localhost:9200");
        assert_eq!(config.index, "fieldscan");
        assert!(!config.insecure);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let parsed: TomlConfig = toml::from_str(
            r#"
            [search]
            host = "search.example.org"
            port = 9443
            index = "fieldscan-dev"
            insecure = true
            "#,
        )
        .unwrap();
        assert_eq!(parsed.search.host, "search.example.org");
        assert_eq!(parsed.search.port, 9443);
        assert_eq!(parsed.search.index, "fieldscan-dev");
        assert!(parsed.search.insecure);
        // Unset keys keep their defaults
        assert_eq!(parsed.search.scheme, "https");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let parsed: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.search.port, 9200);
    }
}
