// Application configuration
//
// Layered with the `config` crate: built-in defaults, then an optional `pm-setup.toml`, then
// `PM_SETUP_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::utils::path_resolver;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IMPORT_TIMEOUT_SECS: u64 = 300;
const ENV_PREFIX: &str = "PM_SETUP";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub import_timeout_secs: u64,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            import_timeout_secs: DEFAULT_IMPORT_TIMEOUT_SECS,
            data_dir: None,
        }
    }
}

impl AppConfig {
    /// Defaults, the resolved config file (if present) and the process environment.
    pub fn load() -> Result<Self> {
        let file = path_resolver::resolve_config_file();
        Self::load_from(file.as_deref(), None)
    }

    /// `env` replaces the process environment when given.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
            .set_default("import_timeout_secs", DEFAULT_IMPORT_TIMEOUT_SECS)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let cfg: AppConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.api_base_url.trim())
            .with_context(|| format!("api_base_url is not a valid URL: {:?}", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("api_base_url must use http or https (got {:?})", url.scheme());
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        if self.import_timeout_secs == 0 {
            anyhow::bail!("import_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_secs)
    }

    pub fn data_folder(&self) -> PathBuf {
        path_resolver::resolve_data_folder(self.data_dir.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg = AppConfig::load_from(None, no_env()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.import_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_from(Some(&dir.path().join("absent.toml")), no_env()).unwrap();
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pm-setup.toml");
        std::fs::write(
            &path,
            "api_base_url = \"https://setup.internal:9443\"\nrequest_timeout_secs = 5\ndata_dir = \"/var/lib/pm\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(Some(&path), no_env()).unwrap();
        assert_eq!(cfg.api_base_url, "https://setup.internal:9443");
        assert_eq!(cfg.request_timeout_secs, 5);
        assert_eq!(cfg.import_timeout_secs, DEFAULT_IMPORT_TIMEOUT_SECS);
        assert_eq!(cfg.data_folder(), PathBuf::from("/var/lib/pm"));
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pm-setup.toml");
        std::fs::write(&path, "import_timeout_secs = 60\n").unwrap();

        let env = HashMap::from([(
            "PM_SETUP_IMPORT_TIMEOUT_SECS".to_string(),
            "120".to_string(),
        )]);
        let cfg = AppConfig::load_from(Some(&path), Some(env)).unwrap();
        assert_eq!(cfg.import_timeout_secs, 120);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let env = HashMap::from([("PM_SETUP_API_BASE_URL".to_string(), "not a url".to_string())]);
        assert!(AppConfig::load_from(None, Some(env)).is_err());

        let cfg = AppConfig {
            api_base_url: "ftp://host".into(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
