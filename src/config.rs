//! Configuration manager for buffalokart.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_NEO4J_USERNAME: &str = "neo4j";
pub const DEFAULT_OTP_DIGITS: u16 = 6;
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listen port.
    pub port: Option<u16>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to Neo4j configuration.
    #[serde(skip_serializing)]
    pub neo4j: Option<Neo4j>,
    /// Related to verification code issuance.
    #[serde(skip_serializing)]
    pub otp: Option<Otp>,
}

/// Neo4j configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Neo4j {
    /// bolt://hostname:(?port) for the Neo4j instance.
    pub address: String,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    /// Overridden by the `NEO4J_PASSWORD` environment variable.
    pub password: Option<String>,
    /// Database name. Driver default when unset.
    pub database: Option<String>,
}

/// Verification code configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Otp {
    /// Number of digits for the code.
    pub digits: u16,
}

impl Default for Otp {
    fn default() -> Self {
        Self {
            digits: DEFAULT_OTP_DIGITS,
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                // normalize URLs.
                if !config.url.is_empty() {
                    config.url = self.normalize_url(&config.url)?;
                }

                // credentials from environment take precedence.
                if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
                    if let Some(neo4j) = config.neo4j.as_mut() {
                        neo4j.password = Some(password);
                    }
                }

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
