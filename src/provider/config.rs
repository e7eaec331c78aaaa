use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://cloudcli.cloudwm.com";

pub const ENV_API_URL: &str = "CLOUD_API_URL";
pub const ENV_API_CLIENT_ID: &str = "CLOUD_API_CLIENT_ID";
pub const ENV_API_SECRET: &str = "CLOUD_API_SECRET";

/// Connection settings for the provider API. Built once and handed to
/// [`super::ApiClient`] by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    pub(crate) api_url: String,
    pub(crate) api_client_id: String,
    pub(crate) api_secret: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl ProviderConfig {
    pub fn new(
        api_url: impl Into<String>,
        api_client_id: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_client_id: api_client_id.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load from a JSON file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&data)
    }

    /// Load from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Json)?;
        config.base_url()?;
        Ok(config)
    }

    /// Load from `CLOUD_API_URL`, `CLOUD_API_CLIENT_ID` and `CLOUD_API_SECRET`.
    /// Only the URL is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingEnv(key.to_string()));

        let config = Self::new(
            lookup(ENV_API_URL).unwrap_or_else(default_api_url),
            require(ENV_API_CLIENT_ID)?,
            require(ENV_API_SECRET)?,
        );
        config.base_url()?;
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_client_id(&self) -> &str {
        &self.api_client_id
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// The API url with a trailing slash, so relative request paths join
    /// underneath it instead of replacing its last segment.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.api_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            url: self.api_url.clone(),
            source,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing env var: {0}")]
    MissingEnv(String),
    #[error("invalid api url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
