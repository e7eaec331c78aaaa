use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{ConfigError, ProviderConfig};
use crate::cloud::Image;

const USER_AGENT: &str = "cloud-image-lookup/0.1";

/// Anything that can list the public images of a datacenter.
#[async_trait::async_trait]
pub trait CatalogSource {
    async fn fetch_images(&self, datacenter_id: &str) -> Result<Vec<Image>, ApiError>;
}

/// Thin JSON client for the provider API.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    client_id: String,
    secret: String,
}

impl ApiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: config.base_url()?,
            client_id: config.api_client_id().to_string(),
            secret: config.api_secret().to_string(),
        })
    }

    /// Send `method` to `path` (relative to the API url, query included) and
    /// decode the JSON reply.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let url = self.base_url.join(path).map_err(|source| ApiError::Path {
            path: path.to_string(),
            source,
        })?;

        debug!(%method, %url, "Sending API request");

        let mut req = self
            .http
            .request(method, url)
            .header("AuthClientId", &self.client_id)
            .header("AuthSecret", &self.secret)
            .header("Accept", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                message: error_message(&text),
            });
        }

        debug!(%status, bytes = text.len(), "API request succeeded");
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait::async_trait]
impl CatalogSource for ApiClient {
    async fn fetch_images(&self, datacenter_id: &str) -> Result<Vec<Image>, ApiError> {
        let result = self.request(Method::GET, &catalog_path(datacenter_id), None).await?;
        images_from_response(result)
    }
}

pub fn catalog_path(datacenter_id: &str) -> String {
    let datacenter: String = url::form_urlencoded::byte_serialize(datacenter_id.as_bytes()).collect();
    format!("service/server?images=1&datacenter={datacenter}")
}

/// Decode the catalog reply. The reply must be a JSON array; entries that are
/// not `{id, os, code, name}` string records are skipped.
pub fn images_from_response(result: Value) -> Result<Vec<Image>, ApiError> {
    let Value::Array(entries) = result else {
        return Err(ApiError::UnexpectedResponse(format!(
            "expected a JSON array of images, got {result}"
        )));
    };

    let mut images = Vec::with_capacity(entries.len());
    for entry in &entries {
        match Image::from_value(entry) {
            Some(image) => images.push(image),
            None => warn!(%entry, "Skipping malformed catalog entry"),
        }
    }
    Ok(images)
}

/// Prefer the `message` field of a JSON error body, fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("error response from API ({status}): {message}")]
    Status { status: StatusCode, message: String },
    #[error("invalid request path '{path}': {source}")]
    Path {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
