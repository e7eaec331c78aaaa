mod client;
mod config;

pub use client::{ApiClient, ApiError, CatalogSource};
pub use config::{ConfigError, ProviderConfig};
