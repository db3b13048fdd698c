//! Elasticsearch-compatible [`termsync::IndexBackend`] over HTTP.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::ElasticClient;
pub use config::ElasticConfig;
pub use error::ElasticError;
