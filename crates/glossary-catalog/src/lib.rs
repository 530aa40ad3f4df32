//! Azure Data Catalog glossary adapter.

pub mod auth;
pub mod client;

pub use auth::{provider_from_config, ClientCredentials, StaticToken, TokenProvider};
pub use client::CatalogClient;
