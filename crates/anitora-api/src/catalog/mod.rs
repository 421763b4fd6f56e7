mod client;
mod error;
mod types;

pub use client::CatalogClient;
pub use error::CatalogError;
