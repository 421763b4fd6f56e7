mod client;
mod error;
mod types;

pub use client::UserStoreClient;
pub use error::UserStoreError;
