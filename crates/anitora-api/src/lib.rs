pub mod catalog;
pub mod traits;
pub mod userstore;
