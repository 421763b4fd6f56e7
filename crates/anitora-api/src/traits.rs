//! Trait definitions for the remote services the watchlist core composes.
//!
//! The repository layer is written against these traits, so the concrete
//! catalog and user-store clients (and the mocks used in tests) stay
//! interchangeable.

use std::collections::BTreeMap;
use std::future::Future;

/// Read-only catalog of anime metadata, rankings, and search.
pub trait CatalogService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a ranked list of catalog items.
    fn ranking(
        &self,
        kind: RankingKind,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<CatalogItem>, Self::Error>> + Send;

    /// Search the catalog by title.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<CatalogItem>, Self::Error>> + Send;

    /// Fetch full details for one item. `None` if the catalog has no such id.
    fn details(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<CatalogItem>, Self::Error>> + Send;
}

/// Per-user remote document collection mirroring watchlist state.
///
/// Documents are keyed by catalog item id under the given user's collection.
/// The store is never the primary read path; it only exists for cross-device
/// sync.
pub trait RemoteUserStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write the fields in `patch`, leaving unspecified fields untouched.
    fn upsert_fields(
        &self,
        user_id: &str,
        item_id: i64,
        patch: DocumentPatch,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Overwrite a single field of an existing document.
    fn update_field(
        &self,
        user_id: &str,
        item_id: i64,
        field: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete one document. Deleting an absent document is not an error.
    fn delete_document(
        &self,
        user_id: &str,
        item_id: i64,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Fetch the user's entire document collection.
    fn fetch_all_documents(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<UserDocument>, Self::Error>> + Send;
}

/// Source of the currently signed-in user's id.
///
/// `None` means logged out: every remote mirror operation becomes a silent
/// no-op rather than an error.
pub trait AuthProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// A catalog item as returned by search, ranking, or detail calls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub title: String,
    pub image_url: Option<String>,
    pub synopsis: Option<String>,
    pub score: Option<f32>,
    pub episode_count: Option<u32>,
    pub status: Option<String>,
    pub rank: Option<u32>,
    pub popularity: Option<u32>,
}

/// Catalog ranking variants surfaced on the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingKind {
    All,
    ByPopularity,
    Upcoming,
    Favourite,
}

impl RankingKind {
    /// Query-string value understood by the catalog service.
    pub fn as_query_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ByPopularity => "bypopularity",
            Self::Upcoming => "upcoming",
            Self::Favourite => "favorite",
        }
    }

    pub const ALL: &[RankingKind] = &[
        Self::All,
        Self::ByPopularity,
        Self::Upcoming,
        Self::Favourite,
    ];
}

impl std::fmt::Display for RankingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query_str())
    }
}

/// A single document field value. Only the handful of kinds the watchlist
/// mirror actually writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Double(f64),
    Bool(bool),
    Null,
}

/// A partial document update: fields listed here are written, everything
/// else in the remote document is left untouched.
///
/// Distinct from a full-document replace on purpose, so a mirror write for
/// one axis (say, the favourite flag) can never clobber the other.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    fields: Vec<(String, Value)>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.push((field.into(), value));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A document fetched from the remote user store, decoded into
/// service-agnostic values. Fields the wire format could not represent are
/// simply absent.
#[derive(Debug, Clone)]
pub struct UserDocument {
    /// Full resource name; the last path segment is the item id.
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl UserDocument {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.fields.get(field)? {
            Value::Integer(v) => Some(*v),
            Value::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.fields.get(field)? {
            Value::Double(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.fields.get(field)? {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Item id parsed from the trailing path segment of the resource name.
    pub fn id_from_name(&self) -> Option<i64> {
        self.name.rsplit('/').next()?.parse().ok()
    }
}
