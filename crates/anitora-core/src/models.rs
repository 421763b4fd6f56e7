use serde::{Deserialize, Serialize};

/// User-facing watch-progress label for a watchlist entry.
///
/// An entry kept only because it is a favourite carries no category at all;
/// that state is `None` at the model level and an empty string in the
/// database and the remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchCategory {
    Watching,
    Completed,
    Dropped,
    Pending,
}

impl WatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watching => "Watching",
            Self::Completed => "Completed",
            Self::Dropped => "Dropped",
            Self::Pending => "Pending",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Watching" => Some(Self::Watching),
            "Completed" => Some(Self::Completed),
            "Dropped" => Some(Self::Dropped),
            "Pending" => Some(Self::Pending),
            _ => None,
        }
    }

    /// Database/wire encoding for an optional category. `None` is the empty
    /// string, matching what the remote mirror stores.
    pub fn encode(category: Option<WatchCategory>) -> &'static str {
        category.map(|c| c.as_str()).unwrap_or("")
    }

    /// Inverse of [`WatchCategory::encode`]. Unknown labels decode to `None`.
    pub fn decode(s: &str) -> Option<WatchCategory> {
        Self::from_str(s)
    }

    pub const ALL: &[WatchCategory] = &[
        Self::Watching,
        Self::Completed,
        Self::Dropped,
        Self::Pending,
    ];
}

impl std::fmt::Display for WatchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's record for one catalog item: its watch category, favourite flag,
/// and a denormalized copy of the catalog fields needed for display.
///
/// A row exists if and only if the item is categorized or favourited (or
/// both); the two axes are independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    /// Stable external catalog identifier.
    pub id: i64,
    pub title: String,
    pub image_url: Option<String>,
    pub category: Option<WatchCategory>,
    pub score: f32,
    pub episode_count: u32,
    /// Airing status as reported by the catalog.
    pub status: Option<String>,
    pub is_favourite: bool,
}

impl WatchlistEntry {
    /// An entry with neither a category nor the favourite flag has no reason
    /// to be persisted.
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && !self.is_favourite
    }
}
