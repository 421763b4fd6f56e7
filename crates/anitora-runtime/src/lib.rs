//! The watchlist repository: the single component the rest of the app reads
//! from and writes through.
//!
//! Writes are local-first: the SQLite store is the operation of record, and
//! every remote mirror write is a detached best-effort task that can never
//! fail the command that triggered it. The one exception is the explicit
//! cloud sync, where the user is deliberately replacing local truth with the
//! remote copy, so remote failures surface as errors.

mod db;

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::Stream;

use anitora_api::traits::{
    AuthProvider, CatalogItem, CatalogService, DocumentPatch, RankingKind, RemoteUserStore,
    UserDocument, Value,
};
use anitora_core::config::SyncConfig;
use anitora_core::error::AnitoraError;
use anitora_core::models::{WatchCategory, WatchlistEntry};

pub use db::DbHandle;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("database error: {0}")]
    Database(String),
    #[error("sync error: {0}")]
    Sync(String),
}

fn db_err(e: AnitoraError) -> RuntimeError {
    RuntimeError::Database(e.to_string())
}

/// Local-first watchlist/favourites repository with best-effort cloud
/// mirroring.
pub struct WatchlistRepository<C, R> {
    db: DbHandle,
    catalog: Arc<C>,
    remote: Arc<R>,
    auth: Arc<dyn AuthProvider>,
    mirror_timeout: Duration,
    cloud_timeout: Duration,
}

impl<C, R> WatchlistRepository<C, R>
where
    C: CatalogService + 'static,
    R: RemoteUserStore + 'static,
{
    pub fn new(
        db: DbHandle,
        catalog: Arc<C>,
        remote: Arc<R>,
        auth: Arc<dyn AuthProvider>,
        sync: &SyncConfig,
    ) -> Self {
        Self {
            db,
            catalog,
            remote,
            auth,
            mirror_timeout: Duration::from_secs(sync.mirror_timeout_secs),
            cloud_timeout: Duration::from_secs(sync.cloud_timeout_secs),
        }
    }

    // ── Reactive reads ──────────────────────────────────────────

    /// Live view of one watch category. Never touches the network.
    pub fn watch_category(
        &self,
        category: WatchCategory,
    ) -> impl Stream<Item = Vec<WatchlistEntry>> + Send + 'static {
        self.db.watch_category(category)
    }

    /// Live view of all favourited entries.
    pub fn watch_favourites(&self) -> impl Stream<Item = Vec<WatchlistEntry>> + Send + 'static {
        self.db.watch_favourites()
    }

    /// The category an item is filed under; `None` for favourite-only rows
    /// and for items not in the watchlist at all.
    pub async fn category_of(&self, id: i64) -> Result<Option<WatchCategory>, RuntimeError> {
        Ok(self
            .db
            .get_entry(id)
            .await
            .map_err(db_err)?
            .and_then(|e| e.category))
    }

    pub async fn is_favourite(&self, id: i64) -> Result<bool, RuntimeError> {
        Ok(self
            .db
            .get_entry(id)
            .await
            .map_err(db_err)?
            .map(|e| e.is_favourite)
            .unwrap_or(false))
    }

    // ── Watchlist commands ──────────────────────────────────────

    /// File a catalog item under a watch category.
    ///
    /// Refreshes the denormalized catalog fields on the existing row but
    /// never touches its favourite flag. The local write completes before
    /// this returns; the remote mirror is detached.
    pub async fn add_to_category(
        &self,
        item: &CatalogItem,
        category: WatchCategory,
    ) -> Result<(), RuntimeError> {
        let existing = self.db.get_entry(item.id).await.map_err(db_err)?;
        let entry = match existing {
            Some(existing) => WatchlistEntry {
                id: existing.id,
                title: item.title.clone(),
                image_url: item.image_url.clone().or(existing.image_url),
                category: Some(category),
                score: item.score.unwrap_or(existing.score),
                episode_count: item.episode_count.unwrap_or(existing.episode_count),
                status: item.status.clone().or(existing.status),
                is_favourite: existing.is_favourite,
            },
            None => entry_from_item(item, Some(category), false),
        };

        self.db.upsert_entry(entry.clone()).await.map_err(db_err)?;

        if let Some(user_id) = self.auth.current_user_id() {
            let remote = Arc::clone(&self.remote);
            let id = entry.id;
            // The favourite flag is deliberately absent: merge semantics
            // leave it as the remote document has it.
            let patch = DocumentPatch::new()
                .set("id", Value::Integer(entry.id))
                .set("title", Value::String(entry.title))
                .set("image", opt_string(entry.image_url))
                .set(
                    "category",
                    Value::String(WatchCategory::encode(entry.category).to_owned()),
                )
                .set("score", Value::Double(entry.score as f64))
                .set("episodes", Value::Integer(entry.episode_count as i64))
                .set("status", opt_string(entry.status));
            self.spawn_mirror("add_to_category", async move {
                remote.upsert_fields(&user_id, id, patch).await
            });
        }
        Ok(())
    }

    /// Take an item out of its watch category.
    ///
    /// A favourited item keeps its row (with no category) so the favourite
    /// survives; anything else is deleted outright.
    pub async fn remove_from_category(&self, id: i64) -> Result<(), RuntimeError> {
        let Some(existing) = self.db.get_entry(id).await.map_err(db_err)? else {
            return Ok(());
        };

        if existing.is_favourite {
            let mut entry = existing;
            entry.category = None;
            self.db.upsert_entry(entry).await.map_err(db_err)?;

            if let Some(user_id) = self.auth.current_user_id() {
                let remote = Arc::clone(&self.remote);
                self.spawn_mirror("remove_from_category", async move {
                    remote
                        .update_field(&user_id, id, "category", Value::String(String::new()))
                        .await
                });
            }
        } else {
            self.db.delete_entry(id).await.map_err(db_err)?;

            if let Some(user_id) = self.auth.current_user_id() {
                let remote = Arc::clone(&self.remote);
                self.spawn_mirror("remove_from_category", async move {
                    remote.delete_document(&user_id, id).await
                });
            }
        }
        Ok(())
    }

    /// Flip an item's favourite flag, leaving its category alone.
    ///
    /// A fresh item gets a favourite-only row; unfavouriting a row that has
    /// no category removes it entirely.
    pub async fn toggle_favourite(&self, item: &CatalogItem) -> Result<(), RuntimeError> {
        let existing = self.db.get_entry(item.id).await.map_err(db_err)?;
        let entry = match existing {
            Some(mut e) => {
                e.is_favourite = !e.is_favourite;
                e
            }
            None => entry_from_item(item, None, true),
        };
        let id = entry.id;

        if entry.is_empty() {
            self.db.delete_entry(id).await.map_err(db_err)?;

            if let Some(user_id) = self.auth.current_user_id() {
                let remote = Arc::clone(&self.remote);
                self.spawn_mirror("toggle_favourite", async move {
                    remote.delete_document(&user_id, id).await
                });
            }
            return Ok(());
        }

        let is_favourite = entry.is_favourite;
        self.db.upsert_entry(entry.clone()).await.map_err(db_err)?;

        if let Some(user_id) = self.auth.current_user_id() {
            let remote = Arc::clone(&self.remote);
            let patch = DocumentPatch::new()
                .set("id", Value::Integer(id))
                .set("title", Value::String(entry.title))
                .set("image", opt_string(entry.image_url))
                .set("is_favourite", Value::Bool(is_favourite))
                .set(
                    "last_updated",
                    Value::Integer(chrono::Utc::now().timestamp_millis()),
                );
            self.spawn_mirror("toggle_favourite", async move {
                remote.upsert_fields(&user_id, id, patch).await
            });
        }
        Ok(())
    }

    // ── Cloud sync ──────────────────────────────────────────────

    /// Replace the entire local watchlist with the signed-in user's remote
    /// documents. Returns the number of entries installed.
    ///
    /// Unlike the background mirrors this propagates remote failures: the
    /// user explicitly asked for remote truth, so they get told when it
    /// cannot be fetched. Malformed documents are skipped individually, and
    /// an empty remote collection means "nothing to sync", leaving local
    /// state untouched.
    pub async fn sync_from_cloud(&self) -> Result<usize, RuntimeError> {
        let Some(user_id) = self.auth.current_user_id() else {
            tracing::debug!("cloud sync requested while signed out; skipping");
            return Ok(0);
        };

        let documents = tokio::time::timeout(
            self.cloud_timeout,
            self.remote.fetch_all_documents(&user_id),
        )
        .await
        .map_err(|_| RuntimeError::Sync("cloud fetch timed out".into()))?
        .map_err(|e| RuntimeError::Sync(e.to_string()))?;

        let mut entries = Vec::with_capacity(documents.len());
        for doc in &documents {
            match decode_document(doc) {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(name = %doc.name, "skipping malformed watchlist document"),
            }
        }

        if entries.is_empty() {
            return Ok(0);
        }

        let count = entries.len();
        self.db.replace_all(entries).await.map_err(db_err)?;
        tracing::info!(count, "watchlist replaced from cloud");
        Ok(count)
    }

    /// Drop every local entry (logout). The remote store is left untouched.
    pub async fn clear_local(&self) -> Result<(), RuntimeError> {
        self.db.delete_all().await.map_err(db_err)
    }

    // ── Catalog pass-throughs ───────────────────────────────────
    //
    // Plain reads against the catalog service. Failures degrade to an empty
    // result; the screens show a retry affordance instead of an error state.

    pub async fn top_rated(&self, limit: u32) -> Vec<CatalogItem> {
        self.ranking(RankingKind::All, limit).await
    }

    pub async fn popular(&self, limit: u32) -> Vec<CatalogItem> {
        self.ranking(RankingKind::ByPopularity, limit).await
    }

    pub async fn upcoming(&self, limit: u32) -> Vec<CatalogItem> {
        self.ranking(RankingKind::Upcoming, limit).await
    }

    pub async fn top_favourites(&self, limit: u32) -> Vec<CatalogItem> {
        self.ranking(RankingKind::Favourite, limit).await
    }

    async fn ranking(&self, kind: RankingKind, limit: u32) -> Vec<CatalogItem> {
        match self.catalog.ranking(kind, limit).await {
            Ok(items) => items,
            Err(e) => {
                tracing::debug!(%kind, error = %e, "catalog ranking unavailable");
                Vec::new()
            }
        }
    }

    pub async fn search(&self, query: &str) -> Vec<CatalogItem> {
        match self.catalog.search(query).await {
            Ok(items) => items,
            Err(e) => {
                tracing::debug!(error = %e, "catalog search unavailable");
                Vec::new()
            }
        }
    }

    pub async fn details(&self, id: i64) -> Option<CatalogItem> {
        match self.catalog.details(id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!(id, error = %e, "catalog details unavailable");
                None
            }
        }
    }

    // ── Mirror plumbing ─────────────────────────────────────────

    /// Run a remote mirror write detached from the caller: bounded by the
    /// mirror timeout, failures logged and discarded. The local write it
    /// mirrors has already committed.
    fn spawn_mirror<F, E>(&self, op: &'static str, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let timeout = self.mirror_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(op, error = %e, "remote mirror write failed"),
                Err(_) => {
                    tracing::warn!(op, timeout_secs = timeout.as_secs(), "remote mirror write timed out")
                }
            }
        });
    }
}

fn entry_from_item(
    item: &CatalogItem,
    category: Option<WatchCategory>,
    is_favourite: bool,
) -> WatchlistEntry {
    WatchlistEntry {
        id: item.id,
        title: item.title.clone(),
        image_url: item.image_url.clone(),
        category,
        score: item.score.unwrap_or(0.0),
        episode_count: item.episode_count.unwrap_or(0),
        status: item.status.clone(),
        is_favourite,
    }
}

fn opt_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

/// Decode one remote document into a watchlist entry.
///
/// The id falls back to the document name's trailing path segment; the title
/// is required. A document claiming neither a category nor the favourite
/// flag is dropped, since the local store never keeps such a row.
fn decode_document(doc: &UserDocument) -> Option<WatchlistEntry> {
    let id = doc.get_i64("id").or_else(|| doc.id_from_name())?;
    let title = doc.get_str("title")?.to_owned();

    let entry = WatchlistEntry {
        id,
        title,
        image_url: doc.get_str("image").map(str::to_owned),
        category: WatchCategory::decode(doc.get_str("category").unwrap_or("")),
        score: doc.get_f64("score").unwrap_or(0.0) as f32,
        episode_count: doc.get_i64("episodes").unwrap_or(0).max(0) as u32,
        status: doc.get_str("status").map(str::to_owned),
        is_favourite: doc.get_bool("is_favourite").unwrap_or(false),
    };

    if entry.is_empty() {
        return None;
    }
    Some(entry)
}

// ── Session auth ────────────────────────────────────────────────

/// Process-wide holder for the signed-in user id.
#[derive(Default)]
pub struct SessionAuth {
    user: RwLock<Option<String>>,
}

impl SessionAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(user_id.into())),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        if let Ok(mut guard) = self.user.write() {
            *guard = Some(user_id.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.user.write() {
            *guard = None;
        }
    }
}

impl AuthProvider for SessionAuth {
    fn current_user_id(&self) -> Option<String> {
        self.user.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use futures::StreamExt;

    #[derive(Debug, thiserror::Error)]
    #[error("mock service failure")]
    struct MockError;

    struct MockCatalog;

    impl CatalogService for MockCatalog {
        type Error = MockError;

        async fn ranking(&self, _kind: RankingKind, _limit: u32) -> Result<Vec<CatalogItem>, MockError> {
            Err(MockError)
        }

        async fn search(&self, _query: &str) -> Result<Vec<CatalogItem>, MockError> {
            Err(MockError)
        }

        async fn details(&self, _id: i64) -> Result<Option<CatalogItem>, MockError> {
            Err(MockError)
        }
    }

    #[derive(Default)]
    struct MockRemote {
        fail: bool,
        documents: Vec<UserDocument>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRemote {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn with_documents(documents: Vec<UserDocument>) -> Self {
            Self {
                documents,
                ..Default::default()
            }
        }
    }

    impl RemoteUserStore for MockRemote {
        type Error = MockError;

        async fn upsert_fields(
            &self,
            _user_id: &str,
            item_id: i64,
            _patch: DocumentPatch,
        ) -> Result<(), MockError> {
            self.calls.lock().unwrap().push(format!("upsert:{item_id}"));
            if self.fail {
                return Err(MockError);
            }
            Ok(())
        }

        async fn update_field(
            &self,
            _user_id: &str,
            item_id: i64,
            field: &str,
            _value: Value,
        ) -> Result<(), MockError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update:{item_id}:{field}"));
            if self.fail {
                return Err(MockError);
            }
            Ok(())
        }

        async fn delete_document(&self, _user_id: &str, item_id: i64) -> Result<(), MockError> {
            self.calls.lock().unwrap().push(format!("delete:{item_id}"));
            if self.fail {
                return Err(MockError);
            }
            Ok(())
        }

        async fn fetch_all_documents(&self, _user_id: &str) -> Result<Vec<UserDocument>, MockError> {
            if self.fail {
                return Err(MockError);
            }
            Ok(self.documents.clone())
        }
    }

    type TestRepo = WatchlistRepository<MockCatalog, MockRemote>;

    fn repo_with(remote: Arc<MockRemote>, auth: Arc<dyn AuthProvider>) -> TestRepo {
        let db = DbHandle::open_memory().expect("in-memory db");
        WatchlistRepository::new(
            db,
            Arc::new(MockCatalog),
            remote,
            auth,
            &SyncConfig {
                mirror_timeout_secs: 1,
                cloud_timeout_secs: 1,
            },
        )
    }

    fn repo() -> TestRepo {
        repo_with(
            Arc::new(MockRemote::default()),
            Arc::new(SessionAuth::signed_in("user-1")),
        )
    }

    fn item(id: i64, title: &str) -> CatalogItem {
        CatalogItem {
            id,
            title: title.into(),
            image_url: Some(format!("https://cdn.example/{id}.jpg")),
            synopsis: None,
            score: Some(8.2),
            episode_count: Some(24),
            status: Some("currently_airing".into()),
            rank: None,
            popularity: None,
        }
    }

    fn remote_doc(id: i64, title: &str, category: &str, is_favourite: bool) -> UserDocument {
        let mut fields = BTreeMap::new();
        fields.insert("id".into(), Value::Integer(id));
        fields.insert("title".into(), Value::String(title.into()));
        fields.insert("category".into(), Value::String(category.into()));
        fields.insert("is_favourite".into(), Value::Bool(is_favourite));
        fields.insert("score".into(), Value::Double(7.5));
        fields.insert("episodes".into(), Value::Integer(12));
        UserDocument {
            name: format!(
                "projects/p/databases/(default)/documents/users/user-1/watchlist/{id}"
            ),
            fields,
        }
    }

    #[tokio::test]
    async fn test_add_then_lookup() {
        let repo = repo();
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();

        assert_eq!(
            repo.category_of(1).await.unwrap(),
            Some(WatchCategory::Watching)
        );
        let mut watching = Box::pin(repo.watch_category(WatchCategory::Watching));
        let rows = watching.next().await.unwrap();
        assert!(rows.iter().any(|e| e.id == 1));
    }

    #[tokio::test]
    async fn test_toggle_favourite_on_fresh_id() {
        let repo = repo();
        repo.toggle_favourite(&item(1, "X")).await.unwrap();

        assert!(repo.is_favourite(1).await.unwrap());
        assert_eq!(repo.category_of(1).await.unwrap(), None);
        let mut favourites = Box::pin(repo.watch_favourites());
        let rows = favourites.next().await.unwrap();
        assert!(rows.iter().any(|e| e.id == 1));
    }

    #[tokio::test]
    async fn test_pending_then_favourite_then_remove() {
        let repo = repo();
        repo.add_to_category(&item(2, "Y"), WatchCategory::Pending)
            .await
            .unwrap();
        repo.toggle_favourite(&item(2, "Y")).await.unwrap();
        repo.remove_from_category(2).await.unwrap();

        assert_eq!(repo.category_of(2).await.unwrap(), None);
        assert!(repo.is_favourite(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_category_and_favourite_are_orthogonal() {
        let repo = repo();
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();

        repo.toggle_favourite(&item(1, "X")).await.unwrap();
        assert_eq!(
            repo.category_of(1).await.unwrap(),
            Some(WatchCategory::Watching)
        );

        repo.add_to_category(&item(1, "X"), WatchCategory::Completed)
            .await
            .unwrap();
        assert!(repo.is_favourite(1).await.unwrap());
        assert_eq!(
            repo.category_of(1).await.unwrap(),
            Some(WatchCategory::Completed)
        );
    }

    #[tokio::test]
    async fn test_removal_deletes_non_favourites() {
        let repo = repo();
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();
        repo.remove_from_category(1).await.unwrap();

        assert_eq!(repo.category_of(1).await.unwrap(), None);
        assert!(!repo.is_favourite(1).await.unwrap());
        let mut watching = Box::pin(repo.watch_category(WatchCategory::Watching));
        assert!(watching.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removal_preserves_favourites() {
        let repo = repo();
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();
        repo.toggle_favourite(&item(1, "X")).await.unwrap();
        repo.remove_from_category(1).await.unwrap();

        assert_eq!(repo.category_of(1).await.unwrap(), None);
        assert!(repo.is_favourite(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfavouriting_uncategorized_row_deletes_it() {
        let repo = repo();
        repo.toggle_favourite(&item(1, "X")).await.unwrap();
        repo.toggle_favourite(&item(1, "X")).await.unwrap();

        // Neither categorized nor favourited: the row must not linger.
        assert!(!repo.is_favourite(1).await.unwrap());
        let mut favourites = Box::pin(repo.watch_favourites());
        assert!(favourites.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let repo = repo();
        repo.add_to_category(&item(1, "X"), WatchCategory::Completed)
            .await
            .unwrap();
        repo.add_to_category(&item(1, "X"), WatchCategory::Completed)
            .await
            .unwrap();

        let mut completed = Box::pin(repo.watch_category(WatchCategory::Completed));
        let rows = completed.next().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].score, 8.2);
    }

    #[tokio::test]
    async fn test_mirror_failures_never_surface() {
        let repo = repo_with(
            Arc::new(MockRemote::failing()),
            Arc::new(SessionAuth::signed_in("user-1")),
        );

        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();
        repo.toggle_favourite(&item(2, "Y")).await.unwrap();
        repo.remove_from_category(1).await.unwrap();

        assert_eq!(repo.category_of(1).await.unwrap(), None);
        assert!(repo.is_favourite(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_mirror_writes_reach_the_remote_store() {
        let remote = Arc::new(MockRemote::default());
        let repo = repo_with(
            Arc::clone(&remote),
            Arc::new(SessionAuth::signed_in("user-1")),
        );

        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();

        // The mirror runs detached; give it a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            remote.calls.lock().unwrap().as_slice(),
            ["upsert:1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_signed_out_mirrors_are_skipped() {
        let remote = Arc::new(MockRemote::default());
        let repo = repo_with(Arc::clone(&remote), Arc::new(SessionAuth::new()));

        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();
        repo.toggle_favourite(&item(1, "X")).await.unwrap();
        repo.remove_from_category(1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(remote.calls.lock().unwrap().is_empty());
        // Local behaviour is unchanged by being signed out.
        assert!(repo.is_favourite(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_replaces_local_state() {
        let remote = Arc::new(MockRemote::with_documents(vec![
            remote_doc(10, "A", "Watching", false),
            remote_doc(11, "B", "", true),
        ]));
        let repo = repo_with(
            Arc::clone(&remote),
            Arc::new(SessionAuth::signed_in("user-1")),
        );
        repo.add_to_category(&item(1, "Old"), WatchCategory::Watching)
            .await
            .unwrap();

        let count = repo.sync_from_cloud().await.unwrap();
        assert_eq!(count, 2);

        assert_eq!(repo.category_of(1).await.unwrap(), None);
        assert_eq!(
            repo.category_of(10).await.unwrap(),
            Some(WatchCategory::Watching)
        );
        assert!(repo.is_favourite(11).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_is_atomic_for_subscribers() {
        let remote = Arc::new(MockRemote::with_documents(vec![remote_doc(
            10, "A", "Watching", false,
        )]));
        let repo = repo_with(
            Arc::clone(&remote),
            Arc::new(SessionAuth::signed_in("user-1")),
        );
        repo.add_to_category(&item(1, "Old"), WatchCategory::Watching)
            .await
            .unwrap();

        let mut watching = Box::pin(repo.watch_category(WatchCategory::Watching));
        assert_eq!(watching.next().await.unwrap().len(), 1);

        repo.sync_from_cloud().await.unwrap();

        // The next snapshot is already the post-sync set; the delete phase
        // of the replace is never visible.
        let rows = watching.next().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 10);
    }

    #[tokio::test]
    async fn test_sync_fetch_failure_propagates_and_preserves_local() {
        let repo = repo_with(
            Arc::new(MockRemote::failing()),
            Arc::new(SessionAuth::signed_in("user-1")),
        );
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();

        assert!(matches!(
            repo.sync_from_cloud().await,
            Err(RuntimeError::Sync(_))
        ));
        assert_eq!(
            repo.category_of(1).await.unwrap(),
            Some(WatchCategory::Watching)
        );
    }

    #[tokio::test]
    async fn test_sync_skips_malformed_documents() {
        // No title, and no usable state at all: both skipped.
        let mut no_title = remote_doc(20, "ignored", "Watching", false);
        no_title.fields.remove("title");
        let dangling = remote_doc(21, "C", "", false);

        let remote = Arc::new(MockRemote::with_documents(vec![
            no_title,
            dangling,
            remote_doc(22, "D", "Completed", false),
        ]));
        let repo = repo_with(
            Arc::clone(&remote),
            Arc::new(SessionAuth::signed_in("user-1")),
        );

        let count = repo.sync_from_cloud().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            repo.category_of(22).await.unwrap(),
            Some(WatchCategory::Completed)
        );
    }

    #[tokio::test]
    async fn test_empty_remote_is_nothing_to_sync() {
        let repo = repo();
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();

        let count = repo.sync_from_cloud().await.unwrap();
        assert_eq!(count, 0);
        // Local state untouched.
        assert_eq!(
            repo.category_of(1).await.unwrap(),
            Some(WatchCategory::Watching)
        );
    }

    #[tokio::test]
    async fn test_signed_out_sync_is_a_noop() {
        let repo = repo_with(
            Arc::new(MockRemote::with_documents(vec![remote_doc(
                10, "A", "Watching", false,
            )])),
            Arc::new(SessionAuth::new()),
        );

        assert_eq!(repo.sync_from_cloud().await.unwrap(), 0);
        assert_eq!(repo.category_of(10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_local_keeps_remote() {
        let remote = Arc::new(MockRemote::default());
        let repo = repo_with(
            Arc::clone(&remote),
            Arc::new(SessionAuth::signed_in("user-1")),
        );
        repo.add_to_category(&item(1, "X"), WatchCategory::Watching)
            .await
            .unwrap();

        repo.clear_local().await.unwrap();

        assert_eq!(repo.category_of(1).await.unwrap(), None);
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Only the add mirrored; clearing never deletes remote documents.
        assert_eq!(
            remote.calls.lock().unwrap().as_slice(),
            ["upsert:1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_catalog_failures_degrade_to_empty() {
        let repo = repo();
        assert!(repo.top_rated(10).await.is_empty());
        assert!(repo.popular(10).await.is_empty());
        assert!(repo.search("frieren").await.is_empty());
        assert!(repo.details(1).await.is_none());
    }

    #[test]
    fn test_decode_document_falls_back_to_name_for_id() {
        let mut doc = remote_doc(7, "X", "Watching", false);
        doc.fields.remove("id");
        let entry = decode_document(&doc).unwrap();
        assert_eq!(entry.id, 7);
    }

    #[test]
    fn test_session_auth_lifecycle() {
        let auth = SessionAuth::new();
        assert_eq!(auth.current_user_id(), None);
        auth.sign_in("user-9");
        assert_eq!(auth.current_user_id().as_deref(), Some("user-9"));
        auth.sign_out();
        assert_eq!(auth.current_user_id(), None);
    }
}
