use std::path::Path;

use futures::Stream;
use tokio::sync::{mpsc, oneshot, watch};

use anitora_core::error::AnitoraError;
use anitora_core::models::{WatchCategory, WatchlistEntry};
use anitora_core::storage::Storage;

/// Handle to the watchlist database actor.
///
/// The actor owns the SQLite connection on a dedicated thread; every write
/// that commits bumps a generation counter, which drives the reactive
/// category/favourite subscriptions. A bulk replace bumps the counter exactly
/// once, after its transaction commits, so subscribers never observe the
/// intermediate empty table.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
    changes: watch::Receiver<u64>,
}

enum DbCommand {
    GetEntry {
        id: i64,
        reply: oneshot::Sender<Result<Option<WatchlistEntry>, AnitoraError>>,
    },
    EntriesByCategory {
        category: WatchCategory,
        reply: oneshot::Sender<Result<Vec<WatchlistEntry>, AnitoraError>>,
    },
    FavouriteEntries {
        reply: oneshot::Sender<Result<Vec<WatchlistEntry>, AnitoraError>>,
    },
    AllEntries {
        reply: oneshot::Sender<Result<Vec<WatchlistEntry>, AnitoraError>>,
    },
    UpsertEntry {
        entry: Box<WatchlistEntry>,
        reply: oneshot::Sender<Result<(), AnitoraError>>,
    },
    DeleteEntry {
        id: i64,
        reply: oneshot::Sender<Result<(), AnitoraError>>,
    },
    DeleteAll {
        reply: oneshot::Sender<Result<(), AnitoraError>>,
    },
    ReplaceAll {
        entries: Vec<WatchlistEntry>,
        reply: oneshot::Sender<Result<(), AnitoraError>>,
    },
}

impl DbHandle {
    pub fn open(path: &Path) -> Option<Self> {
        let storage = Storage::open(path)
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Some(Self::spawn(storage))
    }

    /// In-memory database (for tests).
    pub fn open_memory() -> Option<Self> {
        let storage = Storage::open_memory()
            .map_err(|e| tracing::error!("Failed to open in-memory database: {e}"))
            .ok()?;
        Some(Self::spawn(storage))
    }

    fn spawn(storage: Storage) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (changes_tx, changes) = watch::channel(0u64);

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx, changes_tx))
            .expect("failed to spawn DB thread");

        Self { tx, changes }
    }

    pub async fn get_entry(&self, id: i64) -> Result<Option<WatchlistEntry>, AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::GetEntry { id, reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn entries_by_category(
        &self,
        category: WatchCategory,
    ) -> Result<Vec<WatchlistEntry>, AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(DbCommand::EntriesByCategory { category, reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn favourite_entries(&self) -> Result<Vec<WatchlistEntry>, AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::FavouriteEntries { reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn all_entries(&self) -> Result<Vec<WatchlistEntry>, AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::AllEntries { reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn upsert_entry(&self, entry: WatchlistEntry) -> Result<(), AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::UpsertEntry {
            entry: Box::new(entry),
            reply,
        });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn delete_entry(&self, id: i64) -> Result<(), AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::DeleteEntry { id, reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn delete_all(&self) -> Result<(), AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::DeleteAll { reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    pub async fn replace_all(&self, entries: Vec<WatchlistEntry>) -> Result<(), AnitoraError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::ReplaceAll { entries, reply });
        rx.await
            .unwrap_or_else(|_| Err(AnitoraError::Config("DB actor closed".into())))
    }

    /// Live view of one watch category: yields the current rows immediately,
    /// then again after every committed write. Dropping the stream ends the
    /// subscription.
    pub fn watch_category(
        &self,
        category: WatchCategory,
    ) -> impl Stream<Item = Vec<WatchlistEntry>> + Send + 'static {
        let db = self.clone();
        let mut rx = self.changes.clone();
        rx.mark_changed();
        futures::stream::unfold((db, rx), move |(db, mut rx)| async move {
            rx.changed().await.ok()?;
            let rows = db.entries_by_category(category).await.ok()?;
            Some((rows, (db, rx)))
        })
    }

    /// Live view of all favourited entries, same contract as
    /// [`DbHandle::watch_category`].
    pub fn watch_favourites(&self) -> impl Stream<Item = Vec<WatchlistEntry>> + Send + 'static {
        let db = self.clone();
        let mut rx = self.changes.clone();
        rx.mark_changed();
        futures::stream::unfold((db, rx), move |(db, mut rx)| async move {
            rx.changed().await.ok()?;
            let rows = db.favourite_entries().await.ok()?;
            Some((rows, (db, rx)))
        })
    }
}

fn actor_loop(
    mut storage: Storage,
    mut rx: mpsc::UnboundedReceiver<DbCommand>,
    changes: watch::Sender<u64>,
) {
    let bump = |changes: &watch::Sender<u64>| {
        changes.send_modify(|generation| *generation = generation.wrapping_add(1));
    };

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::GetEntry { id, reply } => {
                let _ = reply.send(storage.get_entry(id));
            }
            DbCommand::EntriesByCategory { category, reply } => {
                let _ = reply.send(storage.entries_by_category(category));
            }
            DbCommand::FavouriteEntries { reply } => {
                let _ = reply.send(storage.favourite_entries());
            }
            DbCommand::AllEntries { reply } => {
                let _ = reply.send(storage.all_entries());
            }
            DbCommand::UpsertEntry { entry, reply } => {
                let result = storage.upsert_entry(&entry);
                if result.is_ok() {
                    bump(&changes);
                }
                let _ = reply.send(result);
            }
            DbCommand::DeleteEntry { id, reply } => {
                let result = storage.delete_entry(id);
                if result.is_ok() {
                    bump(&changes);
                }
                let _ = reply.send(result);
            }
            DbCommand::DeleteAll { reply } => {
                let result = storage.delete_all();
                if result.is_ok() {
                    bump(&changes);
                }
                let _ = reply.send(result);
            }
            DbCommand::ReplaceAll { entries, reply } => {
                let result = storage.replace_all(&entries);
                // One bump for the whole replace: subscribers re-read only
                // after the transaction commits.
                if result.is_ok() {
                    bump(&changes);
                }
                let _ = reply.send(result);
            }
        }
    }
}
