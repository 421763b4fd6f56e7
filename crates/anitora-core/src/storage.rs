use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AnitoraError;
use crate::models::{WatchCategory, WatchlistEntry};

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");

const ENTRY_COLUMNS: &str =
    "id, title, image_url, category, score, episode_count, status, is_favourite";

/// SQLite-backed local watchlist store.
///
/// This is the authoritative store for the running session; the remote
/// per-user mirror is only a best-effort projection of it.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, AnitoraError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, AnitoraError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a watchlist entry, replacing any existing row with the same id.
    pub fn upsert_entry(&self, entry: &WatchlistEntry) -> Result<(), AnitoraError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO watchlist
             (id, title, image_url, category, score, episode_count, status, is_favourite)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            entry_params(entry),
        )?;
        Ok(())
    }

    /// Point lookup by catalog id. Immediately consistent with prior writes.
    pub fn get_entry(&self, id: i64) -> Result<Option<WatchlistEntry>, AnitoraError> {
        self.conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM watchlist WHERE id = ?1"),
                params![id],
                |row| Ok(row_to_entry(row)),
            )
            .optional()
            .map_err(Into::into)
    }

    /// All entries in the given watch category.
    pub fn entries_by_category(
        &self,
        category: WatchCategory,
    ) -> Result<Vec<WatchlistEntry>, AnitoraError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM watchlist WHERE category = ?1 ORDER BY title"
        ))?;
        let rows = stmt
            .query_map(params![category.as_str()], |row| Ok(row_to_entry(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// All favourited entries, regardless of category.
    pub fn favourite_entries(&self) -> Result<Vec<WatchlistEntry>, AnitoraError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM watchlist WHERE is_favourite = 1 ORDER BY title"
        ))?;
        let rows = stmt
            .query_map([], |row| Ok(row_to_entry(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Every entry in the store.
    pub fn all_entries(&self) -> Result<Vec<WatchlistEntry>, AnitoraError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM watchlist ORDER BY title"))?;
        let rows = stmt
            .query_map([], |row| Ok(row_to_entry(row)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Delete the entry with the given id. No-op if absent.
    pub fn delete_entry(&self, id: i64) -> Result<(), AnitoraError> {
        self.conn
            .execute("DELETE FROM watchlist WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Delete every entry (logout path).
    pub fn delete_all(&self) -> Result<(), AnitoraError> {
        self.conn.execute("DELETE FROM watchlist", [])?;
        Ok(())
    }

    /// Replace the whole table with the given entries in one transaction, so
    /// a concurrent reader never observes the intermediate empty state.
    pub fn replace_all(&mut self, entries: &[WatchlistEntry]) -> Result<(), AnitoraError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM watchlist", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO watchlist
                 (id, title, image_url, category, score, episode_count, status, is_favourite)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for entry in entries {
                stmt.execute(entry_params(entry))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn entry_params(entry: &WatchlistEntry) -> impl rusqlite::Params + '_ {
    (
        entry.id,
        &entry.title,
        &entry.image_url,
        WatchCategory::encode(entry.category),
        entry.score,
        entry.episode_count,
        &entry.status,
        entry.is_favourite as i32,
    )
}

// ── Migrations ──────────────────────────────────────────────────

/// Run schema migrations using `PRAGMA user_version` for version tracking.
fn run_migrations(conn: &Connection) -> Result<(), AnitoraError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        tracing::debug!("applying schema migration v1");
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

// ── Row mapping ─────────────────────────────────────────────────

fn row_to_entry(row: &rusqlite::Row<'_>) -> WatchlistEntry {
    let category_str: String = row.get(3).unwrap_or_default();
    WatchlistEntry {
        id: row.get(0).unwrap_or(0),
        title: row.get(1).unwrap_or_default(),
        image_url: row.get(2).unwrap_or(None),
        category: WatchCategory::decode(&category_str),
        score: row.get(4).unwrap_or(0.0),
        episode_count: row.get(5).unwrap_or(0),
        status: row.get(6).unwrap_or(None),
        is_favourite: row.get::<_, i32>(7).unwrap_or(0) != 0,
    }
}
