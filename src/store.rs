// src/store.rs
//! Hybrid store: structured metadata in SQLite, full bodies in a
//! fingerprint-addressed file area.
//!
//! Write ordering invariant: the body is written before the metadata row
//! that points at it, so a crash at worst leaves an orphan file, never a
//! record with a dangling body reference.
//!
//! The `content_items` table is a supported read contract for operators
//! (e.g. `SELECT * FROM content_items WHERE notified = 0`), not an
//! implementation detail.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::fingerprint::ContentKind;
use crate::model::{CandidateItem, ContentItem, ScrapeLog, ScrapeStatus};
use crate::registry::Firm;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS firms (
    name        TEXT PRIMARY KEY,
    aliases     TEXT NOT NULL DEFAULT '[]',
    careers_url TEXT,
    category    TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS content_items (
    fingerprint    TEXT PRIMARY KEY,
    kind           TEXT NOT NULL,
    source_name    TEXT NOT NULL,
    source_url     TEXT NOT NULL,
    firm           TEXT REFERENCES firms(name),
    title          TEXT NOT NULL,
    published_at   TEXT,
    body_path      TEXT,
    event_start    TEXT,
    event_location TEXT,
    notified       INTEGER NOT NULL DEFAULT 0,
    first_seen     TEXT NOT NULL,
    last_seen      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_notified ON content_items (notified);
CREATE INDEX IF NOT EXISTS idx_items_firm ON content_items (firm);
CREATE INDEX IF NOT EXISTS idx_items_kind ON content_items (kind);

CREATE TABLE IF NOT EXISTS scrape_logs (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    source_name  TEXT NOT NULL,
    run_at       TEXT NOT NULL,
    status       TEXT NOT NULL,
    item_count   INTEGER NOT NULL DEFAULT 0,
    items_new    INTEGER NOT NULL DEFAULT 0,
    error_detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_logs_source ON scrape_logs (source_name, run_at);
"#;

/// Result of `upsert`: whether the fingerprint was seen for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Created)
    }
}

/// Fingerprint-addressed body storage rooted per kind, per firm.
#[derive(Debug, Clone)]
struct FileArea {
    root: PathBuf,
}

fn firm_slug(firm: Option<&str>) -> String {
    match firm {
        None => "unattributed".to_string(),
        Some(name) => {
            let slug: String = name
                .to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            let trimmed = slug.trim_matches('_');
            if trimmed.is_empty() {
                "unattributed".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}

impl FileArea {
    fn relative_path(kind: ContentKind, firm: Option<&str>, fingerprint: &str) -> PathBuf {
        PathBuf::from(kind.dir())
            .join(firm_slug(firm))
            .join(format!("{fingerprint}.txt"))
    }

    fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Idempotent write: identical content is left untouched, differing
    /// content is replaced via temp file + atomic rename on the same path,
    /// so repeated runs never accumulate duplicate files.
    ///
    /// The temp name is unique per write; concurrent writers for the same
    /// fingerprint each rename their own temp file and the last rename
    /// wins, instead of racing over a shared temp path.
    async fn write(&self, relative: &Path, body: &str) -> Result<(), StoreError> {
        static TMP_SEQ: AtomicU64 = AtomicU64::new(0);
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::FileArea {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        if let Ok(existing) = tokio::fs::read_to_string(&path).await {
            if existing == body {
                return Ok(());
            }
        }

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("txt.tmp.{}.{seq}", std::process::id()));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| StoreError::FileArea {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::FileArea {
                path: path.clone(),
                source,
            })?;
        Ok(())
    }

    async fn read(&self, relative: &Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.absolute(relative)).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::FileArea {
                path: self.absolute(relative),
                source,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridStore {
    pool: Pool<Sqlite>,
    files: FileArea,
}

impl HybridStore {
    /// Open (or create) the store at `db_path` with bodies under
    /// `file_root`. Tables are created on first open.
    pub async fn open(db_path: &Path, file_root: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::FileArea {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }
        tokio::fs::create_dir_all(file_root)
            .await
            .map_err(|source| StoreError::FileArea {
                path: file_root.to_path_buf(),
                source,
            })?;

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!(db = %db_path.display(), files = %file_root.display(), "hybrid store opened");

        Ok(Self {
            pool,
            files: FileArea {
                root: file_root.to_path_buf(),
            },
        })
    }

    /// Upsert keyed strictly by fingerprint. First observation inserts
    /// with `notified = false` and `first_seen = now`; later observations
    /// only bump `last_seen`. The insert race between concurrent sources
    /// that fetched the same logical item resolves inside SQLite via
    /// `ON CONFLICT DO NOTHING`.
    pub async fn upsert(&self, item: &CandidateItem) -> Result<UpsertOutcome, StoreError> {
        let now = Utc::now();

        // Body first, metadata second (see module docs).
        let body_path = match &item.body {
            Some(body) => {
                let rel =
                    FileArea::relative_path(item.kind, item.firm.as_deref(), &item.fingerprint);
                self.files.write(&rel, body).await?;
                Some(rel.to_string_lossy().into_owned())
            }
            None => None,
        };

        if let Some(name) = &item.firm {
            // Keep the foreign key satisfiable for ad-hoc joins.
            sqlx::query(
                "INSERT INTO firms (name, created_at) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        let inserted = sqlx::query(
            "INSERT INTO content_items
               (fingerprint, kind, source_name, source_url, firm, title,
                published_at, body_path, event_start, event_location,
                notified, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?11)
             ON CONFLICT(fingerprint) DO NOTHING",
        )
        .bind(&item.fingerprint)
        .bind(item.kind.as_str())
        .bind(&item.source_name)
        .bind(&item.source_url)
        .bind(&item.firm)
        .bind(&item.title)
        .bind(item.published_at)
        .bind(&body_path)
        .bind(item.event_start)
        .bind(&item.event_location)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            debug!(fingerprint = %item.fingerprint, kind = %item.kind, "new content item");
            return Ok(UpsertOutcome::Created);
        }

        sqlx::query("UPDATE content_items SET last_seen = ?1 WHERE fingerprint = ?2")
            .bind(now)
            .bind(&item.fingerprint)
            .execute(&self.pool)
            .await?;
        Ok(UpsertOutcome::Updated)
    }

    /// All items still awaiting a successful notification, optionally
    /// filtered by kind, in stable first-seen order.
    pub async fn unnotified(&self, kind: Option<ContentKind>) -> Result<Vec<ContentItem>, StoreError> {
        let rows = match kind {
            Some(k) => {
                sqlx::query(
                    "SELECT * FROM content_items
                     WHERE notified = 0 AND kind = ?1
                     ORDER BY first_seen, fingerprint",
                )
                .bind(k.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM content_items
                     WHERE notified = 0
                     ORDER BY first_seen, fingerprint",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(item_from_row).collect()
    }

    /// Flip the notified flag. Marking an already-notified item is a
    /// no-op, never an error.
    pub async fn mark_notified(&self, fingerprint: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE content_items SET notified = 1 WHERE fingerprint = ?1")
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<ContentItem>, StoreError> {
        let row = sqlx::query("SELECT * FROM content_items WHERE fingerprint = ?1")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    pub async fn item_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM content_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    /// Read a stored body back through its metadata pointer.
    pub async fn read_body(&self, item: &ContentItem) -> Result<Option<String>, StoreError> {
        match &item.body_path {
            Some(rel) => self.files.read(Path::new(rel)).await,
            None => Ok(None),
        }
    }

    /// Persist (merge) a firm so the relational side mirrors the registry.
    pub async fn record_firm(&self, firm: &Firm) -> Result<(), StoreError> {
        let aliases = serde_json::to_string(&firm.aliases)
            .map_err(|e| StoreError::Corrupt(format!("encoding aliases: {e}")))?;
        sqlx::query(
            "INSERT INTO firms (name, aliases, careers_url, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
               aliases = excluded.aliases,
               careers_url = COALESCE(firms.careers_url, excluded.careers_url),
               category = COALESCE(firms.category, excluded.category)",
        )
        .bind(&firm.name)
        .bind(aliases)
        .bind(&firm.careers_url)
        .bind(&firm.category)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append one scrape log record. Logs are never mutated afterwards.
    pub async fn log_scrape(&self, log: &ScrapeLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scrape_logs
               (source_name, run_at, status, item_count, items_new, error_detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&log.source_name)
        .bind(log.run_at)
        .bind(log.status.as_str())
        .bind(log.item_count as i64)
        .bind(log.items_new as i64)
        .bind(&log.error_detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent scrape logs, newest first, for run audits.
    pub async fn recent_scrape_logs(&self, limit: u32) -> Result<Vec<ScrapeLog>, StoreError> {
        let rows = sqlx::query(
            "SELECT source_name, run_at, status, item_count, items_new, error_detail
             FROM scrape_logs ORDER BY run_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status_raw: String = row.try_get("status")?;
                let status = ScrapeStatus::parse(&status_raw)
                    .ok_or_else(|| StoreError::Corrupt(format!("scrape status {status_raw:?}")))?;
                Ok(ScrapeLog {
                    source_name: row.try_get("source_name")?,
                    run_at: row.try_get("run_at")?,
                    status,
                    item_count: row.try_get::<i64, _>("item_count")? as u32,
                    items_new: row.try_get::<i64, _>("items_new")? as u32,
                    error_detail: row.try_get("error_detail")?,
                })
            })
            .collect()
    }
}

fn item_from_row(row: &SqliteRow) -> Result<ContentItem, StoreError> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = ContentKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("content kind {kind_raw:?}")))?;
    Ok(ContentItem {
        fingerprint: row.try_get("fingerprint")?,
        kind,
        source_name: row.try_get("source_name")?,
        source_url: row.try_get("source_url")?,
        firm: row.try_get("firm")?,
        title: row.try_get("title")?,
        published_at: row.try_get("published_at")?,
        body_path: row.try_get("body_path")?,
        event_start: row.try_get("event_start")?,
        event_location: row.try_get("event_location")?,
        notified: row.try_get::<i64, _>("notified")? != 0,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firm_slugs_are_filesystem_safe() {
        assert_eq!(firm_slug(Some("D. E. Shaw")), "d__e__shaw");
        assert_eq!(firm_slug(Some("Citadel")), "citadel");
        assert_eq!(firm_slug(None), "unattributed");
        assert_eq!(firm_slug(Some("???")), "unattributed");
    }

    #[test]
    fn body_paths_are_rooted_per_kind_per_firm() {
        let rel = FileArea::relative_path(ContentKind::BlogPost, Some("Jane Street"), "abc123");
        assert_eq!(rel, PathBuf::from("blog_posts/jane_street/abc123.txt"));
    }
}
