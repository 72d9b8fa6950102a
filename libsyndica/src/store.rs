//! Persistent queue store
//!
//! Single SQLite database holding the content queue and the post audit log.
//! Every component reads and writes through this store; nothing else holds
//! cross-request mutable state. The `pending -> processing` claim is an
//! atomic conditional update so two racing processors cannot both take the
//! same item.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::platform::Platform;
use crate::types::{ContentItem, ContentType, ItemStatus, PlatformOutcome};

/// One row of the post audit log. The rate tracker and duplicate detector
/// derive their answers from these rows.
#[derive(Debug, Clone)]
pub struct PostLogEntry {
    pub id: Option<i64>,
    pub item_id: String,
    pub platform: Platform,
    pub success: bool,
    pub platform_post_id: Option<String>,
    pub url: Option<String>,
    pub error_message: Option<String>,
    /// SHA-256 of the formatted content, hex encoded.
    pub content_hash: String,
    pub posted_at: i64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the queue database at the given path.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
        }

        // Forward slashes work on both Windows and Unix; mode=rwc creates
        // the file if missing.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    /// In-memory store, used by tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Content items
    // ------------------------------------------------------------------

    pub async fn create_item(&self, item: &ContentItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content_items (
                id, item_type, title, body, platforms, image_url, link,
                hashtags, product_type, product_data, scheduled_at, timezone,
                priority, status, retry_count, max_retries, results, error,
                created_at, posted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(item.item_type.as_str())
        .bind(&item.title)
        .bind(&item.body)
        .bind(to_json(&item.platforms)?)
        .bind(&item.image_url)
        .bind(&item.link)
        .bind(to_json(&item.hashtags)?)
        .bind(&item.product_type)
        .bind(
            item.product_data
                .as_ref()
                .map(|v| v.to_string()),
        )
        .bind(item.scheduled_at)
        .bind(&item.timezone)
        .bind(item.priority as i64)
        .bind(item.status.as_str())
        .bind(item.retry_count as i64)
        .bind(item.max_retries as i64)
        .bind(to_json(&item.results)?)
        .bind(&item.error)
        .bind(item.created_at)
        .bind(item.posted_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<ContentItem>> {
        let row = sqlx::query("SELECT * FROM content_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        row.map(row_to_item).transpose()
    }

    /// Due pending items, highest priority first, earliest schedule within
    /// the same priority.
    pub async fn select_due(&self, now: i64, limit: usize) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM content_items
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY priority DESC, scheduled_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_item).collect()
    }

    /// Claim an item for processing. Compare-and-swap on status: returns
    /// false when another processor already took it (or it left pending).
    pub async fn claim(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE content_items SET status = 'processing' WHERE id = ? AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the outcome of one processing pass for an item.
    ///
    /// Conditional on the item still being `processing`: a cancel landing
    /// mid-pass wins, and the settle reports false without touching the
    /// row.
    pub async fn finish_processing(
        &self,
        id: &str,
        status: ItemStatus,
        retry_count: u32,
        results: &BTreeMap<Platform, PlatformOutcome>,
        error: Option<&str>,
        posted_at: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE content_items
            SET status = ?, retry_count = ?, results = ?, error = ?, posted_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(status.as_str())
        .bind(retry_count as i64)
        .bind(to_json(results)?)
        .bind(error)
        .bind(posted_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel an active item. Terminal items are left untouched; returns
    /// whether a row actually changed.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE content_items SET status = 'cancelled'
            WHERE id = ? AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Re-arm failed items that still have retries left.
    pub async fn retry_failed(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE content_items SET status = 'pending', error = NULL
            WHERE status = 'failed' AND retry_count < max_retries
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Delete posted and cancelled items created before the cutoff. Failed
    /// items are kept for inspection.
    pub async fn cleanup_terminal(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM content_items
            WHERE status IN ('posted', 'cancelled') AND created_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(result.rows_affected())
    }

    pub async fn count_by_status(&self) -> Result<BTreeMap<ItemStatus, u64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM content_items GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let raw: String = row.get("status");
            let status: ItemStatus = raw.parse().map_err(|detail| StoreError::CorruptRecord {
                id: "<status counts>".to_string(),
                detail,
            })?;
            let n: i64 = row.get("n");
            *counts.entry(status).or_insert(0) += n as u64;
        }
        Ok(counts)
    }

    /// All currently pending items, earliest schedule first.
    pub async fn pending_items(&self, limit: usize) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM content_items
            WHERE status = 'pending'
            ORDER BY scheduled_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        rows.into_iter().map(row_to_item).collect()
    }

    /// Pending items for a platform scheduled within `half_window` seconds
    /// of `center`. Feeds the scheduler's congestion penalty.
    pub async fn count_pending_near(
        &self,
        platform: Platform,
        center: i64,
        half_window: i64,
    ) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM content_items
            WHERE status = 'pending'
              AND scheduled_at BETWEEN ? AND ?
              AND platforms LIKE ?
            "#,
        )
        .bind(center - half_window)
        .bind(center + half_window)
        .bind(format!("%\"{}\"%", platform.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.get::<i64, _>("n") as u32)
    }

    // ------------------------------------------------------------------
    // Post log
    // ------------------------------------------------------------------

    pub async fn record_post_log(&self, entry: &PostLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_log (
                item_id, platform, success, platform_post_id, url,
                error_message, content_hash, posted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.item_id)
        .bind(entry.platform.as_str())
        .bind(if entry.success { 1 } else { 0 })
        .bind(&entry.platform_post_id)
        .bind(&entry.url)
        .bind(&entry.error_message)
        .bind(&entry.content_hash)
        .bind(entry.posted_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// Successful posts to a platform since the given timestamp.
    pub async fn count_successes_since(&self, platform: Platform, since: i64) -> Result<u32> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM post_log
            WHERE platform = ? AND success = 1 AND posted_at >= ?
            "#,
        )
        .bind(platform.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.get::<i64, _>("n") as u32)
    }

    /// Whether identical content was successfully posted to a platform since
    /// the given timestamp. Exact match via content hash.
    pub async fn duplicate_exists(
        &self,
        platform: Platform,
        content_hash: &str,
        since: i64,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM post_log
            WHERE platform = ? AND success = 1 AND content_hash = ? AND posted_at >= ?
            "#,
        )
        .bind(platform.as_str())
        .bind(content_hash)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.get::<i64, _>("n") > 0)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        StoreError::CorruptRecord {
            id: "<serialize>".to_string(),
            detail: e.to_string(),
        }
        .into()
    })
}

fn row_to_item(row: sqlx::sqlite::SqliteRow) -> Result<ContentItem> {
    let id: String = row.get("id");

    let parse_err = |field: &str, detail: String| -> crate::error::SyndicaError {
        StoreError::CorruptRecord {
            id: id.clone(),
            detail: format!("bad {}: {}", field, detail),
        }
        .into()
    };

    let item_type: ContentType = row
        .get::<String, _>("item_type")
        .parse()
        .map_err(|e| parse_err("item_type", e))?;
    let status: ItemStatus = row
        .get::<String, _>("status")
        .parse()
        .map_err(|e| parse_err("status", e))?;

    let platforms: Vec<Platform> = serde_json::from_str(&row.get::<String, _>("platforms"))
        .map_err(|e| parse_err("platforms", e.to_string()))?;
    let hashtags: Vec<String> = serde_json::from_str(&row.get::<String, _>("hashtags"))
        .map_err(|e| parse_err("hashtags", e.to_string()))?;
    let results: BTreeMap<Platform, PlatformOutcome> =
        serde_json::from_str(&row.get::<String, _>("results"))
            .map_err(|e| parse_err("results", e.to_string()))?;
    let product_data: Option<serde_json::Value> = row
        .get::<Option<String>, _>("product_data")
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| parse_err("product_data", e.to_string()))?;

    Ok(ContentItem {
        id,
        item_type,
        title: row.get("title"),
        body: row.get("body"),
        platforms,
        image_url: row.get("image_url"),
        link: row.get("link"),
        hashtags,
        product_type: row.get("product_type"),
        product_data,
        scheduled_at: row.get("scheduled_at"),
        timezone: row.get("timezone"),
        priority: row.get::<i64, _>("priority") as u8,
        status,
        retry_count: row.get::<i64, _>("retry_count") as u32,
        max_retries: row.get::<i64, _>("max_retries") as u32,
        results,
        error: row.get("error"),
        created_at: row.get("created_at"),
        posted_at: row.get("posted_at"),
    })
}
