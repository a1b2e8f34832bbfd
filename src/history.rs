//! Append-only audit history.
//!
//! Both the accessibility checker and the report engine write their results
//! here as `AuditRecord`s. The report engine additionally reads the latest
//! accessibility record for enrichment and probes for recent soc2 records to
//! suppress duplicate appends.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineTag {
    Accessibility,
    Soc2,
}

impl EngineTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineTag::Accessibility => "accessibility",
            EngineTag::Soc2 => "soc2",
        }
    }

    pub fn parse(tag: &str) -> Option<EngineTag> {
        match tag {
            "accessibility" => Some(EngineTag::Accessibility),
            "soc2" => Some(EngineTag::Soc2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine: EngineTag,
    pub target: String,
    pub summary: String,
    pub payload: Value,
}

impl AuditRecord {
    pub fn new(
        engine: EngineTag,
        target: impl Into<String>,
        summary: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: generate_record_id(),
            created_at: Utc::now(),
            engine,
            target: target.into(),
            summary: summary.into(),
            payload,
        }
    }
}

fn generate_record_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub items: Vec<AuditRecord>,
    pub total: u64,
    pub pages: u64,
}

#[allow(async_fn_in_trait)]
pub trait HistoryStore {
    /// Append a record, returning its id.
    async fn save(&self, record: &AuditRecord) -> Result<String>;
    async fn get(&self, id: &str) -> Result<Option<AuditRecord>>;
    /// Newest-first listing. Pages are 1-based; `per_page` is clamped to
    /// 1..=100.
    async fn list(&self, page: u64, per_page: u64) -> Result<HistoryPage>;
    async fn latest(&self, engine: EngineTag) -> Result<Option<AuditRecord>>;
    /// Newest record of `engine` created at or after `cutoff`, if any. Used
    /// by the duplicate-suppression probe.
    async fn recent_since(
        &self,
        engine: EngineTag,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<AuditRecord>>;
}

/// SQLite-backed store. Timestamps are stored as fixed-width UTC RFC 3339
/// text so string comparison matches chronological order.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url {database_url}"))?
            .create_if_missing(true);
        // A shared in-memory database only exists per connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to database at {database_url}"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_records (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                engine TEXT NOT NULL,
                target TEXT NOT NULL,
                summary TEXT NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to initialize audit_records table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS audit_records_engine_created
             ON audit_records (engine, created_at)",
        )
        .execute(&pool)
        .await
        .context("failed to create audit_records index")?;

        Ok(Self { pool })
    }
}

impl HistoryStore for SqliteHistoryStore {
    async fn save(&self, record: &AuditRecord) -> Result<String> {
        let payload =
            serde_json::to_string(&record.payload).context("failed to encode record payload")?;
        sqlx::query(
            r#"
            INSERT INTO audit_records (id, created_at, engine, target, summary, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.id)
        .bind(encode_timestamp(&record.created_at))
        .bind(record.engine.as_str())
        .bind(&record.target)
        .bind(&record.summary)
        .bind(payload)
        .execute(&self.pool)
        .await
        .context("failed to append audit record")?;
        Ok(record.id.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<AuditRecord>> {
        let row = sqlx::query("SELECT * FROM audit_records WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load audit record")?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(&self, page: u64, per_page: u64) -> Result<HistoryPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let total_row = sqlx::query("SELECT COUNT(*) AS total FROM audit_records")
            .fetch_one(&self.pool)
            .await
            .context("failed to count audit records")?;
        let total: i64 = total_row.try_get("total")?;
        let total = total.max(0) as u64;

        let offset = (page - 1).saturating_mul(per_page);
        let rows = sqlx::query(
            "SELECT * FROM audit_records ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .context("failed to list audit records")?;

        let items = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        Ok(HistoryPage {
            items,
            total,
            pages: total.div_ceil(per_page),
        })
    }

    async fn latest(&self, engine: EngineTag) -> Result<Option<AuditRecord>> {
        let row = sqlx::query(
            "SELECT * FROM audit_records WHERE engine = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(engine.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to load latest audit record")?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn recent_since(
        &self,
        engine: EngineTag,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<AuditRecord>> {
        let row = sqlx::query(
            "SELECT * FROM audit_records
             WHERE engine = ?1 AND created_at >= ?2
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(engine.as_str())
        .bind(encode_timestamp(&cutoff))
        .fetch_optional(&self.pool)
        .await
        .context("failed to probe for recent audit records")?;
        row.as_ref().map(row_to_record).transpose()
    }
}

fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn row_to_record(row: &SqliteRow) -> Result<AuditRecord> {
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .with_context(|| format!("invalid record timestamp {created_at}"))?
        .with_timezone(&Utc);
    let engine: String = row.try_get("engine")?;
    let engine = EngineTag::parse(&engine)
        .with_context(|| format!("unknown engine tag {engine}"))?;
    let payload: String = row.try_get("payload")?;
    let payload = serde_json::from_str(&payload).context("invalid record payload")?;
    Ok(AuditRecord {
        id: row.try_get("id")?,
        created_at,
        engine,
        target: row.try_get("target")?,
        summary: row.try_get("summary")?,
        payload,
    })
}

/// In-memory store for tests and embedded use. `set_fail_saves` injects
/// append failures to exercise the engine's non-fatal persistence path.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    records: Arc<RwLock<Vec<AuditRecord>>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn save(&self, record: &AuditRecord) -> Result<String> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("history store unavailable");
        }
        self.records.write().await.push(record.clone());
        Ok(record.id.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<AuditRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    async fn list(&self, page: u64, per_page: u64) -> Result<HistoryPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let mut items: Vec<AuditRecord> = self.records.read().await.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = items.len() as u64;
        let start = ((page - 1).saturating_mul(per_page)) as usize;
        let items = items
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        Ok(HistoryPage {
            items,
            total,
            pages: total.div_ceil(per_page),
        })
    }

    async fn latest(&self, engine: EngineTag) -> Result<Option<AuditRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.engine == engine)
            .max_by_key(|record| record.created_at)
            .cloned())
    }

    async fn recent_since(
        &self,
        engine: EngineTag,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<AuditRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.engine == engine && record.created_at >= cutoff)
            .max_by_key(|record| record.created_at)
            .cloned())
    }
}
