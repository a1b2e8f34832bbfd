//! Run orchestration.
//!
//! The engine owns the fetch, enrich, synthesize, persist sequence. Only the
//! credential check and the snapshot fetch are fatal; enrichment lookups and
//! history appends degrade to log lines. A run that lands within the
//! duplicate window reuses the existing record instead of appending again.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::accessibility::AccessibilitySignal;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::{AuditRecord, EngineTag, HistoryStore};
use crate::report::{generate_report, Report, SourceFlags, SynthesisContext};
use crate::site::SiteCollector;
use crate::snapshot::SnapshotClient;

/// Two runs of the soc2 engine within this window count as one.
pub const DUPLICATE_WINDOW_SECS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct BundleMeta {
    pub generated_at: Option<DateTime<Utc>>,
    pub record_id: Option<String>,
    pub deduplicated: bool,
    pub endpoint: String,
    pub sources: SourceFlags,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportBundle {
    pub snapshot: Value,
    pub report: Option<Report>,
    pub meta: BundleMeta,
}

impl ReportBundle {
    fn empty(config: &EngineConfig) -> Self {
        Self {
            snapshot: Value::Null,
            report: None,
            meta: BundleMeta {
                generated_at: None,
                record_id: None,
                deduplicated: false,
                endpoint: config.endpoint.clone(),
                sources: SourceFlags {
                    snapshot: false,
                    accessibility: false,
                    site: false,
                },
            },
        }
    }
}

pub struct ComplianceEngine<S> {
    config: EngineConfig,
    client: SnapshotClient,
    store: S,
    collector: SiteCollector,
    cached: RwLock<ReportBundle>,
}

impl<S: HistoryStore> ComplianceEngine<S> {
    pub fn new(config: EngineConfig, store: S) -> Result<Self, EngineError> {
        let client = SnapshotClient::from_config(&config)?;
        let collector = SiteCollector::new(config.site_url.clone());
        let cached = RwLock::new(ReportBundle::empty(&config));
        Ok(Self {
            config,
            client,
            store,
            collector,
            cached,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch a fresh snapshot and synthesize from it.
    pub async fn run_full_report(&self) -> Result<ReportBundle, EngineError> {
        info!(endpoint = %self.config.endpoint, "fetching compliance snapshot");
        let snapshot = self.client.fetch().await?;
        self.synthesize(snapshot).await
    }

    /// Synthesize, persist, and cache a bundle from an already-fetched
    /// snapshot.
    pub async fn synthesize(&self, snapshot: Value) -> Result<ReportBundle, EngineError> {
        let accessibility = match self.store.latest(EngineTag::Accessibility).await {
            Ok(record) => record.as_ref().and_then(AccessibilitySignal::from_record),
            Err(err) => {
                warn!(error = %err, "accessibility history unavailable; synthesizing without it");
                None
            }
        };
        let site = self.collector.collect();

        let context = SynthesisContext::from_config(&self.config);
        let report = generate_report(&snapshot, accessibility.as_ref(), Some(&site), &context)?;

        let (record_id, deduplicated) = self.persist(&report).await;

        let meta = BundleMeta {
            generated_at: Some(report.meta.generated_at),
            record_id,
            deduplicated,
            endpoint: self.config.endpoint.clone(),
            sources: report.meta.sources.clone(),
        };
        let bundle = ReportBundle {
            snapshot,
            report: Some(report),
            meta,
        };
        *self.cached.write().await = bundle.clone();
        Ok(bundle)
    }

    /// Most recent bundle produced by this engine instance. Never fails: an
    /// engine that has not run yet returns the empty bundle.
    pub async fn cached_bundle(&self) -> ReportBundle {
        self.cached.read().await.clone()
    }

    // The probe and the append are separate store calls, so two truly
    // concurrent runs can still both append; the window absorbs transport
    // double-submission, it is not a lock.
    async fn persist(&self, report: &Report) -> (Option<String>, bool) {
        let cutoff = Utc::now() - Duration::seconds(DUPLICATE_WINDOW_SECS);
        match self.store.recent_since(EngineTag::Soc2, cutoff).await {
            Ok(Some(existing)) => {
                info!(record_id = %existing.id, "recent report exists; suppressing duplicate");
                return (Some(existing.id), true);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "duplicate probe failed; appending anyway");
            }
        }

        let payload = match serde_json::to_value(report) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode report payload; run not persisted");
                return (None, false);
            }
        };
        let target = if self.config.site_url.is_empty() {
            self.config.endpoint.clone()
        } else {
            self.config.site_url.clone()
        };
        let summary = format!(
            "{}; {} open risks",
            report.risk_assessment.readiness,
            report.risk_assessment.gaps.len()
        );
        let record = AuditRecord::new(EngineTag::Soc2, target, summary, payload);
        match self.store.save(&record).await {
            Ok(id) => (Some(id), false),
            Err(err) => {
                warn!(error = %err, "failed to persist report; run continues");
                (None, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use serde_json::json;

    fn engine(store: MemoryHistoryStore) -> ComplianceEngine<MemoryHistoryStore> {
        let config = EngineConfig::default().with_site_url("https://shop.example");
        ComplianceEngine::new(config, store).expect("engine")
    }

    #[tokio::test]
    async fn missing_credential_is_fatal_before_any_fetch() {
        let engine = engine(MemoryHistoryStore::new());
        let err = engine.run_full_report().await.expect_err("no license");
        assert!(matches!(err, EngineError::MissingCredential));
    }

    #[tokio::test]
    async fn close_runs_reuse_the_persisted_record() {
        let store = MemoryHistoryStore::new();
        let engine = engine(store.clone());

        let first = engine
            .synthesize(json!({"company": {"name": "Acme"}}))
            .await
            .expect("first run");
        assert!(!first.meta.deduplicated);
        let first_id = first.meta.record_id.clone().expect("record id");

        let second = engine
            .synthesize(json!({"company": {"name": "Acme"}}))
            .await
            .expect("second run");
        assert!(second.meta.deduplicated);
        assert_eq!(second.meta.record_id.as_deref(), Some(first_id.as_str()));

        let page = store.list(1, 10).await.expect("list");
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn storage_failures_do_not_fail_the_run() {
        let store = MemoryHistoryStore::new();
        store.set_fail_saves(true);
        let engine = engine(store.clone());

        let bundle = engine
            .synthesize(json!({"company": {"name": "Acme"}}))
            .await
            .expect("run succeeds");
        assert!(bundle.report.is_some());
        assert!(bundle.meta.record_id.is_none());
        assert!(!bundle.meta.deduplicated);
        assert_eq!(store.list(1, 10).await.expect("list").total, 0);
    }

    #[tokio::test]
    async fn latest_accessibility_record_enriches_the_report() {
        let store = MemoryHistoryStore::new();
        let audit = AuditRecord::new(
            EngineTag::Accessibility,
            "https://shop.example",
            "11/12 checks passed",
            json!({"summary": {
                "score": 88.5,
                "passed": 11,
                "total": 12,
                "wcag_compliance": "Partially conformant"
            }}),
        );
        store.save(&audit).await.expect("seed");

        let engine = engine(store);
        let bundle = engine.synthesize(json!({})).await.expect("run");
        let report = bundle.report.expect("report");
        assert!(report.meta.sources.accessibility);
        let signal = report.inputs.accessibility.expect("signal");
        assert_eq!(signal.score, Some(88.5));
        assert_eq!(signal.record_id, audit.id);
    }

    #[tokio::test]
    async fn cached_bundle_is_always_available() {
        let engine = engine(MemoryHistoryStore::new());
        let before = engine.cached_bundle().await;
        assert!(before.report.is_none());
        assert!(before.snapshot.is_null());
        assert!(!before.meta.deduplicated);

        engine.synthesize(json!({})).await.expect("run");
        let after = engine.cached_bundle().await;
        assert!(after.report.is_some());
        assert!(after.meta.generated_at.is_some());
    }

    #[tokio::test]
    async fn non_object_snapshots_are_rejected_without_side_effects() {
        let store = MemoryHistoryStore::new();
        let engine = engine(store.clone());
        let err = engine
            .synthesize(json!("just a string"))
            .await
            .expect_err("scalar snapshot");
        assert!(matches!(err, EngineError::SnapshotNotObject));
        assert_eq!(store.list(1, 10).await.expect("list").total, 0);
        assert!(engine.cached_bundle().await.report.is_none());
    }
}
