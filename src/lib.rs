mod accessibility;
pub mod cli;
mod config;
mod domains;
mod engine;
mod error;
mod history;
mod matrix;
mod narrative;
mod normalize;
mod report;
mod reporting;
mod risk;
mod site;
mod snapshot;
mod trust;

pub use accessibility::{
    audit_markup, AccessibilityAuditor, AccessibilitySignal, AuditCheck, AuditOutcome,
    AuditSummary,
};
pub use config::EngineConfig;
pub use domains::{
    analyze_domains, detect_backup, BackupSignal, BackupSource, ControlFinding, ControlStatus,
    Domain, DomainAnalysis, DomainInputs, DomainStatus,
};
pub use engine::{BundleMeta, ComplianceEngine, ReportBundle, DUPLICATE_WINDOW_SECS};
pub use error::{BoxError, EngineError};
pub use history::{
    AuditRecord, EngineTag, HistoryPage, HistoryStore, MemoryHistoryStore, SqliteHistoryStore,
};
pub use matrix::{build_matrix, domain_criteria, MatrixRow};
pub use narrative::sanitize;
pub use normalize::{ArtifactEntry, OrganizationProfile};
pub use report::{generate_report, Report, ReportMeta, SourceFlags, SynthesisContext};
pub use reporting::{write_report_outputs, ExportPaths};
pub use risk::{infer_risks, Risk, Severity};
pub use site::{SiteCollector, SiteFacts, SiteInventory};
pub use snapshot::SnapshotClient;
pub use trust::TrustCriterion;

/// Connect the configured history store, run the full pipeline once, and
/// return the bundle.
pub async fn run_full_report(config: EngineConfig) -> Result<ReportBundle, BoxError> {
    let store = SqliteHistoryStore::connect(&config.database_url)
        .await
        .map_err(|err| EngineError::Storage(err.to_string()))?;
    let engine = ComplianceEngine::new(config, store)?;
    let bundle = engine.run_full_report().await?;

    if let Some(report) = &bundle.report {
        eprintln!(
            "[*] Report complete: {} ({} open risks)",
            report.auditor.opinion,
            report.risk_assessment.gaps.len()
        );
    }

    Ok(bundle)
}
