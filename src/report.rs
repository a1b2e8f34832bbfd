//! Report synthesis.
//!
//! `generate_report` is a pure function of the snapshot, the optional
//! enrichment inputs, and a synthesis context. It performs no IO: the engine
//! fetches and persists, this module only shapes. The single failure mode is
//! a snapshot whose top level is not a JSON object.

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::accessibility::AccessibilitySignal;
use crate::config::EngineConfig;
use crate::domains::{self, Domain, DomainAnalysis, DomainStatus};
use crate::error::EngineError;
use crate::matrix::{self, MatrixRow};
use crate::narrative;
use crate::normalize::{self, ArtifactEntry, OrganizationProfile};
use crate::risk::{self, Risk, Severity};
use crate::site::SiteFacts;
use crate::trust::TrustCriterion;

pub const ENGINE_NAME: &str = "complymap-soc2";

/// Inputs that shape a report but are not part of the snapshot itself.
#[derive(Debug, Clone)]
pub struct SynthesisContext {
    pub endpoint: String,
    pub observation_days: i64,
    /// Fixed generation instant for reproducible output; `None` means now.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for SynthesisContext {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            endpoint: config.endpoint,
            observation_days: config.observation_days,
            generated_at: None,
        }
    }
}

impl SynthesisContext {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            observation_days: config.observation_days,
            generated_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFlags {
    pub snapshot: bool,
    pub accessibility: bool,
    pub site: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    pub engine: String,
    pub engine_version: String,
    pub endpoint: String,
    pub provenance: String,
    pub sources: SourceFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustServiceSection {
    pub criterion: TrustCriterion,
    pub objective: String,
    pub controls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDescription {
    pub overview: String,
    pub hosting: String,
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEnvironment {
    pub domains: Vec<DomainAnalysis>,
    pub matrix: Vec<MatrixRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestProcedure {
    pub domain: Domain,
    pub description: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlTests {
    pub period: ObservationPeriod,
    pub procedures: Vec<TestProcedure>,
    pub evidence_total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationItem {
    pub risk_id: String,
    pub action: String,
    pub due_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMatrixRow {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub likelihood: String,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub gaps: Vec<Risk>,
    pub remediation: Vec<RemediationItem>,
    pub matrix: Vec<RiskMatrixRow>,
    pub readiness: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditorOpinion {
    pub opinion: String,
    pub basis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInputs {
    pub accessibility: Option<AccessibilitySignal>,
    pub site: Option<SiteFacts>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Documents {
    pub executive_summary: String,
    pub narrative: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub organization: OrganizationProfile,
    pub trust_services: Vec<TrustServiceSection>,
    pub system_description: SystemDescription,
    pub control_environment: ControlEnvironment,
    pub control_tests: ControlTests,
    pub risk_assessment: RiskAssessment,
    pub auditor: AuditorOpinion,
    pub artifacts: Vec<ArtifactEntry>,
    pub inputs: ReportInputs,
    pub documents: Documents,
}

/// Synthesize a full report from a snapshot plus optional enrichments.
pub fn generate_report(
    snapshot: &Value,
    accessibility: Option<&AccessibilitySignal>,
    site: Option<&SiteFacts>,
    context: &SynthesisContext,
) -> Result<Report, EngineError> {
    let object = snapshot.as_object().ok_or(EngineError::SnapshotNotObject)?;

    let selected = normalize::trust_selection(object);
    let organization = normalize::organization_profile(object);
    let artifacts = normalize::artifacts(object);

    let inputs = domains::DomainInputs {
        snapshot: object,
        site,
        accessibility,
    };
    let analyses = domains::analyze_domains(&inputs);
    let risks = risk::infer_risks(&inputs, &analyses);
    let matrix = matrix::build_matrix(&analyses, &selected);

    let generated_at = context.generated_at.unwrap_or_else(Utc::now);
    let trust_services = trust_sections(&selected, &matrix);
    let system_description = describe_system(&organization);
    let control_tests = test_controls(&analyses, generated_at, context.observation_days);
    let risk_assessment = assess_risks(&risks);
    let auditor = form_opinion(&risks);

    let meta = ReportMeta {
        generated_at,
        engine: ENGINE_NAME.to_string(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        endpoint: context.endpoint.clone(),
        provenance: provenance_digest(snapshot, accessibility, site),
        sources: SourceFlags {
            snapshot: true,
            accessibility: accessibility.is_some(),
            site: site.is_some(),
        },
    };

    let mut report = Report {
        meta,
        organization,
        trust_services,
        system_description,
        control_environment: ControlEnvironment {
            domains: analyses,
            matrix,
        },
        control_tests,
        risk_assessment,
        auditor,
        artifacts,
        inputs: ReportInputs {
            accessibility: accessibility.cloned(),
            site: site.cloned(),
        },
        documents: Documents {
            executive_summary: String::new(),
            narrative: String::new(),
        },
    };
    report.documents.executive_summary = narrative::executive_summary(&report);
    report.documents.narrative = narrative::render(&report);
    Ok(report)
}

fn trust_sections(
    selected: &[TrustCriterion],
    matrix: &[MatrixRow],
) -> Vec<TrustServiceSection> {
    selected
        .iter()
        .map(|criterion| {
            let controls = matrix
                .iter()
                .filter(|row| row.aligned_criteria.contains(criterion))
                .flat_map(|row| row.controls.iter().cloned())
                .unique()
                .collect();
            TrustServiceSection {
                criterion: *criterion,
                objective: criterion.objective().to_string(),
                controls,
            }
        })
        .collect()
}

fn describe_system(organization: &OrganizationProfile) -> SystemDescription {
    let subject = if organization.name.is_empty() {
        "The organization".to_string()
    } else {
        organization.name.clone()
    };
    let overview = if organization.description.is_empty() {
        format!("{subject} operates a managed web platform within the scope of this assessment.")
    } else {
        organization.description.clone()
    };
    SystemDescription {
        overview,
        hosting: organization.hosting.clone(),
        components: organization.components.clone(),
    }
}

fn test_controls(
    analyses: &[DomainAnalysis],
    generated_at: DateTime<Utc>,
    observation_days: i64,
) -> ControlTests {
    let period = ObservationPeriod {
        start: generated_at - Duration::days(observation_days),
        end: generated_at,
        days: observation_days,
    };
    let procedures = analyses
        .iter()
        .map(|analysis| TestProcedure {
            domain: analysis.domain,
            description: format!(
                "Inspected controls and supporting evidence for the {} domain.",
                analysis.label
            ),
            outcome: match analysis.status {
                DomainStatus::Operating => "No exceptions noted.".to_string(),
                DomainStatus::Deficient => "Exceptions noted; see risk assessment.".to_string(),
                DomainStatus::Pending => "Not tested; evidence collection pending.".to_string(),
            },
        })
        .collect();
    let evidence_total = analyses.iter().map(|analysis| analysis.evidence.len()).sum();
    ControlTests {
        period,
        procedures,
        evidence_total,
    }
}

fn assess_risks(risks: &[Risk]) -> RiskAssessment {
    let remediation = risks
        .iter()
        .map(|risk| RemediationItem {
            risk_id: risk.id.clone(),
            action: risk.remediation.clone(),
            due_days: risk.severity.due_days(),
        })
        .collect();
    let matrix = risks
        .iter()
        .map(|risk| RiskMatrixRow {
            id: risk.id.clone(),
            title: risk.title.clone(),
            severity: risk.severity,
            likelihood: risk.severity.likelihood().to_string(),
            impact: risk.severity.impact().to_string(),
        })
        .collect();
    let readiness = if risks.iter().any(|risk| risk.severity == Severity::High) {
        "Not ready: high-severity remediation required".to_string()
    } else if risks.is_empty() {
        "Audit-ready".to_string()
    } else {
        "Conditionally ready: remediation in progress".to_string()
    };
    RiskAssessment {
        gaps: risks.to_vec(),
        remediation,
        matrix,
        readiness,
    }
}

fn form_opinion(risks: &[Risk]) -> AuditorOpinion {
    if risks.iter().any(|risk| risk.severity == Severity::High) {
        AuditorOpinion {
            opinion: "Qualified".to_string(),
            basis: "High-severity control gaps were identified during the assessment period."
                .to_string(),
        }
    } else if risks.is_empty() {
        AuditorOpinion {
            opinion: "Unqualified".to_string(),
            basis:
                "Controls were suitably designed and operating effectively throughout the observation period."
                    .to_string(),
        }
    } else {
        AuditorOpinion {
            opinion: "Unqualified".to_string(),
            basis:
                "Controls were suitably designed and operating, with minor exceptions documented in the risk assessment."
                    .to_string(),
        }
    }
}

/// Hash over the exact inputs, so two runs on the same data share provenance.
fn provenance_digest(
    snapshot: &Value,
    accessibility: Option<&AccessibilitySignal>,
    site: Option<&SiteFacts>,
) -> String {
    let payload = serde_json::json!({
        "snapshot": snapshot,
        "accessibility": accessibility,
        "site": site,
    });
    let digest = Sha256::digest(payload.to_string().as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::Extension;
    use serde_json::json;

    fn fixed_context() -> SynthesisContext {
        SynthesisContext {
            endpoint: "https://api.complymap.io/api/v1/soc2/snapshot".to_string(),
            observation_days: 90,
            generated_at: Some(
                DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
                    .expect("timestamp")
                    .with_timezone(&Utc),
            ),
        }
    }

    fn retail_snapshot() -> Value {
        json!({
            "company": {"name": "Acme Web Stores", "industry": "Retail"},
            "trust_services": ["security", "availability"],
            "storage": ["AWS S3 Storage"],
        })
    }

    fn secure_site() -> SiteFacts {
        SiteFacts {
            platform_version: "6.5.3".to_string(),
            active_extensions: Vec::new(),
            active_theme: Extension::default(),
            tls_enabled: true,
            debug_mode: false,
            backup_env_markers: Vec::new(),
        }
    }

    #[test]
    fn non_object_snapshot_is_the_only_failure() {
        let err = generate_report(&json!([1, 2, 3]), None, None, &fixed_context())
            .expect_err("array snapshot");
        assert!(matches!(err, EngineError::SnapshotNotObject));
        assert!(generate_report(&json!({}), None, None, &fixed_context()).is_ok());
    }

    #[test]
    fn report_covers_the_selected_criteria() {
        let snapshot = retail_snapshot();
        let site = secure_site();
        let report = generate_report(&snapshot, None, Some(&site), &fixed_context())
            .expect("report");
        let criteria: Vec<TrustCriterion> = report
            .trust_services
            .iter()
            .map(|section| section.criterion)
            .collect();
        assert_eq!(
            criteria,
            vec![TrustCriterion::Security, TrustCriterion::Availability]
        );
        let availability = &report.trust_services[1];
        assert!(availability.controls.contains(&"A1.2".to_string()));
        assert_eq!(report.control_environment.matrix.len(), 10);
        assert_eq!(report.control_environment.domains.len(), 10);
    }

    #[test]
    fn backup_from_snapshot_storage_keeps_the_domain_operating() {
        let snapshot = retail_snapshot();
        let site = secure_site();
        let report = generate_report(&snapshot, None, Some(&site), &fixed_context())
            .expect("report");
        let backup = report
            .control_environment
            .domains
            .iter()
            .find(|analysis| analysis.domain == Domain::BackupRecovery)
            .expect("backup domain");
        assert_eq!(backup.status, DomainStatus::Operating);
        assert!(backup.evidence.contains(&"AWS S3 Storage".to_string()));
        assert!(!report
            .risk_assessment
            .gaps
            .iter()
            .any(|risk| risk.domain == Domain::BackupRecovery));
    }

    #[test]
    fn qualified_opinion_follows_high_severity_gaps() {
        let snapshot = json!({});
        let report =
            generate_report(&snapshot, None, None, &fixed_context()).expect("report");
        assert_eq!(report.auditor.opinion, "Qualified");
        assert!(report
            .risk_assessment
            .readiness
            .starts_with("Not ready"));
        assert_eq!(
            report.risk_assessment.gaps.len(),
            report.risk_assessment.remediation.len()
        );
        let high = report
            .risk_assessment
            .remediation
            .iter()
            .find(|item| item.risk_id == "R-001")
            .expect("first remediation");
        assert_eq!(high.due_days, 14);
    }

    #[test]
    fn insecure_debug_site_produces_the_expected_gap_profile() {
        let snapshot = json!({
            "trust_services": ["security", "availability"],
            "controls": {},
        });
        let site = SiteFacts {
            platform_version: String::new(),
            active_extensions: Vec::new(),
            active_theme: Extension::default(),
            tls_enabled: false,
            debug_mode: true,
            backup_env_markers: Vec::new(),
        };
        let report = generate_report(&snapshot, None, Some(&site), &fixed_context())
            .expect("report");

        let criteria: Vec<TrustCriterion> = report
            .trust_services
            .iter()
            .map(|section| section.criterion)
            .collect();
        assert_eq!(
            criteria,
            vec![TrustCriterion::Security, TrustCriterion::Availability]
        );

        let gaps = &report.risk_assessment.gaps;
        assert!(gaps
            .iter()
            .any(|risk| risk.domain == Domain::DataEncryption
                && risk.severity == Severity::High));
        assert!(gaps
            .iter()
            .any(|risk| risk.domain == Domain::BackupRecovery
                && risk.severity == Severity::High));
        assert!(gaps
            .iter()
            .any(|risk| risk.title.contains("Debug mode") && risk.severity == Severity::Medium));

        let uncontrolled: Vec<Domain> = report
            .control_environment
            .domains
            .iter()
            .filter(|analysis| analysis.controls.is_empty())
            .map(|analysis| analysis.domain)
            .collect();
        for domain in &uncontrolled {
            assert!(
                gaps.iter().any(|risk| risk.domain == *domain
                    && risk.title.starts_with("Insufficient controls")),
                "{domain:?} should carry an insufficient-controls risk"
            );
        }
        assert_eq!(uncontrolled.len(), 7);
    }

    #[test]
    fn repeated_generation_is_byte_identical() {
        let snapshot = retail_snapshot();
        let site = secure_site();
        let context = fixed_context();
        let first = generate_report(&snapshot, None, Some(&site), &context).expect("first");
        let second = generate_report(&snapshot, None, Some(&site), &context).expect("second");
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
        assert_eq!(first.meta.provenance.len(), 64);
        assert_eq!(first.meta.provenance, second.meta.provenance);
    }

    #[test]
    fn observation_period_spans_the_configured_days() {
        let report =
            generate_report(&json!({}), None, None, &fixed_context()).expect("report");
        let period = &report.control_tests.period;
        assert_eq!(period.days, 90);
        assert_eq!(period.end - period.start, Duration::days(90));
        assert_eq!(report.control_tests.procedures.len(), 10);
    }
}
