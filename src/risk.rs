//! Risk inference.
//!
//! Rules run in a fixed order over the same inputs the domain analyzers saw,
//! so identical inputs always yield the identical risk list. Identifiers are
//! assigned after all rules have run and are unique within a single run only.

use serde::{Deserialize, Serialize};

use crate::domains::{
    detect_backup, Domain, DomainAnalysis, DomainInputs, PRIVACY_SCORE_FLOOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Likelihood band used in the risk matrix.
    pub fn likelihood(&self) -> &'static str {
        match self {
            Severity::Low => "Unlikely",
            Severity::Medium => "Possible",
            Severity::High => "Likely",
        }
    }

    /// Impact band used in the risk matrix.
    pub fn impact(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Moderate",
            Severity::High => "High",
        }
    }

    /// Remediation window in days.
    pub fn due_days(&self) -> u32 {
        match self {
            Severity::Low => 60,
            Severity::Medium => 30,
            Severity::High => 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: String,
    pub domain: Domain,
    pub remediation: String,
}

struct RiskDraft {
    title: String,
    description: String,
    severity: Severity,
    domain: Domain,
    remediation: String,
}

/// Run every rule in order and assign sequential identifiers afterwards.
pub fn infer_risks(inputs: &DomainInputs<'_>, domains: &[DomainAnalysis]) -> Vec<Risk> {
    let mut drafts = Vec::new();

    let tls_enabled = inputs.site.map(|site| site.tls_enabled).unwrap_or(false);
    if !tls_enabled {
        drafts.push(RiskDraft {
            title: "Unencrypted data in transit".to_string(),
            description:
                "TLS is not enabled; session credentials and customer data travel in cleartext."
                    .to_string(),
            severity: Severity::High,
            domain: Domain::DataEncryption,
            remediation: "Provision a TLS certificate and redirect all traffic to HTTPS."
                .to_string(),
        });
    }

    if let Some(score) = inputs.accessibility.and_then(|signal| signal.score) {
        if score < PRIVACY_SCORE_FLOOR {
            drafts.push(RiskDraft {
                title: "Accessibility compliance below threshold".to_string(),
                description: format!(
                    "The latest accessibility audit scored {score:.1}, below the {PRIVACY_SCORE_FLOOR:.0}-point compliance floor."
                ),
                severity: Severity::Medium,
                domain: Domain::Privacy,
                remediation: "Remediate the failing accessibility checks and rerun the audit."
                    .to_string(),
            });
        }
    }

    if detect_backup(inputs.snapshot, inputs.site).is_none() {
        drafts.push(RiskDraft {
            title: "No backup capability detected".to_string(),
            description:
                "No backup mechanism was found in the vendor snapshot, installed extensions, or host environment."
                    .to_string(),
            severity: Severity::High,
            domain: Domain::BackupRecovery,
            remediation:
                "Deploy a scheduled backup mechanism with offsite storage and verify restoration."
                    .to_string(),
        });
    }

    if inputs.site.map(|site| site.debug_mode).unwrap_or(false) {
        drafts.push(RiskDraft {
            title: "Debug mode enabled in production".to_string(),
            description:
                "The platform is running with debug output enabled, which can leak stack traces and configuration detail."
                    .to_string(),
            severity: Severity::Medium,
            domain: Domain::ChangeManagement,
            remediation: "Disable debug mode in the production configuration.".to_string(),
        });
    }

    for analysis in domains {
        if analysis.controls.is_empty() {
            drafts.push(RiskDraft {
                title: format!("Insufficient controls for {}", analysis.label),
                description: format!(
                    "The {} domain has no documented controls for the observation period.",
                    analysis.label
                ),
                severity: Severity::Medium,
                domain: analysis.domain,
                remediation: "Document and implement at least one control for this domain."
                    .to_string(),
            });
        }
    }

    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| Risk {
            id: format!("R-{:03}", index + 1),
            title: draft.title,
            description: draft.description,
            severity: draft.severity,
            status: "open".to_string(),
            domain: draft.domain,
            remediation: draft.remediation,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::AccessibilitySignal;
    use crate::domains::analyze_domains;
    use crate::site::{Extension, SiteFacts};
    use chrono::Utc;
    use serde_json::{json, Map, Value};

    fn snapshot(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn risks_for(
        map: &Map<String, Value>,
        site: Option<&SiteFacts>,
        accessibility: Option<&AccessibilitySignal>,
    ) -> Vec<Risk> {
        let inputs = DomainInputs {
            snapshot: map,
            site,
            accessibility,
        };
        let domains = analyze_domains(&inputs);
        infer_risks(&inputs, &domains)
    }

    #[test]
    fn bare_site_yields_the_full_ordered_gap_list() {
        let map = snapshot(json!({}));
        let bare = SiteFacts {
            platform_version: String::new(),
            active_extensions: Vec::new(),
            active_theme: Extension::default(),
            tls_enabled: false,
            debug_mode: true,
            backup_env_markers: Vec::new(),
        };
        let risks = risks_for(&map, Some(&bare), None);

        assert_eq!(risks.len(), 10);
        for (index, risk) in risks.iter().enumerate() {
            assert_eq!(risk.id, format!("R-{:03}", index + 1));
        }
        assert_eq!(risks[0].severity, Severity::High);
        assert_eq!(risks[0].domain, Domain::DataEncryption);
        assert_eq!(risks[1].severity, Severity::High);
        assert_eq!(risks[1].domain, Domain::BackupRecovery);
        assert_eq!(risks[2].severity, Severity::Medium);
        assert!(risks[2].title.contains("Debug mode"));

        let insufficient: Vec<Domain> = risks[3..].iter().map(|risk| risk.domain).collect();
        assert_eq!(
            insufficient,
            vec![
                Domain::Governance,
                Domain::ChangeManagement,
                Domain::SystemMonitoring,
                Domain::IncidentResponse,
                Domain::VendorManagement,
                Domain::Onboarding,
                Domain::Privacy,
            ]
        );
        assert!(risks[3..]
            .iter()
            .all(|risk| risk.severity == Severity::Medium));
    }

    #[test]
    fn healthy_inputs_yield_no_risks() {
        let map = snapshot(json!({
            "company": {"name": "Acme Web Stores", "industry": "Retail"},
            "incident_contact": "security@acme.example",
            "vendors": ["Stripe", "Cloudflare"],
            "onboarding": ["Security training policy"],
        }));
        let healthy = SiteFacts {
            platform_version: "6.5.3".to_string(),
            active_extensions: vec![Extension {
                name: "UpdraftPlus".to_string(),
                version: "1.24".to_string(),
            }],
            active_theme: Extension::default(),
            tls_enabled: true,
            debug_mode: false,
            backup_env_markers: Vec::new(),
        };
        let signal = AccessibilitySignal {
            record_id: "abc123".to_string(),
            recorded_at: Utc::now(),
            target: "https://acme.example".to_string(),
            score: Some(91.7),
            passed: Some(11),
            total: Some(12),
            wcag: "WCAG 2.1 AA aligned".to_string(),
        };
        let risks = risks_for(&map, Some(&healthy), Some(&signal));
        assert!(risks.is_empty(), "unexpected risks: {risks:?}");
    }

    #[test]
    fn low_accessibility_score_is_cited_verbatim() {
        let map = snapshot(json!({}));
        let signal = AccessibilitySignal {
            record_id: "abc123".to_string(),
            recorded_at: Utc::now(),
            target: "https://acme.example".to_string(),
            score: Some(41.7),
            passed: Some(5),
            total: Some(12),
            wcag: "Non-conformant".to_string(),
        };
        let risks = risks_for(&map, None, Some(&signal));
        let accessibility = risks
            .iter()
            .find(|risk| risk.domain == Domain::Privacy && risk.severity == Severity::Medium)
            .expect("accessibility risk");
        assert!(accessibility.description.contains("41.7"));
    }

    #[test]
    fn identical_inputs_produce_identical_risks() {
        let map = snapshot(json!({"company": {"name": "Acme"}}));
        let first = risks_for(&map, None, None);
        let second = risks_for(&map, None, None);
        let first_json = serde_json::to_value(&first).expect("serialize");
        let second_json = serde_json::to_value(&second).expect("serialize");
        assert_eq!(first_json, second_json);
    }
}
