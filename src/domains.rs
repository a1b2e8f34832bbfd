//! Control-domain analysis.
//!
//! Ten fixed domains, each analyzed by an independent pure function of the
//! snapshot plus whatever enrichment inputs exist. Absent enrichment is a
//! first-class state: analyzers distinguish "no data yet" (pending) from an
//! affirmative negative signal (deficient). Explicit `controls`/`evidence`
//! entries in the snapshot override inference for their domain entirely.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accessibility::AccessibilitySignal;
use crate::normalize;
use crate::site::SiteFacts;

/// Accessibility score at or above this value satisfies the privacy domain.
pub const PRIVACY_SCORE_FLOOR: f64 = 70.0;

/// Extension-name fragments that identify backup tooling, matched
/// case-insensitively as substrings.
pub const BACKUP_EXTENSION_FRAGMENTS: &[&str] = &[
    "updraft",
    "backwpup",
    "duplicator",
    "backupbuddy",
    "blogvault",
    "wpvivid",
    "vaultpress",
    "jetpack backup",
    "total upkeep",
    "backup migration",
    "wp time capsule",
];

/// Words that mark a snapshot storage/evidence descriptor as a backup or
/// durable-storage mechanism.
const STORAGE_HINTS: &[&str] = &[
    "s3",
    "backup",
    "snapshot",
    "replica",
    "archive",
    "vault",
    "glacier",
    "object storage",
    "offsite",
    "restore",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Governance,
    AccessControl,
    ChangeManagement,
    SystemMonitoring,
    IncidentResponse,
    VendorManagement,
    DataEncryption,
    BackupRecovery,
    Onboarding,
    Privacy,
}

impl Domain {
    /// Fixed enumeration order used everywhere domains are listed.
    pub const ALL: [Domain; 10] = [
        Domain::Governance,
        Domain::AccessControl,
        Domain::ChangeManagement,
        Domain::SystemMonitoring,
        Domain::IncidentResponse,
        Domain::VendorManagement,
        Domain::DataEncryption,
        Domain::BackupRecovery,
        Domain::Onboarding,
        Domain::Privacy,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Domain::Governance => "governance",
            Domain::AccessControl => "access_control",
            Domain::ChangeManagement => "change_management",
            Domain::SystemMonitoring => "system_monitoring",
            Domain::IncidentResponse => "incident_response",
            Domain::VendorManagement => "vendor_management",
            Domain::DataEncryption => "data_encryption",
            Domain::BackupRecovery => "backup_recovery",
            Domain::Onboarding => "onboarding",
            Domain::Privacy => "privacy",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Domain::Governance => "Governance",
            Domain::AccessControl => "Access Control",
            Domain::ChangeManagement => "Change Management",
            Domain::SystemMonitoring => "System Monitoring",
            Domain::IncidentResponse => "Incident Response",
            Domain::VendorManagement => "Vendor Management",
            Domain::DataEncryption => "Data Encryption",
            Domain::BackupRecovery => "Backup & Recovery",
            Domain::Onboarding => "Onboarding & Training",
            Domain::Privacy => "Privacy",
        }
    }

    pub fn default_owner(&self) -> &'static str {
        match self {
            Domain::Governance => "Leadership",
            Domain::AccessControl => "Security Engineering",
            Domain::ChangeManagement => "Platform Engineering",
            Domain::SystemMonitoring => "Site Reliability",
            Domain::IncidentResponse => "Security Operations",
            Domain::VendorManagement => "Procurement",
            Domain::DataEncryption => "Security Engineering",
            Domain::BackupRecovery => "Infrastructure",
            Domain::Onboarding => "People Operations",
            Domain::Privacy => "Compliance",
        }
    }

    /// Control code assigned to findings this engine infers for the domain.
    pub fn control_code(&self) -> &'static str {
        match self {
            Domain::Governance => "CC1.1",
            Domain::AccessControl => "CC6.1",
            Domain::ChangeManagement => "CC8.1",
            Domain::SystemMonitoring => "CC7.2",
            Domain::IncidentResponse => "CC7.4",
            Domain::VendorManagement => "CC9.2",
            Domain::DataEncryption => "CC6.7",
            Domain::BackupRecovery => "A1.2",
            Domain::Onboarding => "CC1.4",
            Domain::Privacy => "P1.1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Operating,
    Deficient,
    Pending,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Operating => "operating",
            DomainStatus::Deficient => "deficient",
            DomainStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Operating,
    Deficient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFinding {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ControlStatus,
}

impl ControlFinding {
    fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        status: ControlStatus,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainAnalysis {
    pub domain: Domain,
    pub label: String,
    pub status: DomainStatus,
    pub owner: String,
    pub controls: Vec<ControlFinding>,
    pub evidence: Vec<String>,
}

/// Everything an analyzer may consult. Enrichment inputs are optional by
/// contract, not by accident.
pub struct DomainInputs<'a> {
    pub snapshot: &'a Map<String, Value>,
    pub site: Option<&'a SiteFacts>,
    pub accessibility: Option<&'a AccessibilitySignal>,
}

/// Where a backup capability was detected, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupSource {
    Snapshot,
    Extension,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSignal {
    pub source: BackupSource,
    pub mechanism: String,
}

/// First positive signal wins: snapshot descriptors, then extension names,
/// then host environment markers. All-negative is `None`, never an error.
pub fn detect_backup(
    snapshot: &Map<String, Value>,
    site: Option<&SiteFacts>,
) -> Option<BackupSignal> {
    for descriptor in normalize::storage_descriptors(snapshot) {
        let folded = descriptor.to_lowercase();
        if STORAGE_HINTS.iter().any(|hint| folded.contains(hint)) {
            return Some(BackupSignal {
                source: BackupSource::Snapshot,
                mechanism: descriptor,
            });
        }
    }
    if let Some(site) = site {
        for extension in &site.active_extensions {
            let folded = extension.name.to_lowercase();
            if BACKUP_EXTENSION_FRAGMENTS
                .iter()
                .any(|fragment| folded.contains(fragment))
            {
                return Some(BackupSignal {
                    source: BackupSource::Extension,
                    mechanism: extension.name.clone(),
                });
            }
        }
        if let Some(marker) = site.backup_env_markers.first() {
            return Some(BackupSignal {
                source: BackupSource::Environment,
                mechanism: marker.clone(),
            });
        }
    }
    None
}

/// Analyze all ten domains in enumeration order.
pub fn analyze_domains(inputs: &DomainInputs<'_>) -> Vec<DomainAnalysis> {
    Domain::ALL
        .iter()
        .map(|domain| analyze_domain(*domain, inputs))
        .collect()
}

fn analyze_domain(domain: Domain, inputs: &DomainInputs<'_>) -> DomainAnalysis {
    if let Some(explicit) = explicit_domain_data(domain, inputs.snapshot) {
        return explicit;
    }
    let (status, controls, evidence) = match domain {
        Domain::Governance => infer_governance(inputs),
        Domain::AccessControl => infer_tls_domain(
            inputs,
            domain,
            "Transport-layer access restriction",
            "Administrative and visitor sessions are served exclusively over TLS.",
            "Sessions are served without TLS; transport-level access restriction is not enforced.",
        ),
        Domain::ChangeManagement => infer_change_management(inputs),
        Domain::SystemMonitoring => infer_system_monitoring(inputs),
        Domain::IncidentResponse => infer_incident_response(inputs),
        Domain::VendorManagement => infer_vendor_management(inputs),
        Domain::DataEncryption => infer_tls_domain(
            inputs,
            domain,
            "Encryption in transit",
            "Data in transit is encrypted via TLS.",
            "Data in transit is unencrypted; TLS is not enabled.",
        ),
        Domain::BackupRecovery => infer_backup_recovery(inputs),
        Domain::Onboarding => infer_onboarding(inputs),
        Domain::Privacy => infer_privacy(inputs),
    };
    DomainAnalysis {
        domain,
        label: domain.label().to_string(),
        status,
        owner: owner_for(domain, inputs.snapshot),
        controls,
        evidence,
    }
}

type Inference = (DomainStatus, Vec<ControlFinding>, Vec<String>);

fn infer_governance(inputs: &DomainInputs<'_>) -> Inference {
    let profile = normalize::organization_profile(inputs.snapshot);
    if profile.name.is_empty() {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    }
    let control = ControlFinding::new(
        Domain::Governance.control_code(),
        "Organizational oversight",
        format!(
            "{} maintains a documented governance profile with the compliance vendor.",
            profile.name
        ),
        ControlStatus::Operating,
    );
    let mut evidence = vec!["Company profile published in vendor snapshot".to_string()];
    if !profile.industry.is_empty() {
        evidence.push(format!("Declared industry: {}", profile.industry));
    }
    (DomainStatus::Operating, vec![control], evidence)
}

fn infer_tls_domain(
    inputs: &DomainInputs<'_>,
    domain: Domain,
    control_name: &str,
    operating_text: &str,
    deficient_text: &str,
) -> Inference {
    match inputs.site {
        Some(site) if site.tls_enabled => (
            DomainStatus::Operating,
            vec![ControlFinding::new(
                domain.control_code(),
                control_name,
                operating_text,
                ControlStatus::Operating,
            )],
            vec!["TLS enabled at the web tier".to_string()],
        ),
        Some(_) => (
            DomainStatus::Deficient,
            vec![ControlFinding::new(
                domain.control_code(),
                control_name,
                deficient_text,
                ControlStatus::Deficient,
            )],
            Vec::new(),
        ),
        None => (
            DomainStatus::Deficient,
            vec![ControlFinding::new(
                domain.control_code(),
                control_name,
                "TLS state could not be verified on the host.",
                ControlStatus::Deficient,
            )],
            Vec::new(),
        ),
    }
}

fn infer_change_management(inputs: &DomainInputs<'_>) -> Inference {
    let version = inputs
        .site
        .map(|site| site.platform_version.trim().to_string())
        .unwrap_or_default();
    if version.is_empty() {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    }
    let control = ControlFinding::new(
        Domain::ChangeManagement.control_code(),
        "Managed platform releases",
        format!("Platform core is pinned at version {version} and updated through a managed release channel."),
        ControlStatus::Operating,
    );
    let evidence = vec![format!("Platform version {version} recorded by the site inventory")];
    (DomainStatus::Operating, vec![control], evidence)
}

fn infer_system_monitoring(inputs: &DomainInputs<'_>) -> Inference {
    let Some(signal) = inputs.accessibility else {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    };
    let coverage = signal
        .total
        .map(|total| format!("the latest audit covered {total} checks"))
        .unwrap_or_else(|| "audit records are being collected".to_string());
    let control = ControlFinding::new(
        Domain::SystemMonitoring.control_code(),
        "Continuous site monitoring",
        format!("Accessibility monitoring is active; {coverage}."),
        ControlStatus::Operating,
    );
    let evidence = vec![format!(
        "Audit record {} captured {}",
        signal.record_id,
        signal.recorded_at.to_rfc3339()
    )];
    (DomainStatus::Operating, vec![control], evidence)
}

fn infer_incident_response(inputs: &DomainInputs<'_>) -> Inference {
    let contact = [
        normalize::optional_string(inputs.snapshot.get("incident_contact")),
        normalize::optional_string(inputs.snapshot.get("escalation_contact")),
        normalize::optional_string(normalize::nested(inputs.snapshot, &["contacts", "security"])),
    ]
    .into_iter()
    .find(|candidate| !candidate.is_empty());
    let Some(contact) = contact else {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    };
    let control = ControlFinding::new(
        Domain::IncidentResponse.control_code(),
        "Incident escalation path",
        format!("Security incidents escalate to {contact}."),
        ControlStatus::Operating,
    );
    let evidence = vec!["Escalation contact published in vendor snapshot".to_string()];
    (DomainStatus::Operating, vec![control], evidence)
}

fn infer_vendor_management(inputs: &DomainInputs<'_>) -> Inference {
    let vendors = normalize::string_list(inputs.snapshot.get("vendors"));
    if vendors.is_empty() {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    }
    let control = ControlFinding::new(
        Domain::VendorManagement.control_code(),
        "Third-party register",
        format!(
            "{} third-party providers are tracked in the vendor register.",
            vendors.len()
        ),
        ControlStatus::Operating,
    );
    let evidence = vec![format!("Vendor register: {}", vendors.join(", "))];
    (DomainStatus::Operating, vec![control], evidence)
}

fn infer_backup_recovery(inputs: &DomainInputs<'_>) -> Inference {
    match detect_backup(inputs.snapshot, inputs.site) {
        Some(signal) => {
            let description = match signal.source {
                BackupSource::Snapshot => {
                    format!("Backups are provided by {}.", signal.mechanism)
                }
                BackupSource::Extension => format!(
                    "The {} extension provides scheduled site backups.",
                    signal.mechanism
                ),
                BackupSource::Environment => format!(
                    "Host-level backup tooling detected via {}.",
                    signal.mechanism
                ),
            };
            let control = ControlFinding::new(
                Domain::BackupRecovery.control_code(),
                "Backup and restoration capability",
                description,
                ControlStatus::Operating,
            );
            (
                DomainStatus::Operating,
                vec![control],
                vec![signal.mechanism],
            )
        }
        None => {
            let control = ControlFinding::new(
                Domain::BackupRecovery.control_code(),
                "Backup and restoration capability",
                "No backup or recovery capability was detected across the snapshot, installed extensions, or host environment.",
                ControlStatus::Deficient,
            );
            (DomainStatus::Deficient, vec![control], Vec::new())
        }
    }
}

fn infer_onboarding(inputs: &DomainInputs<'_>) -> Inference {
    let mut entries = normalize::string_list(inputs.snapshot.get("onboarding"));
    entries.extend(normalize::string_list(inputs.snapshot.get("training")));
    if entries.is_empty() {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    }
    let control = ControlFinding::new(
        Domain::Onboarding.control_code(),
        "Personnel onboarding and training",
        "Onboarding and security-training procedures are documented with the vendor.",
        ControlStatus::Operating,
    );
    (DomainStatus::Operating, vec![control], entries)
}

fn infer_privacy(inputs: &DomainInputs<'_>) -> Inference {
    let Some(signal) = inputs.accessibility else {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    };
    let Some(score) = signal.score else {
        return (DomainStatus::Pending, Vec::new(), Vec::new());
    };
    if score >= PRIVACY_SCORE_FLOOR {
        let control = ControlFinding::new(
            Domain::Privacy.control_code(),
            "Accessible data practices",
            format!("Latest accessibility audit scored {score:.1}, meeting the {PRIVACY_SCORE_FLOOR:.0}-point floor."),
            ControlStatus::Operating,
        );
        let evidence = vec![format!(
            "Accessibility audit {} scored {score:.1}",
            signal.record_id
        )];
        (DomainStatus::Operating, vec![control], evidence)
    } else {
        let control = ControlFinding::new(
            Domain::Privacy.control_code(),
            "Accessible data practices",
            format!("Latest accessibility audit scored {score:.1}, below the {PRIVACY_SCORE_FLOOR:.0}-point floor."),
            ControlStatus::Deficient,
        );
        (DomainStatus::Deficient, vec![control], Vec::new())
    }
}

fn owner_for(domain: Domain, snapshot: &Map<String, Value>) -> String {
    let explicit =
        normalize::optional_string(normalize::nested(snapshot, &["owners", domain.key()]));
    if explicit.is_empty() {
        domain.default_owner().to_string()
    } else {
        explicit
    }
}

/// Explicit snapshot data for a domain replaces inference entirely. Status
/// derives from the supplied controls: any deficient entry marks the domain
/// deficient; evidence without controls leaves it pending.
fn explicit_domain_data(domain: Domain, snapshot: &Map<String, Value>) -> Option<DomainAnalysis> {
    let controls_value = normalize::nested(snapshot, &["controls", domain.key()]);
    let evidence_value = normalize::nested(snapshot, &["evidence", domain.key()]);
    if controls_value.is_none() && evidence_value.is_none() {
        return None;
    }

    let controls: Vec<ControlFinding> = match controls_value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| explicit_control(domain, item))
            .collect(),
        Some(Value::String(_)) => normalize::string_list(controls_value)
            .into_iter()
            .map(|name| {
                ControlFinding::new(
                    domain.control_code(),
                    name.clone(),
                    name,
                    ControlStatus::Operating,
                )
            })
            .collect(),
        _ => Vec::new(),
    };
    let evidence = normalize::string_list(evidence_value);
    if controls.is_empty() && evidence.is_empty() {
        return None;
    }

    let status = if controls.is_empty() {
        DomainStatus::Pending
    } else if controls
        .iter()
        .any(|control| control.status == ControlStatus::Deficient)
    {
        DomainStatus::Deficient
    } else {
        DomainStatus::Operating
    };

    Some(DomainAnalysis {
        domain,
        label: domain.label().to_string(),
        status,
        owner: owner_for(domain, snapshot),
        controls,
        evidence,
    })
}

fn explicit_control(domain: Domain, value: &Value) -> Option<ControlFinding> {
    match value {
        Value::String(text) => {
            let name = text.trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(ControlFinding::new(
                domain.control_code(),
                name.clone(),
                name,
                ControlStatus::Operating,
            ))
        }
        Value::Object(object) => {
            let id = normalize::optional_string(object.get("id"));
            let id = if id.is_empty() {
                domain.control_code().to_string()
            } else {
                id
            };
            let name = {
                let name = normalize::optional_string(object.get("name"));
                if name.is_empty() {
                    normalize::optional_string(object.get("title"))
                } else {
                    name
                }
            };
            let name = if name.is_empty() { id.clone() } else { name };
            let description = {
                let description = normalize::optional_string(object.get("description"));
                if description.is_empty() {
                    name.clone()
                } else {
                    description
                }
            };
            let status_text = normalize::optional_string(object.get("status")).to_lowercase();
            let status = if matches!(status_text.as_str(), "deficient" | "failed" | "exception") {
                ControlStatus::Deficient
            } else {
                ControlStatus::Operating
            };
            Some(ControlFinding::new(id, name, description, status))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::Extension;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn site(tls: bool, extensions: &[&str]) -> SiteFacts {
        SiteFacts {
            platform_version: "6.5.3".to_string(),
            active_extensions: extensions
                .iter()
                .map(|name| Extension {
                    name: name.to_string(),
                    version: String::new(),
                })
                .collect(),
            active_theme: Extension::default(),
            tls_enabled: tls,
            debug_mode: false,
            backup_env_markers: Vec::new(),
        }
    }

    fn signal(score: f64) -> AccessibilitySignal {
        AccessibilitySignal {
            record_id: "abc123".to_string(),
            recorded_at: Utc::now(),
            target: "https://shop.example".to_string(),
            score: Some(score),
            passed: Some(10),
            total: Some(12),
            wcag: "Partially conformant".to_string(),
        }
    }

    fn find(analyses: &[DomainAnalysis], domain: Domain) -> &DomainAnalysis {
        analyses
            .iter()
            .find(|analysis| analysis.domain == domain)
            .expect("domain present")
    }

    #[test]
    fn tls_domains_follow_site_encryption_state() {
        let map = snapshot(json!({}));
        let secure = site(true, &[]);
        let inputs = DomainInputs {
            snapshot: &map,
            site: Some(&secure),
            accessibility: None,
        };
        let analyses = analyze_domains(&inputs);
        assert_eq!(
            find(&analyses, Domain::AccessControl).status,
            DomainStatus::Operating
        );
        assert_eq!(
            find(&analyses, Domain::DataEncryption).status,
            DomainStatus::Operating
        );

        let insecure = site(false, &[]);
        let inputs = DomainInputs {
            snapshot: &map,
            site: Some(&insecure),
            accessibility: None,
        };
        let analyses = analyze_domains(&inputs);
        let access = find(&analyses, Domain::AccessControl);
        assert_eq!(access.status, DomainStatus::Deficient);
        assert_eq!(access.controls.len(), 1);
        assert_eq!(access.controls[0].status, ControlStatus::Deficient);
    }

    #[test]
    fn backup_detection_prefers_snapshot_descriptors() {
        let map = snapshot(json!({"storage": ["AWS S3 Storage"]}));
        let with_extension = site(true, &["UpdraftPlus"]);
        let signal = detect_backup(&map, Some(&with_extension)).expect("signal");
        assert_eq!(signal.source, BackupSource::Snapshot);
        assert_eq!(signal.mechanism, "AWS S3 Storage");
    }

    #[test]
    fn backup_detection_falls_back_to_extensions_then_environment() {
        let empty = snapshot(json!({}));
        let with_extension = site(true, &["UpdraftPlus Premium"]);
        let signal = detect_backup(&empty, Some(&with_extension)).expect("signal");
        assert_eq!(signal.source, BackupSource::Extension);
        assert_eq!(signal.mechanism, "UpdraftPlus Premium");

        let mut env_site = site(true, &[]);
        env_site.backup_env_markers = vec!["RESTIC_REPOSITORY".to_string()];
        let signal = detect_backup(&empty, Some(&env_site)).expect("signal");
        assert_eq!(signal.source, BackupSource::Environment);
        assert_eq!(signal.mechanism, "RESTIC_REPOSITORY");

        assert!(detect_backup(&empty, Some(&site(true, &[]))).is_none());
    }

    #[test]
    fn missing_backup_is_deficient_with_a_finding() {
        let map = snapshot(json!({}));
        let bare = site(true, &[]);
        let inputs = DomainInputs {
            snapshot: &map,
            site: Some(&bare),
            accessibility: None,
        };
        let analyses = analyze_domains(&inputs);
        let backup = find(&analyses, Domain::BackupRecovery);
        assert_eq!(backup.status, DomainStatus::Deficient);
        assert!(backup.controls[0]
            .description
            .starts_with("No backup or recovery capability was detected"));
    }

    #[test]
    fn privacy_gates_on_the_score_floor() {
        let map = snapshot(json!({}));
        let healthy = signal(84.0);
        let inputs = DomainInputs {
            snapshot: &map,
            site: None,
            accessibility: Some(&healthy),
        };
        let analyses = analyze_domains(&inputs);
        assert_eq!(find(&analyses, Domain::Privacy).status, DomainStatus::Operating);
        assert_eq!(
            find(&analyses, Domain::SystemMonitoring).status,
            DomainStatus::Operating
        );

        let failing = signal(55.0);
        let inputs = DomainInputs {
            snapshot: &map,
            site: None,
            accessibility: Some(&failing),
        };
        let analyses = analyze_domains(&inputs);
        let privacy = find(&analyses, Domain::Privacy);
        assert_eq!(privacy.status, DomainStatus::Deficient);
        assert!(privacy.controls[0].description.contains("55.0"));
    }

    #[test]
    fn domains_without_signals_stay_pending_and_empty() {
        let map = snapshot(json!({}));
        let inputs = DomainInputs {
            snapshot: &map,
            site: None,
            accessibility: None,
        };
        let analyses = analyze_domains(&inputs);
        for domain in [
            Domain::Governance,
            Domain::ChangeManagement,
            Domain::SystemMonitoring,
            Domain::IncidentResponse,
            Domain::VendorManagement,
            Domain::Onboarding,
            Domain::Privacy,
        ] {
            let analysis = find(&analyses, domain);
            assert_eq!(analysis.status, DomainStatus::Pending, "{domain:?}");
            assert!(analysis.controls.is_empty());
            assert!(analysis.evidence.is_empty());
        }
    }

    #[test]
    fn explicit_snapshot_controls_override_inference() {
        let map = snapshot(json!({
            "controls": {
                "governance": [
                    {"id": "CC1.2", "name": "Board oversight", "status": "deficient"},
                    "Quarterly risk review"
                ]
            },
            "evidence": {"governance": ["Board minutes 2026-07"]},
            "owners": {"governance": "CISO Office"},
            "company": {"name": "Acme"}
        }));
        let inputs = DomainInputs {
            snapshot: &map,
            site: None,
            accessibility: None,
        };
        let governance = analyze_domains(&inputs)
            .into_iter()
            .find(|analysis| analysis.domain == Domain::Governance)
            .expect("governance");
        assert_eq!(governance.status, DomainStatus::Deficient);
        assert_eq!(governance.owner, "CISO Office");
        assert_eq!(governance.controls.len(), 2);
        assert_eq!(governance.controls[0].id, "CC1.2");
        assert_eq!(governance.controls[1].name, "Quarterly risk review");
        assert_eq!(governance.evidence, vec!["Board minutes 2026-07".to_string()]);
    }

    #[test]
    fn analyses_keep_fixed_enumeration_order() {
        let map = snapshot(json!({}));
        let inputs = DomainInputs {
            snapshot: &map,
            site: None,
            accessibility: None,
        };
        let order: Vec<Domain> = analyze_domains(&inputs)
            .iter()
            .map(|analysis| analysis.domain)
            .collect();
        assert_eq!(order, Domain::ALL.to_vec());
    }
}
