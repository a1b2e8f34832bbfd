//! Control matrix assembly.
//!
//! Each domain carries a fixed set of trust-service criteria it can serve.
//! A matrix row aligns a domain with the intersection of that fixed set and
//! the criteria the caller selected, preserving selection order. An empty
//! intersection is a valid row state, not an error.

use serde::{Deserialize, Serialize};

use crate::domains::{Domain, DomainAnalysis, DomainStatus};
use crate::trust::TrustCriterion;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRow {
    pub domain: Domain,
    pub label: String,
    pub owner: String,
    pub status: DomainStatus,
    pub controls: Vec<String>,
    pub evidence: Vec<String>,
    pub aligned_criteria: Vec<TrustCriterion>,
}

/// Criteria a domain is able to serve, independent of the current selection.
pub fn domain_criteria(domain: Domain) -> &'static [TrustCriterion] {
    match domain {
        Domain::Governance => &[TrustCriterion::Security],
        Domain::AccessControl => &[TrustCriterion::Security, TrustCriterion::Confidentiality],
        Domain::ChangeManagement => {
            &[TrustCriterion::Security, TrustCriterion::ProcessingIntegrity]
        }
        Domain::SystemMonitoring => &[TrustCriterion::Security, TrustCriterion::Availability],
        Domain::IncidentResponse => &[TrustCriterion::Security, TrustCriterion::Availability],
        Domain::VendorManagement => &[TrustCriterion::Security, TrustCriterion::Confidentiality],
        Domain::DataEncryption => &[
            TrustCriterion::Security,
            TrustCriterion::Confidentiality,
            TrustCriterion::Privacy,
        ],
        Domain::BackupRecovery => &[TrustCriterion::Availability],
        Domain::Onboarding => &[TrustCriterion::Security],
        Domain::Privacy => &[TrustCriterion::Privacy, TrustCriterion::Confidentiality],
    }
}

/// One row per analyzed domain, in the order the analyses arrive.
pub fn build_matrix(
    domains: &[DomainAnalysis],
    selected: &[TrustCriterion],
) -> Vec<MatrixRow> {
    domains
        .iter()
        .map(|analysis| {
            let capable = domain_criteria(analysis.domain);
            let aligned = selected
                .iter()
                .copied()
                .filter(|criterion| capable.contains(criterion))
                .collect();
            MatrixRow {
                domain: analysis.domain,
                label: analysis.label.clone(),
                owner: analysis.owner.clone(),
                status: analysis.status,
                controls: analysis
                    .controls
                    .iter()
                    .map(|control| control.id.clone())
                    .collect(),
                evidence: analysis.evidence.clone(),
                aligned_criteria: aligned,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{analyze_domains, DomainInputs};
    use serde_json::{json, Map, Value};

    fn analyses() -> Vec<DomainAnalysis> {
        let map: Map<String, Value> = json!({"company": {"name": "Acme"}})
            .as_object()
            .cloned()
            .unwrap_or_default();
        let inputs = DomainInputs {
            snapshot: &map,
            site: None,
            accessibility: None,
        };
        analyze_domains(&inputs)
    }

    fn row(rows: &[MatrixRow], domain: Domain) -> &MatrixRow {
        rows.iter().find(|row| row.domain == domain).expect("row")
    }

    #[test]
    fn default_selection_aligns_by_fixed_table() {
        let rows = build_matrix(&analyses(), &TrustCriterion::default_selection());
        assert_eq!(rows.len(), 10);
        assert_eq!(
            row(&rows, Domain::Governance).aligned_criteria,
            vec![TrustCriterion::Security]
        );
        assert_eq!(
            row(&rows, Domain::BackupRecovery).aligned_criteria,
            vec![TrustCriterion::Availability]
        );
        assert_eq!(
            row(&rows, Domain::DataEncryption).aligned_criteria,
            vec![TrustCriterion::Security, TrustCriterion::Confidentiality]
        );
    }

    #[test]
    fn alignment_preserves_selection_order() {
        let selected = vec![TrustCriterion::Privacy, TrustCriterion::Security];
        let rows = build_matrix(&analyses(), &selected);
        assert_eq!(
            row(&rows, Domain::DataEncryption).aligned_criteria,
            vec![TrustCriterion::Privacy, TrustCriterion::Security]
        );
    }

    #[test]
    fn disjoint_selection_leaves_alignment_empty() {
        let selected = vec![TrustCriterion::ProcessingIntegrity];
        let rows = build_matrix(&analyses(), &selected);
        assert!(row(&rows, Domain::BackupRecovery).aligned_criteria.is_empty());
        assert_eq!(
            row(&rows, Domain::ChangeManagement).aligned_criteria,
            vec![TrustCriterion::ProcessingIntegrity]
        );
    }

    #[test]
    fn rows_carry_control_ids_and_owners() {
        let rows = build_matrix(&analyses(), &TrustCriterion::default_selection());
        let governance = row(&rows, Domain::Governance);
        assert_eq!(governance.owner, "Leadership");
        assert_eq!(governance.controls, vec!["CC1.1".to_string()]);
        assert_eq!(governance.status, DomainStatus::Operating);
    }
}
