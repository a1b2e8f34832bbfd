use serde::{Deserialize, Serialize};

/// The five trust-services criteria a SOC 2 engagement can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrustCriterion {
    Security,
    Availability,
    #[serde(rename = "Processing Integrity")]
    ProcessingIntegrity,
    Confidentiality,
    Privacy,
}

impl TrustCriterion {
    pub const ALL: [TrustCriterion; 5] = [
        TrustCriterion::Security,
        TrustCriterion::Availability,
        TrustCriterion::ProcessingIntegrity,
        TrustCriterion::Confidentiality,
        TrustCriterion::Privacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustCriterion::Security => "Security",
            TrustCriterion::Availability => "Availability",
            TrustCriterion::ProcessingIntegrity => "Processing Integrity",
            TrustCriterion::Confidentiality => "Confidentiality",
            TrustCriterion::Privacy => "Privacy",
        }
    }

    /// Fixed engagement objective attached to the criterion in the
    /// trust-services section of every report.
    pub fn objective(&self) -> &'static str {
        match self {
            TrustCriterion::Security => {
                "Systems are protected against unauthorized access, disclosure, and damage."
            }
            TrustCriterion::Availability => {
                "Systems are available for operation and use as committed or agreed."
            }
            TrustCriterion::ProcessingIntegrity => {
                "System processing is complete, valid, accurate, timely, and authorized."
            }
            TrustCriterion::Confidentiality => {
                "Information designated as confidential is protected as committed or agreed."
            }
            TrustCriterion::Privacy => {
                "Personal information is collected, used, retained, and disclosed in conformity with commitments."
            }
        }
    }

    /// Case-insensitive lookup against the fixed vocabulary. Underscores and
    /// runs of whitespace fold to a single space before matching, so
    /// `processing_integrity` and `PROCESSING  INTEGRITY` both resolve.
    /// Anything outside the vocabulary yields `None`.
    pub fn parse(label: &str) -> Option<TrustCriterion> {
        let folded = label
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match folded.as_str() {
            "security" => Some(TrustCriterion::Security),
            "availability" => Some(TrustCriterion::Availability),
            "processing integrity" => Some(TrustCriterion::ProcessingIntegrity),
            "confidentiality" => Some(TrustCriterion::Confidentiality),
            "privacy" => Some(TrustCriterion::Privacy),
            _ => None,
        }
    }

    /// Selection applied when the snapshot carries no valid trust-services
    /// data at all.
    pub fn default_selection() -> Vec<TrustCriterion> {
        vec![
            TrustCriterion::Security,
            TrustCriterion::Availability,
            TrustCriterion::Confidentiality,
        ]
    }
}
