//! Report file exports.
//!
//! A run is exported as three artifacts side by side: the full JSON document,
//! the markdown narrative, and a flat CSV of the control matrix for
//! spreadsheet review.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::report::Report;

#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub report_json: PathBuf,
    pub narrative_md: PathBuf,
    pub controls_csv: PathBuf,
}

pub fn write_report_outputs(report: &Report, output_dir: &Path) -> Result<ExportPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let report_json = output_dir.join("report.json");
    let encoded = serde_json::to_string_pretty(report).context("failed to encode report")?;
    fs::write(&report_json, encoded)
        .with_context(|| format!("failed to write {}", report_json.display()))?;

    let narrative_md = output_dir.join("narrative.md");
    fs::write(&narrative_md, &report.documents.narrative)
        .with_context(|| format!("failed to write {}", narrative_md.display()))?;

    let controls_csv = output_dir.join("controls.csv");
    let mut writer = csv::Writer::from_path(&controls_csv)
        .with_context(|| format!("failed to open {}", controls_csv.display()))?;
    writer
        .write_record([
            "domain",
            "label",
            "owner",
            "status",
            "controls",
            "evidence_count",
            "aligned_criteria",
        ])
        .context("failed to write csv header")?;
    for row in &report.control_environment.matrix {
        let controls = row.controls.iter().join("; ");
        let evidence_count = row.evidence.len().to_string();
        let criteria = row
            .aligned_criteria
            .iter()
            .map(|criterion| criterion.as_str())
            .join("; ");
        writer
            .write_record([
                row.domain.key(),
                row.label.as_str(),
                row.owner.as_str(),
                row.status.as_str(),
                controls.as_str(),
                evidence_count.as_str(),
                criteria.as_str(),
            ])
            .context("failed to write csv row")?;
    }
    writer.flush().context("failed to flush csv")?;

    Ok(ExportPaths {
        report_json,
        narrative_md,
        controls_csv,
    })
}
