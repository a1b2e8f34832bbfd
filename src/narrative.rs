//! Markdown narrative rendering.
//!
//! Every value that originated outside this process (snapshot fields, site
//! inventory, audit payloads) passes through [`sanitize`] before it is
//! interpolated, so hostile markup in a vendor payload cannot survive into
//! the rendered document. Empty sections are omitted; the header and the
//! closing line always render.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domains::DomainStatus;
use crate::report::{Report, ENGINE_NAME};

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script pattern"));
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("style pattern"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("space pattern"));

/// Strip script and style blocks with their contents, drop remaining tags,
/// and collapse whitespace runs to single spaces.
pub fn sanitize(input: &str) -> String {
    let stripped = SCRIPT_BLOCK.replace_all(input, " ");
    let stripped = STYLE_BLOCK.replace_all(&stripped, " ");
    let stripped = ANY_TAG.replace_all(&stripped, " ");
    WHITESPACE_RUN.replace_all(&stripped, " ").trim().to_string()
}

/// Three to four sentence summary used both standalone and as the narrative's
/// second section.
pub fn executive_summary(report: &Report) -> String {
    let subject = {
        let name = sanitize(&report.organization.name);
        if name.is_empty() {
            "The organization".to_string()
        } else {
            name
        }
    };
    let criteria = report
        .trust_services
        .iter()
        .map(|section| section.criterion.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let operating = report
        .control_environment
        .domains
        .iter()
        .filter(|analysis| analysis.status == DomainStatus::Operating)
        .count();
    let total = report.control_environment.domains.len();

    let gaps = &report.risk_assessment.gaps;
    let high = gaps
        .iter()
        .filter(|risk| risk.severity == crate::risk::Severity::High)
        .count();
    let risk_sentence = match (gaps.len(), high) {
        (0, _) => "No significant risks were identified.".to_string(),
        (1, 0) => "One risk requires attention before the audit window.".to_string(),
        (1, _) => {
            "One high-severity risk requires remediation before the audit window.".to_string()
        }
        (count, 0) => format!("{count} risks require attention before the audit window."),
        (count, high) => {
            format!("{count} risks require attention, including {high} rated high severity.")
        }
    };

    format!(
        "{subject} engaged in a SOC 2 readiness assessment covering the {criteria} trust service criteria over a {days}-day observation period. \
{operating} of {total} control domains are operating effectively. {risk_sentence} {readiness}.",
        days = report.control_tests.period.days,
        readiness = report.risk_assessment.readiness
    )
}

/// Render the full markdown narrative in fixed section order.
pub fn render(report: &Report) -> String {
    let mut sections: Vec<String> = vec![header(report)];

    push_section(
        &mut sections,
        "Executive Summary",
        vec![report.documents.executive_summary.clone()],
    );
    push_section(&mut sections, "System Description", system_lines(report));
    push_section(
        &mut sections,
        "Control Environment",
        control_environment_lines(report),
    );
    push_section(
        &mut sections,
        "Tests of Operating Effectiveness",
        test_lines(report),
    );
    push_section(&mut sections, "Risk Assessment", risk_lines(report));
    push_section(&mut sections, "Auditor's Report", auditor_lines(report));
    push_section(&mut sections, "Supporting Artifacts", artifact_lines(report));
    push_section(
        &mut sections,
        "Accessibility Findings",
        accessibility_lines(report),
    );
    push_section(
        &mut sections,
        "Technical Infrastructure",
        infrastructure_lines(report),
    );

    sections.push(closing(report));
    sections.join("\n\n")
}

fn push_section(sections: &mut Vec<String>, title: &str, lines: Vec<String>) {
    let body = lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if body.is_empty() {
        return;
    }
    sections.push(format!("## {title}\n\n{body}"));
}

fn header(report: &Report) -> String {
    let organization = {
        let name = sanitize(&report.organization.name);
        if name.is_empty() {
            "Not specified".to_string()
        } else {
            name
        }
    };
    let criteria = report
        .trust_services
        .iter()
        .map(|section| section.criterion.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let period = &report.control_tests.period;
    format!(
        "# SOC 2 Readiness Report\n\n\
- Organization: {organization}\n\
- Generated: {generated}\n\
- Engine: {engine} v{version}\n\
- Observation period: {start} to {end} ({days} days)\n\
- Trust services in scope: {criteria}",
        generated = report.meta.generated_at.format("%Y-%m-%d %H:%M UTC"),
        engine = report.meta.engine,
        version = report.meta.engine_version,
        start = period.start.format("%Y-%m-%d"),
        end = period.end.format("%Y-%m-%d"),
        days = period.days,
    )
}

fn system_lines(report: &Report) -> Vec<String> {
    let mut lines = vec![sanitize(&report.system_description.overview)];
    let hosting = sanitize(&report.system_description.hosting);
    if !hosting.is_empty() {
        lines.push(format!("Hosting: {hosting}"));
    }
    if !report.system_description.components.is_empty() {
        lines.push("Key system components:".to_string());
        for component in &report.system_description.components {
            lines.push(format!("- {}", sanitize(component)));
        }
    }
    lines
}

fn control_environment_lines(report: &Report) -> Vec<String> {
    report
        .control_environment
        .matrix
        .iter()
        .map(|row| {
            let controls = if row.controls.is_empty() {
                "none documented".to_string()
            } else {
                row.controls.join(", ")
            };
            let criteria = if row.aligned_criteria.is_empty() {
                "out of selected scope".to_string()
            } else {
                row.aligned_criteria
                    .iter()
                    .map(|criterion| criterion.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!(
                "- **{label}** ({owner}): {status}. Controls: {controls}. Criteria: {criteria}.",
                label = sanitize(&row.label),
                owner = sanitize(&row.owner),
                status = row.status.as_str(),
            )
        })
        .collect()
}

fn test_lines(report: &Report) -> Vec<String> {
    let mut lines = Vec::new();
    for procedure in &report.control_tests.procedures {
        lines.push(format!(
            "- {}: {}",
            procedure.domain.label(),
            procedure.outcome
        ));
    }
    lines.push(format!(
        "{} evidence items were inspected across all domains.",
        report.control_tests.evidence_total
    ));
    lines
}

fn risk_lines(report: &Report) -> Vec<String> {
    if report.risk_assessment.gaps.is_empty() {
        return vec!["No significant risks were identified during this assessment.".to_string()];
    }
    let mut lines: Vec<String> = report
        .risk_assessment
        .gaps
        .iter()
        .map(|risk| {
            format!(
                "- **{id}** ({severity}): {title}. {description} Remediation: {action} (due within {due} days).",
                id = risk.id,
                severity = risk.severity.as_str(),
                title = sanitize(&risk.title),
                description = sanitize(&risk.description),
                action = sanitize(&risk.remediation),
                due = risk.severity.due_days(),
            )
        })
        .collect();
    lines.push(format!(
        "Overall readiness: {}.",
        report.risk_assessment.readiness
    ));
    lines
}

fn auditor_lines(report: &Report) -> Vec<String> {
    vec![format!(
        "Opinion: **{}**. {}",
        report.auditor.opinion, report.auditor.basis
    )]
}

fn artifact_lines(report: &Report) -> Vec<String> {
    report
        .artifacts
        .iter()
        .map(|artifact| {
            let reference = sanitize(&artifact.reference);
            if reference.is_empty() {
                format!(
                    "- {} ({})",
                    sanitize(&artifact.name),
                    sanitize(&artifact.kind)
                )
            } else {
                format!(
                    "- {} ({}): {reference}",
                    sanitize(&artifact.name),
                    sanitize(&artifact.kind)
                )
            }
        })
        .collect()
}

fn accessibility_lines(report: &Report) -> Vec<String> {
    let Some(signal) = &report.inputs.accessibility else {
        return Vec::new();
    };
    let mut lines = vec![format!(
        "Latest automated accessibility audit of {}:",
        sanitize(&signal.target)
    )];
    match signal.score {
        Some(score) => lines.push(format!(
            "- Score: {score:.1} ({})",
            sanitize(&signal.wcag)
        )),
        None => lines.push("- Score: not available".to_string()),
    }
    if let (Some(passed), Some(total)) = (signal.passed, signal.total) {
        lines.push(format!("- Checks passed: {passed} of {total}"));
    }
    lines.push(format!(
        "- Recorded: {} (record {})",
        signal.recorded_at.format("%Y-%m-%d"),
        sanitize(&signal.record_id)
    ));
    lines
}

fn infrastructure_lines(report: &Report) -> Vec<String> {
    let Some(site) = &report.inputs.site else {
        return Vec::new();
    };
    let platform = {
        let version = sanitize(&site.platform_version);
        if version.is_empty() {
            "unknown".to_string()
        } else {
            version
        }
    };
    let mut lines = vec![
        format!("- Platform version: {platform}"),
        format!(
            "- Transport security: {}",
            if site.tls_enabled {
                "TLS enabled"
            } else {
                "TLS not enabled"
            }
        ),
        format!(
            "- Debug mode: {}",
            if site.debug_mode { "on" } else { "off" }
        ),
    ];
    let theme = sanitize(&site.active_theme.name);
    if !theme.is_empty() {
        lines.push(format!("- Active theme: {theme}"));
    }
    lines.push(format!(
        "- Active extensions: {}",
        site.active_extensions.len()
    ));
    lines
}

fn closing(report: &Report) -> String {
    format!(
        "*Prepared by {ENGINE_NAME} v{version} on {date}. This readiness report supports audit preparation and is not an attestation.*",
        version = report.meta.engine_version,
        date = report.meta.generated_at.format("%Y-%m-%d"),
    )
}
