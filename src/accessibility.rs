//! Heuristic accessibility audit.
//!
//! Pattern-based checks over raw markup, no DOM and no browser. Fragments
//! (markup without an `<html>` element) skip the document-level checks so a
//! pasted widget snippet is not punished for lacking a `<head>`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BoxError;
use crate::history::{AuditRecord, EngineTag};

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("img pattern"));
static ALT_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\balt\s*="#).expect("alt pattern"));
static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("anchor pattern"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));
static ARIA_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\baria-label(ledby)?\s*="#).expect("aria pattern"));
static INPUT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<input\b[^>]*>").expect("input pattern"));
static EXEMPT_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\btype\s*=\s*["']?(hidden|submit|button|reset|image)"#)
        .expect("input type pattern")
});
static LABEL_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<label\b").expect("label pattern"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html\b").expect("html pattern"));
static HTML_LANG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<html\b[^>]*\blang\s*="#).expect("lang pattern"));
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("title pattern"));
static BUTTON_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<button\b([^>]*)>(.*?)</button>").expect("button pattern"));
static IFRAME_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<iframe\b[^>]*>").expect("iframe pattern"));
static TITLE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\btitle\s*="#).expect("title attr pattern"));
static POSITIVE_TABINDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\btabindex\s*=\s*["']?\s*[1-9][0-9]*"#).expect("tabindex pattern")
});
static FRAGMENT_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"(?is)<a\b[^>]*href\s*=\s*["'](#[^"']*)["'][^>]*>(.*?)</a>"##)
        .expect("fragment anchor pattern")
});
static VIEWPORT_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*name\s*=\s*["']viewport["'][^>]*>"#).expect("viewport pattern")
});
static ZOOM_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(user-scalable\s*=\s*(no|0)|maximum-scale\s*=\s*1(\.0*)?\b)")
        .expect("zoom pattern")
});
static TABLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<table\b").expect("table pattern"));
static TH_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<th\b").expect("th pattern"));
static HEADING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h([1-6])\b").expect("heading pattern"));

struct CheckEval {
    ok: bool,
    why: String,
    metrics: Value,
}

/// The fixed check table, evaluated in order on every audit.
const CHECKS: &[(&str, fn(&str, bool) -> CheckEval)] = &[
    ("img-alt", check_img_alt),
    ("anchor-text", check_anchor_text),
    ("form-label", check_form_label),
    ("html-lang", check_html_lang),
    ("doc-title", check_doc_title),
    ("button-name", check_button_name),
    ("iframe-title", check_iframe_title),
    ("tabindex", check_tabindex),
    ("skip-link", check_skip_link),
    ("viewport-zoom", check_viewport_zoom),
    ("table-headers", check_table_headers),
    ("heading-order", check_heading_order),
];

/// Check ids whose failure blocks assistive-technology users outright.
const BLOCKING_CHECKS: &[&str] = &["img-alt", "form-label", "button-name"];
/// Check ids contributing to the keyboard sub-score.
const KEYBOARD_CHECKS: &[&str] = &["tabindex", "skip-link"];
/// Check ids contributing to the screen-reader sub-score.
const SCREEN_READER_CHECKS: &[&str] = &[
    "img-alt",
    "anchor-text",
    "form-label",
    "iframe-title",
    "html-lang",
    "doc-title",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditCheck {
    pub id: String,
    pub ok: bool,
    pub why: String,
    pub metrics: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    pub passed: usize,
    pub total: usize,
    pub score: f64,
    pub error_density: f64,
    pub wcag_compliance: String,
    pub unique_issues: usize,
    pub user_impact: String,
    pub keyboard_accessibility_score: f64,
    pub screen_reader_compatibility: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub target: String,
    pub checks: Vec<AuditCheck>,
    pub summary: AuditSummary,
}

impl AuditOutcome {
    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} checks passed, score {:.1} ({})",
            self.summary.passed, self.summary.total, self.summary.score, self.summary.wcag_compliance
        )
    }
}

pub struct AccessibilityAuditor {
    client: reqwest::Client,
}

impl AccessibilityAuditor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch a page and audit its markup.
    pub async fn audit_url(&self, url: &str) -> Result<AuditOutcome, BoxError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let html = response.text().await?;
        Ok(self.audit_html(url, &html))
    }

    /// Pure audit of an in-hand document or fragment.
    pub fn audit_html(&self, target: &str, html: &str) -> AuditOutcome {
        audit_markup(target, html)
    }
}

pub fn audit_markup(target: &str, html: &str) -> AuditOutcome {
    let full_document = HTML_TAG.is_match(html);
    let checks: Vec<AuditCheck> = CHECKS
        .iter()
        .map(|(id, check)| {
            let eval = check(html, full_document);
            AuditCheck {
                id: id.to_string(),
                ok: eval.ok,
                why: eval.why,
                metrics: eval.metrics,
            }
        })
        .collect();
    let summary = summarize(&checks, html.len());
    AuditOutcome {
        target: target.to_string(),
        checks,
        summary,
    }
}

fn summarize(checks: &[AuditCheck], markup_bytes: usize) -> AuditSummary {
    let total = checks.len();
    let passed = checks.iter().filter(|check| check.ok).count();
    let issues = total - passed;
    let score = round1(passed as f64 / total.max(1) as f64 * 100.0);
    let kib = (markup_bytes as f64 / 1024.0).max(1.0);

    let blocking_failure = checks
        .iter()
        .any(|check| !check.ok && BLOCKING_CHECKS.contains(&check.id.as_str()));
    let user_impact = if blocking_failure {
        "High".to_string()
    } else if issues > 0 {
        "Moderate".to_string()
    } else {
        "Low".to_string()
    };

    AuditSummary {
        passed,
        total,
        score,
        error_density: round1(issues as f64 / kib),
        wcag_compliance: wcag_band(score).to_string(),
        unique_issues: issues,
        user_impact,
        keyboard_accessibility_score: subset_score(checks, KEYBOARD_CHECKS),
        screen_reader_compatibility: subset_score(checks, SCREEN_READER_CHECKS),
    }
}

fn wcag_band(score: f64) -> &'static str {
    if score >= 90.0 {
        "WCAG 2.1 AA aligned"
    } else if score >= 70.0 {
        "Partially conformant"
    } else {
        "Non-conformant"
    }
}

fn subset_score(checks: &[AuditCheck], ids: &[&str]) -> f64 {
    let relevant: Vec<_> = checks
        .iter()
        .filter(|check| ids.contains(&check.id.as_str()))
        .collect();
    if relevant.is_empty() {
        return 100.0;
    }
    let passed = relevant.iter().filter(|check| check.ok).count();
    round1(passed as f64 / relevant.len() as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn inner_text(markup: &str) -> String {
    ANY_TAG.replace_all(markup, " ").trim().to_string()
}

fn check_img_alt(html: &str, _full: bool) -> CheckEval {
    let mut images = 0usize;
    let mut missing = 0usize;
    for tag in IMG_TAG.find_iter(html) {
        images += 1;
        if !ALT_ATTR.is_match(tag.as_str()) {
            missing += 1;
        }
    }
    CheckEval {
        ok: missing == 0,
        why: if images == 0 {
            "no images present".to_string()
        } else if missing == 0 {
            format!("all {images} images carry alt text")
        } else {
            format!("{missing} of {images} images missing alt text")
        },
        metrics: json!({"images": images, "missing_alt": missing}),
    }
}

fn check_anchor_text(html: &str, _full: bool) -> CheckEval {
    let mut anchors = 0usize;
    let mut empty = 0usize;
    for capture in ANCHOR.captures_iter(html) {
        anchors += 1;
        let attrs = capture.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = capture.get(2).map(|m| m.as_str()).unwrap_or("");
        if inner_text(body).is_empty() && !ARIA_LABEL.is_match(attrs) {
            empty += 1;
        }
    }
    CheckEval {
        ok: empty == 0,
        why: if anchors == 0 {
            "no links present".to_string()
        } else if empty == 0 {
            format!("all {anchors} links have discernible text")
        } else {
            format!("{empty} of {anchors} links have no discernible text")
        },
        metrics: json!({"anchors": anchors, "empty": empty}),
    }
}

fn check_form_label(html: &str, _full: bool) -> CheckEval {
    let inputs = INPUT_TAG
        .find_iter(html)
        .filter(|tag| !EXEMPT_INPUT.is_match(tag.as_str()) && !ARIA_LABEL.is_match(tag.as_str()))
        .count();
    let labels = LABEL_TAG.find_iter(html).count();
    let unlabeled = inputs.saturating_sub(labels);
    CheckEval {
        ok: unlabeled == 0,
        why: if inputs == 0 {
            "no labelable form controls present".to_string()
        } else if unlabeled == 0 {
            format!("{labels} labels cover {inputs} form controls")
        } else {
            format!("{unlabeled} of {inputs} form controls lack an associated label")
        },
        metrics: json!({"inputs": inputs, "labels": labels, "unlabeled": unlabeled}),
    }
}

fn check_html_lang(html: &str, full: bool) -> CheckEval {
    if !full {
        return fragment_pass();
    }
    let ok = HTML_LANG.is_match(html);
    CheckEval {
        ok,
        why: if ok {
            "document declares a language".to_string()
        } else {
            "html element has no lang attribute".to_string()
        },
        metrics: json!({"declared": ok}),
    }
}

fn check_doc_title(html: &str, full: bool) -> CheckEval {
    if !full {
        return fragment_pass();
    }
    let titled = TITLE_TAG
        .captures(html)
        .map(|capture| !inner_text(capture.get(1).map(|m| m.as_str()).unwrap_or("")).is_empty())
        .unwrap_or(false);
    CheckEval {
        ok: titled,
        why: if titled {
            "document has a non-empty title".to_string()
        } else {
            "document title is missing or empty".to_string()
        },
        metrics: json!({"titled": titled}),
    }
}

fn check_button_name(html: &str, _full: bool) -> CheckEval {
    let mut buttons = 0usize;
    let mut nameless = 0usize;
    for capture in BUTTON_TAG.captures_iter(html) {
        buttons += 1;
        let attrs = capture.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = capture.get(2).map(|m| m.as_str()).unwrap_or("");
        if inner_text(body).is_empty() && !ARIA_LABEL.is_match(attrs) {
            nameless += 1;
        }
    }
    CheckEval {
        ok: nameless == 0,
        why: if buttons == 0 {
            "no buttons present".to_string()
        } else if nameless == 0 {
            format!("all {buttons} buttons expose a name")
        } else {
            format!("{nameless} of {buttons} buttons have no accessible name")
        },
        metrics: json!({"buttons": buttons, "nameless": nameless}),
    }
}

fn check_iframe_title(html: &str, _full: bool) -> CheckEval {
    let mut frames = 0usize;
    let mut untitled = 0usize;
    for tag in IFRAME_TAG.find_iter(html) {
        frames += 1;
        if !TITLE_ATTR.is_match(tag.as_str()) {
            untitled += 1;
        }
    }
    CheckEval {
        ok: untitled == 0,
        why: if frames == 0 {
            "no iframes present".to_string()
        } else if untitled == 0 {
            format!("all {frames} iframes are titled")
        } else {
            format!("{untitled} of {frames} iframes have no title")
        },
        metrics: json!({"iframes": frames, "untitled": untitled}),
    }
}

fn check_tabindex(html: &str, _full: bool) -> CheckEval {
    let positive = POSITIVE_TABINDEX.find_iter(html).count();
    CheckEval {
        ok: positive == 0,
        why: if positive == 0 {
            "no positive tabindex values".to_string()
        } else {
            format!("{positive} elements override focus order with a positive tabindex")
        },
        metrics: json!({"positive_tabindex": positive}),
    }
}

fn check_skip_link(html: &str, full: bool) -> CheckEval {
    if !full {
        return fragment_pass();
    }
    let found = FRAGMENT_ANCHOR.captures_iter(html).any(|capture| {
        let href = capture.get(1).map(|m| m.as_str()).unwrap_or("");
        let text = inner_text(capture.get(2).map(|m| m.as_str()).unwrap_or("")).to_lowercase();
        text.contains("skip") || href == "#main" || href == "#content"
    });
    CheckEval {
        ok: found,
        why: if found {
            "skip-navigation link present".to_string()
        } else {
            "no skip-navigation link found".to_string()
        },
        metrics: json!({"skip_link": found}),
    }
}

fn check_viewport_zoom(html: &str, _full: bool) -> CheckEval {
    let blocked = VIEWPORT_META
        .find(html)
        .map(|tag| ZOOM_BLOCK.is_match(tag.as_str()))
        .unwrap_or(false);
    CheckEval {
        ok: !blocked,
        why: if blocked {
            "viewport meta disables user zoom".to_string()
        } else {
            "user zoom is not restricted".to_string()
        },
        metrics: json!({"zoom_blocked": blocked}),
    }
}

fn check_table_headers(html: &str, _full: bool) -> CheckEval {
    let tables = TABLE_TAG.find_iter(html).count();
    let headed = tables == 0 || TH_TAG.is_match(html);
    CheckEval {
        ok: headed,
        why: if tables == 0 {
            "no tables present".to_string()
        } else if headed {
            format!("{tables} tables declare header cells")
        } else {
            format!("{tables} tables lack header cells")
        },
        metrics: json!({"tables": tables, "headed": headed}),
    }
}

fn check_heading_order(html: &str, _full: bool) -> CheckEval {
    let mut previous = 0u32;
    let mut jumps = 0usize;
    let mut headings = 0usize;
    for capture in HEADING_TAG.captures_iter(html) {
        headings += 1;
        let level: u32 = capture
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1);
        if previous != 0 && level > previous + 1 {
            jumps += 1;
        }
        previous = level;
    }
    CheckEval {
        ok: jumps == 0,
        why: if headings == 0 {
            "no headings present".to_string()
        } else if jumps == 0 {
            format!("{headings} headings descend without skipping levels")
        } else {
            format!("{jumps} heading level skips across {headings} headings")
        },
        metrics: json!({"headings": headings, "skips": jumps}),
    }
}

fn fragment_pass() -> CheckEval {
    CheckEval {
        ok: true,
        why: "fragment without a document root; check skipped".to_string(),
        metrics: json!({"fragment": true}),
    }
}

/// The slice of an accessibility record the report engine consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessibilitySignal {
    pub record_id: String,
    pub recorded_at: DateTime<Utc>,
    pub target: String,
    pub score: Option<f64>,
    pub passed: Option<u64>,
    pub total: Option<u64>,
    pub wcag: String,
}

impl AccessibilitySignal {
    /// Lift the signal out of a persisted record. Only accessibility-tagged
    /// records qualify; a record without a summary still counts as a signal,
    /// just an unscored one.
    pub fn from_record(record: &AuditRecord) -> Option<Self> {
        if record.engine != EngineTag::Accessibility {
            return None;
        }
        let summary = record.payload.get("summary");
        Some(Self {
            record_id: record.id.clone(),
            recorded_at: record.created_at,
            target: record.target.clone(),
            score: summary.and_then(|s| s.get("score")).and_then(Value::as_f64),
            passed: summary.and_then(|s| s.get("passed")).and_then(Value::as_u64),
            total: summary.and_then(|s| s.get("total")).and_then(Value::as_u64),
            wcag: summary
                .and_then(|s| s.get("wcag_compliance"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_DOCUMENT: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Storefront</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <a class="skip" href="#main">Skip to content</a>
  <h1>Shop</h1>
  <h2>Featured</h2>
  <img src="hero.png" alt="Featured products">
  <form><label for="q">Search</label><input id="q" type="text"></form>
  <button>Add to cart</button>
  <table><tr><th>Item</th></tr><tr><td>Socks</td></tr></table>
  <a href="/cart">View cart</a>
  <main id="main"></main>
</body>
</html>"##;

    const BROKEN_DOCUMENT: &str = r#"<html>
<body>
  <img src="x.png">
  <a href="/cart"></a>
  <h1>Title</h1>
  <h4>Jump</h4>
  <input type="text">
  <table><tr><td>1</td></tr></table>
  <div tabindex="5">x</div>
  <iframe src="embed.html"></iframe>
  <button></button>
</body>
</html>"#;

    #[test]
    fn clean_document_passes_every_check() {
        let outcome = audit_markup("https://shop.example", CLEAN_DOCUMENT);
        let failed: Vec<_> = outcome
            .checks
            .iter()
            .filter(|check| !check.ok)
            .map(|check| check.id.clone())
            .collect();
        assert!(failed.is_empty(), "unexpected failures: {failed:?}");
        assert_eq!(outcome.summary.score, 100.0);
        assert_eq!(outcome.summary.wcag_compliance, "WCAG 2.1 AA aligned");
        assert_eq!(outcome.summary.user_impact, "Low");
        assert_eq!(outcome.summary.keyboard_accessibility_score, 100.0);
    }

    #[test]
    fn broken_document_flags_expected_checks() {
        let outcome = audit_markup("https://shop.example", BROKEN_DOCUMENT);
        let failed: Vec<&str> = outcome
            .checks
            .iter()
            .filter(|check| !check.ok)
            .map(|check| check.id.as_str())
            .collect();
        for expected in [
            "img-alt",
            "anchor-text",
            "form-label",
            "html-lang",
            "doc-title",
            "button-name",
            "iframe-title",
            "tabindex",
            "skip-link",
            "table-headers",
            "heading-order",
        ] {
            assert!(failed.contains(&expected), "{expected} should fail");
        }
        assert!(outcome.summary.score < 70.0);
        assert_eq!(outcome.summary.wcag_compliance, "Non-conformant");
        assert_eq!(outcome.summary.user_impact, "High");
        assert_eq!(
            outcome.summary.passed + outcome.summary.unique_issues,
            outcome.summary.total
        );
    }

    #[test]
    fn fragments_skip_document_level_checks() {
        let outcome = audit_markup("widget", "<div><img src=\"x.png\" alt=\"diagram\"></div>");
        for id in ["html-lang", "doc-title", "skip-link"] {
            let check = outcome
                .checks
                .iter()
                .find(|check| check.id == id)
                .expect("check present");
            assert!(check.ok, "{id} should pass for fragments");
        }
    }

    #[test]
    fn zoom_blocking_viewport_fails() {
        let html = r##"<html lang="en"><head><title>T</title>
            <meta name="viewport" content="width=device-width, user-scalable=no"></head>
            <body><a href="#main">Skip</a><main id="main"></main></body></html>"##;
        let outcome = audit_markup("page", html);
        let viewport = outcome
            .checks
            .iter()
            .find(|check| check.id == "viewport-zoom")
            .expect("check present");
        assert!(!viewport.ok);
    }

    #[test]
    fn signal_lifts_from_accessibility_records_only() {
        let record = AuditRecord::new(
            EngineTag::Accessibility,
            "https://shop.example",
            "audit",
            serde_json::json!({"summary": {"score": 64.5, "passed": 8, "total": 12, "wcag_compliance": "Non-conformant"}}),
        );
        let signal = AccessibilitySignal::from_record(&record).expect("signal");
        assert_eq!(signal.score, Some(64.5));
        assert_eq!(signal.passed, Some(8));
        assert_eq!(signal.wcag, "Non-conformant");

        let soc2 = AuditRecord::new(EngineTag::Soc2, "x", "report", serde_json::json!({}));
        assert!(AccessibilitySignal::from_record(&soc2).is_none());
    }
}
