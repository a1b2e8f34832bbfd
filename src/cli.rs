use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use crate::accessibility::{AccessibilityAuditor, AuditOutcome};
use crate::config::EngineConfig;
use crate::error::BoxError;
use crate::history::{AuditRecord, EngineTag, HistoryStore, SqliteHistoryStore};
use crate::report::{generate_report, Report, SynthesisContext};
use crate::reporting::write_report_outputs;
use crate::risk::{Risk, Severity};
use crate::run_full_report;

// ============================================================================
// TERMINAL DESIGN - ASCII Art & Branding
// ============================================================================

const COMPLYMAP_LOGO: &str = r#"
   ______                      __      __  ___
  / ____/___  ____ ___  ____  / /_  __/  |/  /___ _____
 / /   / __ \/ __ `__ \/ __ \/ / / / / /|_/ / __ `/ __ \
/ /___/ /_/ / / / / / / /_/ / / /_/ / /  / / /_/ / /_/ /
\____/\____/_/ /_/ /_/ .___/_/\__, /_/  /_/\__,_/ .___/
                    /_/      /____/            /_/
"#;

const TAGLINE: &str = "SOC 2 Readiness & Accessibility Compliance Engine";
const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI STRUCTURE
// ============================================================================

#[derive(Parser)]
#[command(name = "complymap")]
#[command(version = VERSION)]
#[command(about = "SOC 2 readiness reporting powered by Rust", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Show help information
    #[arg(short = 'h', long = "help")]
    help: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an accessibility audit against a URL or local HTML file
    Audit {
        /// Target URL to fetch and audit
        #[arg(short, long, required_unless_present = "file")]
        url: Option<String>,

        /// Audit a local HTML file instead of fetching
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the audit outcome as JSON
        #[arg(long)]
        json: bool,

        /// Skip writing the outcome to audit history
        #[arg(long)]
        no_store: bool,
    },

    /// Generate SOC 2 readiness reports
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },

    /// List recorded audit runs, newest first
    History {
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u64,

        /// Records per page
        #[arg(long, default_value_t = 10)]
        per_page: u64,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a recorded report as JSON, markdown, and CSV
    Export {
        /// Record id to export; defaults to the latest soc2 run
        #[arg(short, long)]
        record: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "complymap-output")]
        out: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ReportAction {
    /// Fetch a fresh vendor snapshot and run the full pipeline
    Run {
        /// Directory to export report artifacts into
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the full bundle as JSON
        #[arg(long)]
        json: bool,
    },

    /// Synthesize from a local snapshot file without fetching or persisting
    Preview {
        /// Path to a snapshot JSON document
        snapshot: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// TERMINAL UI
// ============================================================================

struct TerminalUI;

impl TerminalUI {
    /// Display introduction with branding
    fn show_intro() {
        print!("\x1B[2J\x1B[1;1H");

        println!("{}", COMPLYMAP_LOGO.bright_cyan().bold());

        println!("{}", "═".repeat(70).bright_black());
        println!("{:^70}", TAGLINE.bright_white().bold());
        println!(
            "{:^70}",
            format!("v{} • Powered by Rust 🦀", VERSION).bright_black()
        );
        println!("{}", "═".repeat(70).bright_black());
        println!();

        println!("  {}  Vendor Compliance Snapshots", "🔍".bright_yellow());
        println!("  {}  Automated Accessibility Audits", "♿".bright_blue());
        println!("  {}  SOC 2 Readiness Reports", "📋".bright_green());
        println!("  {}  Append-Only Audit History", "🗂".bright_red());
        println!();
        println!("{}", "─".repeat(70).bright_black());
        println!();
    }

    fn show_help() {
        Self::show_intro();

        println!("{}", "USAGE:".bright_white().bold());
        println!("  complymap <COMMAND> [OPTIONS]");
        println!();

        println!("{}", "COMMANDS:".bright_white().bold());
        Self::print_command("audit", "", "Run an accessibility audit");
        Self::print_command("report run", "", "Fetch a snapshot and build a report");
        Self::print_command("report preview", "", "Build a report from a local snapshot");
        Self::print_command("history", "", "List recorded audit runs");
        Self::print_command("export", "", "Export a recorded report to files");
        Self::print_command("version", "", "Show version information");
        println!();

        println!("{}", "OPTIONS:".bright_white().bold());
        println!("  {} Enable verbose logging", "-v, --verbose".bright_cyan());
        println!("  {} Show help information", "-h, --help".bright_cyan());
        println!();

        println!("{}", "EXAMPLES:".bright_white().bold());
        println!("  {} Audit a storefront", "→".bright_green());
        println!(
            "    {}",
            "complymap audit --url https://shop.example".bright_yellow()
        );
        println!();
        println!("  {} Run the full report pipeline", "→".bright_green());
        println!(
            "    {}",
            "COMPLYMAP_LICENSE_KEY=lk_... complymap report run --out ./reports".bright_yellow()
        );
        println!();
        println!("  {} Preview without network access", "→".bright_green());
        println!(
            "    {}",
            "complymap report preview snapshot.json".bright_yellow()
        );
        println!();

        println!("{}", "LEARN MORE:".bright_white().bold());
        println!(
            "  Documentation: {}",
            "https://complymap.io/docs".bright_blue().underline()
        );
        println!(
            "  GitHub: {}",
            "https://github.com/complymap/complymap"
                .bright_blue()
                .underline()
        );
        println!();
    }

    fn print_command(name: &str, alias: &str, description: &str) {
        let alias_str = if alias.is_empty() {
            "".to_string()
        } else {
            format!(" ({})", alias).bright_black().to_string()
        };

        println!(
            "  {}{:<20} {}",
            name.bright_cyan().bold(),
            alias_str,
            description
        );
    }

    fn print_section(title: &str) {
        println!();
        println!("{}", format!("┌─ {} ", title).bright_white().bold());
        println!("{}", "│".bright_black());
    }

    fn print_section_end() {
        println!("{}", "└─".bright_black());
    }

    fn print_success(message: &str) {
        println!("  {} {}", "✓".bright_green().bold(), message.bright_white());
    }

    fn print_error(message: &str) {
        eprintln!("  {} {}", "✗".bright_red().bold(), message.bright_red());
    }

    fn print_info(message: &str) {
        println!("  {} {}", "ℹ".bright_blue(), message);
    }

    /// Per-check audit output with pass/fail marks
    fn print_audit_outcome(outcome: &AuditOutcome) {
        for check in &outcome.checks {
            if check.ok {
                Self::print_success(&format!("{:<16} {}", check.id, check.why));
            } else {
                Self::print_error(&format!("{:<16} {}", check.id, check.why));
            }
        }
        println!();
        println!("{}", "AUDIT SUMMARY".bright_white().bold());
        println!("{}", "─".repeat(50).bright_black());
        println!(
            "  Score: {} ({})",
            format!("{:.1}", outcome.summary.score).bright_cyan().bold(),
            outcome.summary.wcag_compliance
        );
        println!(
            "  Checks: {} of {} passed",
            outcome.summary.passed, outcome.summary.total
        );
        println!("  User impact: {}", outcome.summary.user_impact);
        println!(
            "  Keyboard: {:.1} / Screen reader: {:.1}",
            outcome.summary.keyboard_accessibility_score, outcome.summary.screen_reader_compatibility
        );
        println!("{}", "─".repeat(50).bright_black());
    }

    /// Risk table with severity badges
    fn print_risk_table(risks: &[Risk]) {
        println!();
        println!("{}", "RISK ASSESSMENT".bright_white().bold());
        println!("{}", "─".repeat(50).bright_black());

        if risks.is_empty() {
            println!("  {} No significant risks identified!", "🎉".bright_green());
            println!("{}", "─".repeat(50).bright_black());
            return;
        }

        for risk in risks {
            let (icon, badge) = match risk.severity {
                Severity::High => (
                    "🚨",
                    format!("{:^8}", "High").bright_white().on_red().bold(),
                ),
                Severity::Medium => (
                    "⚠️",
                    format!("{:^8}", "Medium").bright_black().on_yellow().bold(),
                ),
                Severity::Low => (
                    "ℹ️",
                    format!("{:^8}", "Low").bright_black().on_bright_green().bold(),
                ),
            };

            println!(
                "  {} {} {:<8} {}",
                icon,
                badge,
                risk.id.bright_cyan(),
                risk.title.bright_white()
            );
        }

        println!("{}", "─".repeat(50).bright_black());
        println!(
            "  Total: {} open risks",
            risks.len().to_string().bright_red().bold()
        );
    }
}

// ============================================================================
// CLI EXECUTION ENGINE
// ============================================================================

pub struct ComplyMapCLI;

impl ComplyMapCLI {
    pub async fn run() -> Result<(), BoxError> {
        let cli = Cli::parse();

        if cli.verbose {
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .init();
        }

        if cli.help {
            TerminalUI::show_help();
            return Ok(());
        }

        // JSON-producing invocations skip the banner so output stays pipeable.
        let wants_json = matches!(
            &cli.command,
            Some(Commands::Audit { json: true, .. })
                | Some(Commands::History { json: true, .. })
                | Some(Commands::Report {
                    action: ReportAction::Run { json: true, .. }
                })
                | Some(Commands::Report {
                    action: ReportAction::Preview { json: true, .. }
                })
        );
        if !wants_json {
            TerminalUI::show_intro();
        }

        match cli.command {
            None => {
                TerminalUI::show_help();
            }
            Some(Commands::Audit {
                url,
                file,
                json,
                no_store,
            }) => {
                Self::cmd_audit(url, file, json, no_store).await?;
            }
            Some(Commands::Report { action }) => match action {
                ReportAction::Run { out, json } => {
                    Self::cmd_report_run(out, json).await?;
                }
                ReportAction::Preview { snapshot, json } => {
                    Self::cmd_report_preview(snapshot, json).await?;
                }
            },
            Some(Commands::History {
                page,
                per_page,
                json,
            }) => {
                Self::cmd_history(page, per_page, json).await?;
            }
            Some(Commands::Export { record, out }) => {
                Self::cmd_export(record, out).await?;
            }
            Some(Commands::Version) => {
                Self::cmd_version();
            }
        }

        Ok(())
    }

    // ========================================================================
    // COMMAND IMPLEMENTATIONS
    // ========================================================================

    async fn cmd_audit(
        url: Option<String>,
        file: Option<PathBuf>,
        json: bool,
        no_store: bool,
    ) -> Result<(), BoxError> {
        let auditor = AccessibilityAuditor::new(reqwest::Client::new());

        let outcome = if let Some(path) = file {
            let html = fs::read_to_string(&path)?;
            let target = format!("file://{}", path.display());
            auditor.audit_html(&target, &html)
        } else {
            let target = url.unwrap_or_default();
            auditor.audit_url(&target).await?
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            TerminalUI::print_section("ACCESSIBILITY AUDIT");
            TerminalUI::print_info(&format!("Target: {}", outcome.target));
            TerminalUI::print_audit_outcome(&outcome);
            TerminalUI::print_section_end();
        }

        if !no_store {
            let config = EngineConfig::from_env();
            let store = SqliteHistoryStore::connect(&config.database_url).await?;
            let record = AuditRecord::new(
                EngineTag::Accessibility,
                outcome.target.clone(),
                outcome.summary_line(),
                serde_json::to_value(&outcome)?,
            );
            let id = store.save(&record).await?;
            if !json {
                TerminalUI::print_info(&format!("Recorded as {}", id));
            }
        }

        Ok(())
    }

    async fn cmd_report_run(out: Option<PathBuf>, json: bool) -> Result<(), BoxError> {
        let config = EngineConfig::from_env();

        if json {
            let bundle = run_full_report(config).await?;
            println!("{}", serde_json::to_string_pretty(&bundle)?);
            return Ok(());
        }

        TerminalUI::print_section("SOC 2 REPORT");
        TerminalUI::print_info(&format!("Endpoint: {}", config.endpoint));

        let bundle = match run_full_report(config).await {
            Ok(bundle) => bundle,
            Err(err) => {
                TerminalUI::print_error(&format!("Report run failed: {}", err));
                return Err(err);
            }
        };

        let report = bundle.report.as_ref().ok_or("bundle missing report")?;
        TerminalUI::print_success("Report generated");
        TerminalUI::print_info(&format!("Opinion: {}", report.auditor.opinion));
        TerminalUI::print_info(&format!(
            "Readiness: {}",
            report.risk_assessment.readiness
        ));
        match (&bundle.meta.record_id, bundle.meta.deduplicated) {
            (Some(id), true) => {
                TerminalUI::print_info(&format!("Matched recent run {}", id));
            }
            (Some(id), false) => TerminalUI::print_info(&format!("Recorded as {}", id)),
            (None, _) => TerminalUI::print_info("Run not persisted (history unavailable)"),
        }

        TerminalUI::print_risk_table(&report.risk_assessment.gaps);

        if let Some(dir) = out {
            let paths = write_report_outputs(report, &dir)?;
            TerminalUI::print_success(&format!("Exported: {}", paths.report_json.display()));
            TerminalUI::print_info(&format!("Narrative: {}", paths.narrative_md.display()));
            TerminalUI::print_info(&format!("Controls: {}", paths.controls_csv.display()));
        }

        TerminalUI::print_section_end();
        Ok(())
    }

    async fn cmd_report_preview(snapshot: PathBuf, json: bool) -> Result<(), BoxError> {
        let raw = fs::read_to_string(&snapshot)?;
        let value: Value = serde_json::from_str(&raw)?;
        let config = EngineConfig::from_env();
        let report = generate_report(&value, None, None, &SynthesisContext::from_config(&config))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        TerminalUI::print_section("REPORT PREVIEW");
        TerminalUI::print_info(&format!("Snapshot: {}", snapshot.display()));
        TerminalUI::print_info("Preview runs are never persisted");
        println!();
        println!("{}", report.documents.executive_summary);
        TerminalUI::print_risk_table(&report.risk_assessment.gaps);
        TerminalUI::print_section_end();
        Ok(())
    }

    async fn cmd_history(page: u64, per_page: u64, json: bool) -> Result<(), BoxError> {
        let config = EngineConfig::from_env();
        let store = SqliteHistoryStore::connect(&config.database_url).await?;
        let listing = store.list(page, per_page).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }

        TerminalUI::print_section("AUDIT HISTORY");
        TerminalUI::print_info(&format!(
            "Page {} of {} ({} records total)",
            page.max(1),
            listing.pages.max(1),
            listing.total
        ));
        println!();
        if listing.items.is_empty() {
            TerminalUI::print_info("No records on this page");
        }
        for record in &listing.items {
            println!(
                "  {} {} {:<14} {}",
                record.id.bright_cyan(),
                record
                    .created_at
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
                    .bright_black(),
                record.engine.as_str().bright_white().bold(),
                record.summary
            );
        }
        TerminalUI::print_section_end();
        Ok(())
    }

    async fn cmd_export(record: Option<String>, out: PathBuf) -> Result<(), BoxError> {
        let config = EngineConfig::from_env();
        let store = SqliteHistoryStore::connect(&config.database_url).await?;

        let record = match record {
            Some(id) => store
                .get(&id)
                .await?
                .ok_or_else(|| format!("no record with id {id}"))?,
            None => store
                .latest(EngineTag::Soc2)
                .await?
                .ok_or("no soc2 runs recorded yet")?,
        };
        if record.engine != EngineTag::Soc2 {
            return Err(format!("record {} is not a soc2 report", record.id).into());
        }

        let report: Report = serde_json::from_value(record.payload.clone())?;
        let paths = write_report_outputs(&report, &out)?;

        TerminalUI::print_section("EXPORT");
        TerminalUI::print_info(&format!("Record: {}", record.id));
        TerminalUI::print_success(&format!("Report: {}", paths.report_json.display()));
        TerminalUI::print_success(&format!("Narrative: {}", paths.narrative_md.display()));
        TerminalUI::print_success(&format!("Controls: {}", paths.controls_csv.display()));
        TerminalUI::print_section_end();
        Ok(())
    }

    fn cmd_version() {
        println!("{} v{}", "ComplyMap".bright_cyan().bold(), VERSION);
        println!("SOC 2 readiness reporting for small web platforms");
        println!();
        println!("Author: ComplyMap Compliance Team");
        println!("License: Apache-2.0 / MIT");
        println!("Repository: https://github.com/complymap/complymap");
    }
}
