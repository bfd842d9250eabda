// TermSleuth - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. Dispatch to scan / template commands
//
// Exit codes: 0 success, 1 precondition or template failure, 130 cancelled.

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use termsleuth::app::scan::{ScanManager, ScanOutcome, ScanProgress, ScanServices};
use termsleuth::app::state::Workspace;
use termsleuth::core::activity::TracingActivityLog;
use termsleuth::core::model::{MatchMode, ReportRow, ScanSummary};
use termsleuth::core::report::{self, PersistOutcome};
use termsleuth::core::session::{CancelToken, Progress};
use termsleuth::core::terms;
use termsleuth::platform::config::{self, AppConfig, PlatformPaths};
use termsleuth::platform::tabular::{SpreadsheetIo, TabularFormat, TabularIo};
use termsleuth::util::{constants, logging};

const EXIT_FAILURE: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

/// TermSleuth - search a folder tree for a list of terms.
///
/// Load search terms from a spreadsheet, scan every file name and PDF page
/// under a source folder, optionally copy matches into a destination folder,
/// and write a FOUND / NOT FOUND report.
#[derive(Parser, Debug)]
#[command(name = "termsleuth", version, about)]
struct Cli {
    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a source folder for every term in a template.
    Scan {
        /// Template spreadsheet (.xlsx, .xls, .ods or .csv).
        #[arg(short = 't', long)]
        template: PathBuf,

        /// Folder to search.
        #[arg(short = 's', long)]
        source: PathBuf,

        /// Folder that receives the report (and copies with --copy).
        #[arg(short = 'o', long = "dest")]
        dest: PathBuf,

        /// Ignore case when comparing.
        #[arg(short = 'i', long)]
        case_insensitive: bool,

        /// Copy matched files into the destination, mirroring the source layout.
        #[arg(long)]
        copy: bool,

        /// Only match whole words instead of any substring.
        #[arg(short = 'w', long)]
        word_match: bool,

        /// Print the summary and report rows as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Write a blank template to fill in.
    SampleTemplate {
        #[arg(long, default_value = constants::SAMPLE_TEMPLATE_FILE_NAME)]
        out: PathBuf,
    },

    /// Re-export a template's de-duplicated terms.
    ExportTemplate {
        #[arg(short = 't', long)]
        template: PathBuf,

        /// Output folder.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Show the terms a template would load.
    Preview {
        #[arg(short = 't', long)]
        template: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = PlatformPaths::resolve();
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let (app_config, config_warnings) = config::load_config(&config_path);

    logging::init(cli.debug, app_config.log_level.as_deref());
    for warning in &config_warnings {
        tracing::warn!(path = %config_path.display(), "{warning}");
    }

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "TermSleuth starting"
    );

    match cli.command {
        Command::Scan {
            template,
            source,
            dest,
            case_insensitive,
            copy,
            word_match,
            json,
        } => {
            let mut app_config = app_config;
            app_config.case_insensitive |= case_insensitive;
            app_config.copy_matches |= copy;
            if word_match {
                app_config.match_mode = MatchMode::Word;
            }
            let fallback_dirs = paths.fallback_dirs(app_config.fallback_dir.as_deref());
            run_scan_command(app_config, &template, source, dest, &fallback_dirs, json)
        }
        Command::SampleTemplate { out } => write_table(
            &terms::sample_template_rows(),
            &out,
            TabularFormat::from_path(&out).unwrap_or(TabularFormat::Workbook),
        ),
        Command::ExportTemplate { template, out } => {
            let set = match terms::load_template(&template, &SpreadsheetIo) {
                Ok(set) => set,
                Err(e) => return fail(&e),
            };
            let name = terms::template_export_file_name(
                chrono::Local::now().date_naive(),
                TabularFormat::Workbook,
            );
            write_table(
                &terms::template_export_rows(&set),
                &out.join(name),
                TabularFormat::Workbook,
            )
        }
        Command::Preview { template } => match terms::load_template(&template, &SpreadsheetIo) {
            Ok(set) => {
                println!("{} terms", set.len());
                print!("{}", terms::preview(&set, constants::TEMPLATE_PREVIEW_LIMIT));
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
    }
}

fn fail(error: &dyn std::fmt::Display) -> ExitCode {
    tracing::error!("{error}");
    eprintln!("Error: {error}");
    ExitCode::from(EXIT_FAILURE)
}

fn write_table(rows: &[Vec<String>], out: &Path, format: TabularFormat) -> ExitCode {
    let bytes = match SpreadsheetIo.write_tabular(rows, constants::TEMPLATE_SHEET_NAME, format) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };
    if let Err(e) = std::fs::write(out, bytes) {
        return fail(&format!("Cannot write '{}': {e}", out.display()));
    }
    println!("Wrote {}", out.display());
    ExitCode::SUCCESS
}

// =============================================================================
// scan
// =============================================================================

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    summary: &'a ScanSummary,
    report_path: Option<&'a Path>,
    rows: &'a [ReportRow],
}

fn run_scan_command(
    config: AppConfig,
    template: &Path,
    source: PathBuf,
    dest: PathBuf,
    fallback_dirs: &[PathBuf],
    json: bool,
) -> ExitCode {
    let large_file_threshold = config.large_file_threshold;
    let mut workspace = Workspace::new(config);

    match workspace.load_template(template, &SpreadsheetIo) {
        Ok(_) => eprintln!("{}", workspace.status_line()),
        Err(e) => return fail(&e),
    }
    workspace.source_root = Some(source);
    workspace.destination_root = Some(dest);

    let request = match workspace.scan_request() {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let log = Arc::new(TracingActivityLog::new());
    let services = ScanServices::local(log.clone(), large_file_threshold);
    let mut manager = ScanManager::new();
    if let Err(e) = manager.start_scan(request, services) {
        return fail(&e);
    }
    if let Some(token) = manager.cancel_token() {
        spawn_cancel_listener(token);
    }

    let mut outcome: Option<Box<ScanOutcome>> = None;
    let mut failure: Option<String> = None;
    while let Some(message) = manager.recv() {
        match message {
            ScanProgress::EnumerationStarted => eprintln!("Listing files..."),
            ScanProgress::EnumerationCompleted { total } => eprintln!("{total} files to scan"),
            ScanProgress::Progress { done, total } => {
                eprintln!("Scanned {done} / {total} ({}%)", Progress { done, total }.percent())
            }
            // Already written to stderr by the activity log.
            ScanProgress::Warning { .. } => {}
            ScanProgress::Completed(o) | ScanProgress::Cancelled(o) => outcome = Some(o),
            ScanProgress::Failed { error } => failure = Some(error),
        }
    }
    manager.join();

    let Some(outcome) = outcome else {
        return fail(&failure.unwrap_or_else(|| "Scan ended without a result".to_string()));
    };

    let report_path = match &outcome.persist {
        PersistOutcome::Saved { path } => Some(path.clone()),
        PersistOutcome::Download { artifact, reason } => {
            eprintln!("{reason}");
            match report::save_to_first_dir(artifact, fallback_dirs) {
                Ok(path) => {
                    eprintln!("Report saved to fallback location {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    // The scan itself succeeded; the rows still go to stdout.
                    tracing::error!(error = %e, "No fallback folder accepted the report");
                    eprintln!("Report could not be saved anywhere: {e}");
                    None
                }
            }
        }
    };

    let summary = &outcome.summary;
    if json {
        let doc = JsonReport {
            summary,
            report_path: report_path.as_deref(),
            rows: &outcome.rows,
        };
        match serde_json::to_string_pretty(&doc) {
            Ok(text) => println!("{text}"),
            Err(e) => return fail(&e),
        }
    } else {
        for line in report::preview_lines(&outcome.rows) {
            println!("{line}");
        }
        if let Some(path) = &report_path {
            println!("Report: {}", path.display());
        }
    }

    eprintln!(
        "{} of {} terms found in {} files ({} copied, {} copy failures, {} extraction failures)",
        summary.terms_found,
        outcome.rows.len(),
        summary.files_scanned,
        summary.files_copied,
        summary.copy_failures,
        summary.extraction_failures,
    );
    eprintln!("Activity log: {} entries", log.len());

    if summary.cancelled {
        eprintln!("Search cancelled");
        return ExitCode::from(EXIT_CANCELLED);
    }
    ExitCode::SUCCESS
}

/// On an interactive terminal, typing `q` + Enter cancels the scan.
fn spawn_cancel_listener(token: CancelToken) {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }
    eprintln!("Type q + Enter to cancel");
    std::thread::spawn(move || {
        let mut line = String::new();
        while stdin.read_line(&mut line).is_ok_and(|n| n > 0) {
            if line.trim().eq_ignore_ascii_case("q") {
                token.cancel();
                return;
            }
            line.clear();
        }
    });
}
