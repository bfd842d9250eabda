// TermSleuth - platform/config.rs
//
// Platform-specific configuration, data directory resolution, and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::model::MatchMode;
use crate::platform::tabular::TabularFormat;
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

/// Resolved platform paths for TermSleuth data and configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/termsleuth/ or %APPDATA%\TermSleuth\config\)
    pub config_dir: PathBuf,

    /// Data directory.
    pub data_dir: PathBuf,

    /// Where fallback reports go when the destination cannot be written:
    /// the user's Downloads folder when known, else `<data>/reports`.
    pub fallback_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        let downloads = UserDirs::new().and_then(|u| u.download_dir().map(Path::to_path_buf));

        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();
            let fallback_dir =
                downloads.unwrap_or_else(|| data_dir.join(constants::FALLBACK_DIR_NAME));

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                fallback = %fallback_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
                fallback_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback.clone(),
                fallback_dir: downloads.unwrap_or(fallback),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }

    /// Folders to try, in order, for a report that could not be saved to the
    /// destination: `configured` (else `fallback_dir`), the system temp
    /// folder, then the current directory.
    pub fn fallback_dirs(&self, configured: Option<&Path>) -> Vec<PathBuf> {
        let first = configured.map_or_else(|| self.fallback_dir.clone(), Path::to_path_buf);
        let mut dirs = vec![first];
        for dir in [Some(std::env::temp_dir()), std::env::current_dir().ok()]
            .into_iter()
            .flatten()
        {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[scan]` section.
    pub scan: ScanSection,
    /// `[discovery]` section.
    pub discovery: DiscoverySection,
    /// `[report]` section.
    pub report: ReportSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[scan]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Compare names, text and terms lower-cased.
    pub case_insensitive: Option<bool>,
    /// Copy matched files into the destination folder.
    pub copy_matches: Option<bool>,
    /// "substring" or "word".
    pub match_mode: Option<String>,
    /// Files processed between progress updates.
    pub progress_interval: Option<usize>,
    /// Extensions whose page text is searched.
    pub document_extensions: Option<Vec<String>>,
}

/// `[discovery]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Maximum directory recursion depth.
    pub max_depth: Option<usize>,
    /// Glob patterns for file and folder names to skip.
    pub exclude_patterns: Option<Vec<String>>,
    /// Files at or above this size are memory-mapped.
    pub large_file_threshold_bytes: Option<u64>,
}

/// `[report]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ReportSection {
    /// Report file name under the destination folder.
    pub file_name: Option<String>,
    /// "xlsx" or "csv".
    pub format: Option<String>,
    /// Folder for the fallback report.
    pub fallback_dir: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // -- Scan --
    pub case_insensitive: bool,
    pub copy_matches: bool,
    pub match_mode: MatchMode,
    pub progress_interval: usize,
    pub document_extensions: Vec<String>,

    // -- Discovery --
    pub max_depth: usize,
    pub exclude_patterns: Vec<String>,
    pub large_file_threshold: u64,

    // -- Report --
    pub report_file_name: String,
    pub report_format: TabularFormat,
    pub fallback_dir: Option<PathBuf>,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            copy_matches: false,
            match_mode: MatchMode::Substring,
            progress_interval: constants::DEFAULT_PROGRESS_INTERVAL,
            document_extensions: constants::DEFAULT_DOCUMENT_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            max_depth: constants::DEFAULT_MAX_DEPTH,
            exclude_patterns: Vec::new(),
            large_file_threshold: constants::DEFAULT_LARGE_FILE_THRESHOLD,
            report_file_name: constants::DEFAULT_REPORT_FILE_NAME.to_string(),
            report_format: TabularFormat::Workbook,
            fallback_dir: None,
            log_level: None,
        }
    }
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unreadable or unparseable, returns defaults plus a warning
/// so the tool still runs but the user is told why their settings were ignored.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let raw = match read_raw_config(config_path) {
        Ok(raw) => raw,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let config = validate(raw, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

fn read_raw_config(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate each field against named constants, accumulating all problems.
fn validate(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();
    let mut out_of_range = |field: &str, value: String, expected: String| {
        warnings.push(
            ConfigError::ValueOutOfRange {
                field: field.to_string(),
                value,
                expected,
            }
            .to_string()
                + ". Using default.",
        );
    };

    // -- Scan --
    if let Some(v) = raw.scan.case_insensitive {
        config.case_insensitive = v;
    }
    if let Some(v) = raw.scan.copy_matches {
        config.copy_matches = v;
    }
    if let Some(ref mode) = raw.scan.match_mode {
        match mode.to_lowercase().as_str() {
            "substring" => config.match_mode = MatchMode::Substring,
            "word" => config.match_mode = MatchMode::Word,
            other => out_of_range(
                "scan.match_mode",
                other.to_string(),
                "\"substring\" or \"word\"".to_string(),
            ),
        }
    }
    if let Some(interval) = raw.scan.progress_interval {
        if (constants::MIN_PROGRESS_INTERVAL..=constants::MAX_PROGRESS_INTERVAL)
            .contains(&interval)
        {
            config.progress_interval = interval;
        } else {
            out_of_range(
                "scan.progress_interval",
                interval.to_string(),
                format!(
                    "{}-{}",
                    constants::MIN_PROGRESS_INTERVAL,
                    constants::MAX_PROGRESS_INTERVAL
                ),
            );
        }
    }
    if let Some(exts) = raw.scan.document_extensions {
        config.document_extensions = exts
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
    }

    // -- Discovery --
    if let Some(depth) = raw.discovery.max_depth {
        if (1..=constants::ABSOLUTE_MAX_DEPTH).contains(&depth) {
            config.max_depth = depth;
        } else {
            out_of_range(
                "discovery.max_depth",
                depth.to_string(),
                format!("1-{}", constants::ABSOLUTE_MAX_DEPTH),
            );
        }
    }
    if let Some(patterns) = raw.discovery.exclude_patterns {
        config.exclude_patterns = patterns;
    }
    if let Some(threshold) = raw.discovery.large_file_threshold_bytes {
        if threshold > 0 {
            config.large_file_threshold = threshold;
        } else {
            out_of_range(
                "discovery.large_file_threshold_bytes",
                threshold.to_string(),
                "a positive byte count".to_string(),
            );
        }
    }

    // -- Report --
    if let Some(name) = raw.report.file_name {
        let name = name.trim().to_string();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            out_of_range(
                "report.file_name",
                name,
                "a plain file name".to_string(),
            );
        } else {
            config.report_file_name = name;
        }
    }
    if let Some(ref format) = raw.report.format {
        match format.to_lowercase().as_str() {
            "xlsx" => config.report_format = TabularFormat::Workbook,
            "csv" => config.report_format = TabularFormat::Csv,
            other => out_of_range(
                "report.format",
                other.to_string(),
                "\"xlsx\" or \"csv\"".to_string(),
            ),
        }
    }
    if let Some(dir) = raw.report.fallback_dir {
        if !dir.is_empty() {
            config.fallback_dir = Some(PathBuf::from(dir));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            out_of_range(
                "logging.level",
                level.clone(),
                "error, warn, info, debug, trace".to_string(),
            );
        }
    }

    // The report keeps the configured name but needs the format's extension.
    config.report_file_name = config.report_format.file_name(&config.report_file_name);

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load_str(toml: &str) -> (AppConfig, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, toml).unwrap();
        load_config(&path)
    }

    #[test]
    fn test_fallback_dirs_try_configured_then_temp() {
        let paths = PlatformPaths {
            config_dir: PathBuf::from("cfg"),
            data_dir: PathBuf::from("data"),
            fallback_dir: PathBuf::from("Downloads"),
        };
        let dirs = paths.fallback_dirs(None);
        assert_eq!(dirs[0], PathBuf::from("Downloads"));
        assert_eq!(dirs[1], std::env::temp_dir());

        let dirs = paths.fallback_dirs(Some(Path::new("/srv/reports")));
        assert_eq!(dirs[0], PathBuf::from("/srv/reports"));
        assert!(!dirs.contains(&PathBuf::from("Downloads")));
    }

    #[test]
    fn test_missing_file_gives_defaults_without_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(&dir.path().join("config.toml"));
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_valid_values_are_applied() {
        let (config, warnings) = load_str(
            r#"
            [scan]
            case_insensitive = true
            copy_matches = true
            match_mode = "word"
            progress_interval = 20
            document_extensions = [".PDF", "pdf2"]

            [discovery]
            max_depth = 3
            exclude_patterns = ["~$*", ".git"]

            [report]
            file_name = "hits.xlsx"

            [logging]
            level = "DEBUG"
            "#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(config.case_insensitive);
        assert!(config.copy_matches);
        assert_eq!(config.match_mode, MatchMode::Word);
        assert_eq!(config.progress_interval, 20);
        assert_eq!(config.document_extensions, ["pdf", "pdf2"]);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.exclude_patterns, ["~$*", ".git"]);
        assert_eq!(config.report_file_name, "hits.xlsx");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_out_of_range_values_warn_and_keep_defaults() {
        let (config, warnings) = load_str(
            r#"
            [scan]
            match_mode = "fuzzy"
            progress_interval = 0

            [discovery]
            max_depth = 100000

            [report]
            file_name = "../escape.xlsx"
            "#,
        );
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert_eq!(config.match_mode, MatchMode::Substring);
        assert_eq!(config.progress_interval, constants::DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(config.max_depth, constants::DEFAULT_MAX_DEPTH);
        assert_eq!(config.report_file_name, constants::DEFAULT_REPORT_FILE_NAME);
    }

    #[test]
    fn test_unparseable_file_warns_and_uses_defaults() {
        let (config, warnings) = load_str("[scan\ncase_insensitive = ");
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Using defaults"));
    }

    #[test]
    fn test_csv_format_adjusts_report_extension() {
        let (config, _) = load_str("[report]\nformat = \"csv\"\n");
        assert_eq!(config.report_format, TabularFormat::Csv);
        assert_eq!(config.report_file_name, "search_report.csv");
    }
}
