// TermSleuth - app/state.rs
//
// Workspace state between scans: the loaded term set, the chosen source
// and destination folders, and the scan options derived from config.
//
// Empty-template policy: a template that yields zero terms is rejected AND
// the workspace is reset to an empty term set, so a stale set can never be
// scanned under the name of the file that just failed. A template that
// cannot be parsed at all leaves the previous set in place.

use crate::app::scan::ScanRequest;
use crate::core::discovery::DiscoveryConfig;
use crate::core::model::{ScanOptions, TermSet};
use crate::core::terms;
use crate::platform::config::AppConfig;
use crate::platform::tabular::TabularIo;
use crate::util::error::{ScanError, TemplateError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Workspace {
    terms: TermSet,

    /// File name of the template the current terms came from.
    template_name: Option<String>,

    pub source_root: Option<PathBuf>,
    pub destination_root: Option<PathBuf>,

    /// Effective settings. CLI flags are applied on top of config values.
    pub config: AppConfig,
}

impl Workspace {
    pub fn new(config: AppConfig) -> Self {
        Self {
            terms: TermSet::empty(),
            template_name: None,
            source_root: None,
            destination_root: None,
            config,
        }
    }

    pub fn terms(&self) -> &TermSet {
        &self.terms
    }

    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Load a template, replacing the current term set wholesale.
    /// Returns the number of terms loaded.
    pub fn load_template(
        &mut self,
        path: &Path,
        io: &dyn TabularIo,
    ) -> Result<usize, TemplateError> {
        match terms::load_template(path, io) {
            Ok(set) => {
                self.terms = set;
                self.template_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                Ok(self.terms.len())
            }
            Err(e) => {
                if e.is_empty_template() {
                    tracing::warn!(template = %path.display(), "Empty template, clearing terms");
                    self.clear_template();
                }
                Err(e)
            }
        }
    }

    pub fn clear_template(&mut self) {
        self.terms = TermSet::empty();
        self.template_name = None;
    }

    /// One-line description of the loaded template.
    pub fn status_line(&self) -> String {
        match &self.template_name {
            Some(name) if !self.terms.is_empty() => {
                format!("Loaded {} terms from \"{name}\"", self.terms.len())
            }
            _ => "No template loaded".to_string(),
        }
    }

    /// Check, in order, that terms, source and destination are all present.
    pub fn check_preconditions(&self) -> Result<(), ScanError> {
        if self.terms.is_empty() {
            return Err(ScanError::NoTemplate);
        }
        if self.source_root.is_none() {
            return Err(ScanError::NoSource);
        }
        if self.destination_root.is_none() {
            return Err(ScanError::NoDestination);
        }
        Ok(())
    }

    /// Scan options from the effective config.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            case_insensitive: self.config.case_insensitive,
            copy_matches: self.config.copy_matches,
            destination_root: self.destination_root.clone(),
            match_mode: self.config.match_mode,
            document_extensions: self.config.document_extensions.clone(),
            progress_interval: self.config.progress_interval,
        }
    }

    /// Build a request for the current workspace.
    pub fn scan_request(&self) -> Result<ScanRequest, ScanError> {
        self.check_preconditions()?;
        let (Some(source_root), Some(destination_root)) =
            (self.source_root.clone(), self.destination_root.clone())
        else {
            return Err(ScanError::NoSource);
        };

        Ok(ScanRequest {
            terms: self.terms.clone(),
            source_root,
            destination_root,
            options: self.scan_options(),
            discovery: DiscoveryConfig {
                max_depth: self.config.max_depth,
                exclude_patterns: self.config.exclude_patterns.clone(),
            },
            report_file_name: self.config.report_file_name.clone(),
            report_format: self.config.report_format,
        })
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
