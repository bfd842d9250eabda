// TermSleuth - core/discovery.rs
//
// Recursive enumeration of every file under the source root.
//
// Traversal goes through the `StorageProvider` trait only, so the walk is
// identical for local disks and test fakes. Directory children are visited
// in the provider's native order; no sorting is applied.
//
// Error policy:
//   - The root must exist and be a listable directory; anything else is fatal.
//   - A subdirectory that cannot be listed is logged to the activity log and
//     skipped. Its subtree contributes zero entries; siblings continue.
//   - The cancel token is polled before every directory child. On cancel the
//     entries gathered so far are returned with `cancelled` set.

use crate::core::activity::{ActivityLevel, ActivityLog};
use crate::core::model::Entry;
use crate::core::session::CancelToken;
use crate::platform::storage::{EntryKind, StorageProvider};
use crate::util::error::DiscoveryError;
use std::io;
use std::path::Path;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an enumeration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum number of directory levels to visit. 1 means files directly
    /// in the root only. Clamped to `ABSOLUTE_MAX_DEPTH`.
    pub max_depth: usize,

    /// Glob patterns matched against file and directory names. Matching
    /// files are skipped; matching directories are not descended into.
    /// Empty by default: every file is enumerated.
    pub exclude_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::util::constants::DEFAULT_MAX_DEPTH,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Result of an enumeration.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Every file found, in traversal order.
    pub entries: Vec<Entry>,

    /// True if the walk stopped early on a cancel request.
    pub cancelled: bool,

    /// Subdirectories that could not be listed and were skipped.
    pub skipped_subtrees: usize,
}

// =============================================================================
// Enumeration
// =============================================================================

/// Enumerate every file under `root`.
///
/// `on_entry` is called once per accepted file with the running count; keep
/// it cheap, it runs on the caller's thread.
///
/// # Fatal errors
/// `RootNotFound`, `NotADirectory`, `PermissionDenied` when the root itself
/// cannot be inspected or listed.
pub fn enumerate<F>(
    root: &Path,
    storage: &dyn StorageProvider,
    config: &DiscoveryConfig,
    cancel: &CancelToken,
    log: &dyn ActivityLog,
    mut on_entry: F,
) -> Result<Enumeration, DiscoveryError>
where
    F: FnMut(&Entry, usize),
{
    preflight(root, storage)?;

    let max_depth = config
        .max_depth
        .min(crate::util::constants::ABSOLUTE_MAX_DEPTH);
    let excludes = compile_patterns(&config.exclude_patterns);

    tracing::debug!(
        root = %root.display(),
        max_depth,
        exclude = ?config.exclude_patterns,
        "Enumeration starting"
    );

    let mut walk = Walk {
        storage,
        excludes: &excludes,
        max_depth,
        cancel,
        log,
        on_entry: &mut on_entry,
        result: Enumeration::default(),
    };

    // The root listing is not recoverable: there is nothing to skip to.
    let children = storage
        .list_children(root)
        .map_err(|source| DiscoveryError::PermissionDenied {
            path: root.to_path_buf(),
            source,
        })?;
    if max_depth > 0 {
        walk.visit_children(children, "", 1);
    }

    let result = walk.result;
    tracing::debug!(
        files = result.entries.len(),
        skipped_subtrees = result.skipped_subtrees,
        cancelled = result.cancelled,
        "Enumeration complete"
    );
    Ok(result)
}

/// Check the root before walking so a bad path gets a specific message
/// instead of a generic listing failure.
fn preflight(root: &Path, storage: &dyn StorageProvider) -> Result<(), DiscoveryError> {
    match storage.is_directory(root) {
        Ok(true) => Ok(()),
        Ok(false) => Err(DiscoveryError::NotADirectory {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(DiscoveryError::PermissionDenied {
                path: root.to_path_buf(),
                source: e,
            })
        }
        Err(_) => Err(DiscoveryError::RootNotFound {
            path: root.to_path_buf(),
        }),
    }
}

struct Walk<'a, F> {
    storage: &'a dyn StorageProvider,
    excludes: &'a [glob::Pattern],
    max_depth: usize,
    cancel: &'a CancelToken,
    log: &'a dyn ActivityLog,
    on_entry: &'a mut F,
    result: Enumeration,
}

impl<F> Walk<'_, F>
where
    F: FnMut(&Entry, usize),
{
    /// Visit the children of a directory whose path relative to the root is
    /// `prefix` ("" for the root). `depth` is the level of these children.
    fn visit_children(
        &mut self,
        children: Vec<crate::platform::storage::ChildEntry>,
        prefix: &str,
        depth: usize,
    ) {
        for child in children {
            if self.cancel.is_cancelled() {
                if !self.result.cancelled {
                    tracing::debug!("Enumeration cancelled by request");
                }
                self.result.cancelled = true;
                return;
            }

            if is_excluded(&child.name, self.excludes) {
                tracing::trace!(name = %child.name, "Excluded by pattern");
                continue;
            }

            let relative_path = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{prefix}/{}", child.name)
            };

            match child.kind {
                EntryKind::File => {
                    let entry = Entry {
                        handle: child.handle,
                        name: child.name,
                        relative_path,
                    };
                    let count = self.result.entries.len() + 1;
                    (self.on_entry)(&entry, count);
                    self.result.entries.push(entry);
                }
                EntryKind::Directory => {
                    if depth >= self.max_depth {
                        tracing::trace!(dir = %relative_path, "Depth limit reached");
                        continue;
                    }
                    match self.storage.list_children(&child.handle) {
                        Ok(grandchildren) => {
                            self.visit_children(grandchildren, &relative_path, depth + 1)
                        }
                        Err(source) => {
                            let err = DiscoveryError::DirectoryAccess {
                                path: child.handle,
                                source,
                            };
                            self.log.append(&err.to_string(), ActivityLevel::Warning);
                            self.result.skipped_subtrees += 1;
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Glob helpers
// =============================================================================

/// Compile glob patterns once; invalid patterns are logged and skipped.
fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, error = %e, "Invalid exclude pattern, skipping");
                None
            }
        })
        .collect()
}

fn is_excluded(name: &str, excludes: &[glob::Pattern]) -> bool {
    excludes.iter().any(|p| p.matches(name))
}

// =============================================================================
// Tests
// =============================================================================
