//! # Output Reconciliation
//!
//! Takes the file bucket of a completed transform run and applies the
//! minimal set of disk operations: serialize each declared file, skip paths
//! whose content is unchanged since the previous run, write the rest, and
//! delete paths that a previous run produced but the current run no longer
//! declares.
//!
//! Change detection keeps a blake3 hash of the last serialized content per
//! path rather than the content itself.

pub mod writers;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::domain::{FileDescriptor, FileFormat};
use crate::log::{LogStyle, Logger};

/// Namespace used for reconciler lines on the diagnostic channel
const LOG_NAMESPACE: &str = "output";

/// A path's worth of grouped descriptors
struct PathGroup {
    format: FileFormat,
    content: Value,
}

/// Reconciles declared output files against what previous runs wrote
#[derive(Debug)]
pub struct OutputReconciler {
    /// Base directory against which relative descriptor paths are resolved
    base_dir: PathBuf,

    /// blake3 hashes of the last serialized content, per tracked path
    baselines: Mutex<BTreeMap<PathBuf, blake3::Hash>>,
}

impl OutputReconciler {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            baselines: Mutex::new(BTreeMap::new()),
        }
    }

    /// Paths currently tracked as written by the most recent run
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.baselines
            .lock()
            .expect("baseline lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Applies one run's file bucket to disk.
    ///
    /// Returns one success flag per grouped path, in first-seen descriptor
    /// order. Individual failures (unserializable content, write errors)
    /// are logged and flagged `false` without aborting the batch.
    pub fn reconcile(&self, files: &[FileDescriptor], logger: &Logger) -> Vec<bool> {
        let groups = self.group_by_path(files, logger);

        let mut baselines = self.baselines.lock().expect("baseline lock poisoned");

        // Paths from previous runs that no current descriptor claims get
        // deleted before anything is written.
        let stale: Vec<PathBuf> = baselines
            .keys()
            .filter(|path| !groups.iter().any(|(current, _)| current == *path))
            .cloned()
            .collect();

        for path in stale {
            match fs::remove_file(&path) {
                Ok(()) => {
                    logger.log(
                        LOG_NAMESPACE,
                        &format!("Deleted {}", path.display()),
                        LogStyle::Success,
                    );
                }
                Err(error) => {
                    logger.log(
                        LOG_NAMESPACE,
                        &format!("Could not delete {}: {}", path.display(), error),
                        LogStyle::Failure,
                    );
                }
            }
            baselines.remove(&path);
        }

        let mut results = Vec::with_capacity(groups.len());

        for (path, group) in &groups {
            results.push(self.write_path(path, group, &mut baselines, logger));
        }

        results
    }

    /// Validates, resolves and groups descriptors by absolute path.
    ///
    /// A later descriptor with `append` set concatenates its content onto
    /// the existing entry as a flat ordered list; a later descriptor
    /// without `append` replaces the entry. The earlier descriptor's format
    /// wins for appended groups.
    fn group_by_path(
        &self,
        files: &[FileDescriptor],
        logger: &Logger,
    ) -> Vec<(PathBuf, PathGroup)> {
        let mut groups: Vec<(PathBuf, PathGroup)> = Vec::new();

        for descriptor in files {
            if descriptor.path.is_empty() {
                logger.log(
                    LOG_NAMESPACE,
                    "Skipping a file descriptor without a path",
                    LogStyle::Warning,
                );
                continue;
            }

            let path = self.resolve(&descriptor.path);

            match groups.iter_mut().find(|(existing, _)| *existing == path) {
                Some((_, group)) if descriptor.append => {
                    group.content = concat_content(group.content.take(), &descriptor.content);
                }
                Some((_, group)) => {
                    group.format = descriptor.format;
                    group.content = descriptor.content.clone();
                }
                None => {
                    groups.push((
                        path,
                        PathGroup {
                            format: descriptor.format,
                            content: descriptor.content.clone(),
                        },
                    ));
                }
            }
        }

        groups
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }

    /// Serializes and writes a single path, skipping the write when the
    /// content hash matches the recorded baseline.
    fn write_path(
        &self,
        path: &Path,
        group: &PathGroup,
        baselines: &mut BTreeMap<PathBuf, blake3::Hash>,
        logger: &Logger,
    ) -> bool {
        let serialized = match writers::render(group.format, &group.content) {
            Ok(serialized) => serialized,
            Err(error) => {
                logger.log(
                    LOG_NAMESPACE,
                    &format!(
                        "Could not serialize {} as {}: {:#}",
                        path.display(),
                        group.format.as_str(),
                        error
                    ),
                    LogStyle::Failure,
                );
                return false;
            }
        };

        let hash = blake3::hash(serialized.as_bytes());

        if baselines.get(path) == Some(&hash) {
            tracing::debug!(path = %path.display(), "content unchanged, skipping write");
            return true;
        }

        if let Some(parent) = path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                logger.log(
                    LOG_NAMESPACE,
                    &format!("Could not create {}: {}", parent.display(), error),
                    LogStyle::Failure,
                );
                return false;
            }
        }

        match fs::write(path, serialized) {
            Ok(()) => {
                baselines.insert(path.to_path_buf(), hash);
                logger.log(
                    LOG_NAMESPACE,
                    &format!("Wrote {}", path.display()),
                    LogStyle::Success,
                );
                true
            }
            Err(error) => {
                logger.log(
                    LOG_NAMESPACE,
                    &format!("Could not write {}: {}", path.display(), error),
                    LogStyle::Failure,
                );
                false
            }
        }
    }
}

/// Concatenates appended content onto an existing entry, flattening arrays
/// so repeated appends build one ordered list
fn concat_content(existing: Value, appended: &Value) -> Value {
    let mut items = match existing {
        Value::Array(items) => items,
        other => vec![other],
    };

    match appended {
        Value::Array(appended_items) => items.extend(appended_items.iter().cloned()),
        other => items.push(other.clone()),
    }

    Value::Array(items)
}
