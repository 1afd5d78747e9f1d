//! Record source for patient HEIFA data.
//!
//! Records are read from a JSON file holding an array of patient objects, or
//! from every `.json` file below a directory. Entries may be `null` while an
//! export is still being written; they are kept as `None` so the aggregator
//! can account for them.

use crate::models::PatientHealthRecord;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Options for loading records.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Files larger than this are skipped when walking a directory.
    pub max_file_size: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_file_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl From<&crate::config::RecordsConfig> for LoadOptions {
    fn from(config: &crate::config::RecordsConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
        }
    }
}

/// Load records from a file or a directory of JSON files.
///
/// A single file must parse; a malformed file inside a directory fails the
/// whole load so a partial population is never reported as complete.
pub fn load_records(path: &Path, options: &LoadOptions) -> Result<Vec<Option<PatientHealthRecord>>> {
    if !path.exists() {
        return Err(anyhow::anyhow!("Record source not found: {}", path.display()));
    }

    if path.is_file() {
        return load_file(path);
    }

    let files = discover_files(path, options);
    info!("Found {} record files in {}", files.len(), path.display());

    let mut records = Vec::new();
    for file in &files {
        records.extend(load_file(file)?);
    }

    Ok(records)
}

/// Parse one JSON file into records.
fn load_file(path: &Path) -> Result<Vec<Option<PatientHealthRecord>>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file: {}", path.display()))?;

    let records: Vec<Option<PatientHealthRecord>> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse record file: {}", path.display()))?;

    debug!(
        "Loaded {} entries ({} missing) from {}",
        records.len(),
        records.iter().filter(|r| r.is_none()).count(),
        path.display()
    );

    Ok(records)
}

/// Collect `.json` files below `dir`, sorted by path, skipping hidden entries.
fn discover_files(dir: &Path, options: &LoadOptions) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name().to_str().unwrap_or("")))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                debug!("Cannot read directory entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
        .filter(|e| match e.metadata() {
            Ok(meta) if meta.len() > options.max_file_size => {
                warn!(
                    "Skipping {} ({} bytes exceeds limit)",
                    e.path().display(),
                    meta.len()
                );
                false
            }
            Ok(_) => true,
            Err(_) => false,
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Find a patient by user id.
pub fn find_patient<'a>(
    records: &'a [Option<PatientHealthRecord>],
    user_id: &str,
) -> Option<&'a PatientHealthRecord> {
    records
        .iter()
        .flatten()
        .find(|r| r.user_id.as_deref() == Some(user_id))
}
