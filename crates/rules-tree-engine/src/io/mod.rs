use std::fs;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::models::{Metadata, SectionForest, SectionRecord};

/// File written next to the section files; never read as a section.
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path} is not valid UTF-8: {source}")]
    Encoding {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
    #[error("Invalid section file {path}{}: {source}", section_suffix(.section))]
    Json {
        path: PathBuf,
        section: Option<String>,
        source: serde_json::Error,
    },
    #[error("Invalid sections directory: {0}")]
    InvalidSectionsDir(String),
}

fn section_suffix(section: &Option<String>) -> String {
    section
        .as_ref()
        .map(|s| format!(" (section {s})"))
        .unwrap_or_default()
}

/// How `read_section_files` treats a malformed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Abort on the first malformed file.
    Strict,
    /// Log and skip malformed files.
    Lenient,
}

#[derive(Debug)]
pub struct SectionFiles {
    pub forest: SectionForest,
    /// Files skipped in lenient mode, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Read a source text file, rejecting input that is not UTF-8.
pub fn read_source_text(path: &Path) -> Result<String, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    decode_source(bytes, path)
}

/// Decode raw source bytes; `origin` only labels the error.
pub fn decode_source(bytes: Vec<u8>, origin: &Path) -> Result<String, IoError> {
    String::from_utf8(bytes).map_err(|source| IoError::Encoding {
        path: origin.to_path_buf(),
        source,
    })
}

/// Write one pretty-printed `<id>.json` per root of the forest.
///
/// Section files left over from an earlier write whose root is gone are
/// removed; the metadata file and non-JSON files stay.
pub fn write_section_files(dir: &Path, forest: &SectionForest) -> Result<Vec<PathBuf>, IoError> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(forest.root_ids().len());
    for record in codec::encode_forest(forest) {
        let path = dir.join(format!("{}.json", record.section));
        let json = serde_json::to_string_pretty(&record).map_err(|source| IoError::Json {
            path: path.clone(),
            section: Some(record.section.to_string()),
            source,
        })?;
        fs::write(&path, json)?;
        written.push(path);
    }
    log::debug!("Wrote {} section files to {}", written.len(), dir.display());

    for stale in scan_section_files(dir)? {
        if !written.contains(&stale) {
            log::info!("Removing stale section file {}", stale.display());
            fs::remove_file(&stale)?;
        }
    }
    Ok(written)
}

/// Load every `*.json` section file in `dir` (except the metadata file) into
/// one forest, roots ordered by section number.
pub fn read_section_files(dir: &Path, mode: LoadMode) -> Result<SectionFiles, IoError> {
    if !dir.is_dir() {
        return Err(IoError::InvalidSectionsDir(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for path in scan_section_files(dir)? {
        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(err) if mode == LoadMode::Lenient => {
                log::warn!("Skipping {}: {err}", path.display());
                skipped.push((path, err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }

    records.sort_by(|a, b| a.section.cmp(&b.section));
    let forest = codec::decode_all(&records);
    log::debug!(
        "Loaded {} sections from {} files in {}",
        forest.len(),
        records.len(),
        dir.display()
    );
    Ok(SectionFiles { forest, skipped })
}

fn scan_section_files(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.file_name().is_some_and(|name| name == METADATA_FILE) {
            continue;
        }
        if let Some(ext) = path.extension()
            && ext == "json"
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_record(path: &Path) -> Result<SectionRecord, IoError> {
    let bytes = fs::read(path)?;
    let text = decode_source(bytes, path)?;
    serde_json::from_str(&text).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        section: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned()),
        source,
    })
}

pub fn write_metadata(dir: &Path, metadata: &Metadata) -> Result<PathBuf, IoError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(METADATA_FILE);
    let json = serde_json::to_string_pretty(metadata).map_err(|source| IoError::Json {
        path: path.clone(),
        section: None,
        source,
    })?;
    fs::write(&path, json)?;
    Ok(path)
}

pub fn read_metadata(dir: &Path) -> Result<Metadata, IoError> {
    let path = dir.join(METADATA_FILE);
    if !path.exists() {
        return Err(IoError::NotFound(path));
    }
    let text = fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|source| IoError::Json {
        path,
        section: None,
        source,
    })
}
