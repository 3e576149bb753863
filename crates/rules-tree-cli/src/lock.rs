use anyhow::{Context, Result, bail};
use rules_tree_engine::RuleSetId;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Exclusive writer guard for one rule-set, held as `<store>/<ID>.lock`.
///
/// Removed on drop. A process that dies without unwinding (profiles use
/// `panic = "abort"`) leaves the file behind, so the refusal message names
/// the recorded PID and how to clear it.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    pub fn acquire(store_dir: &Path, rule_set: &RuleSetId) -> Result<Self> {
        fs::create_dir_all(store_dir)
            .with_context(|| format!("Failed to create store directory {}", store_dir.display()))?;
        let path = store_dir.join(format!("{rule_set}.lock"));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())
                    .with_context(|| format!("Failed to write lock file {}", path.display()))?;
                log::debug!("Acquired writer lock {}", path.display());
                Ok(Self { path })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => bail!(
                "Rule-set {rule_set} is locked by another writer ({}, {}). If that process is \
                 no longer running, for example after a crash, remove the lock file.",
                holder(&path),
                path.display()
            ),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to create lock file {}", path.display()))
            }
        }
    }
}

fn holder(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(pid) if !pid.trim().is_empty() => format!("pid {}", pid.trim()),
        _ => "unknown pid".to_string(),
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove lock file {}: {err}", self.path.display());
        }
    }
}
