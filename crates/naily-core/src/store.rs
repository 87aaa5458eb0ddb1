//! Flat-file fact store.
//!
//! The fact file holds one fact per line. Lines are parsed with
//! `^(.+)=(.+)$`, so the split happens on the last `=` that leaves at least
//! one character on each side (`a=b=c` is key `a=b`, value `c`); key and
//! value are trimmed. Lines that don't match are skipped. Writes always
//! emit `key = value`.
//!
//! There is no locking and no atomic replace: a read racing a write can see
//! a truncated file, and concurrent writes can interleave.

use crate::logging::Logger;
use crate::StoreError;
use naily_ipc::FactSet;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static FACT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)=(.+)$").expect("fact line pattern is valid")
});

/// Parse a single line into a fact
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let caps = FACT_LINE.captures(line)?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
}

/// Parse fact file content; later lines win on duplicate keys
pub fn parse_facts(content: &str) -> FactSet {
    content.lines().filter_map(parse_line).collect()
}

/// Render a fact set in file format
pub fn render_facts(facts: &FactSet) -> String {
    facts
        .iter()
        .map(|(key, value)| format!("{} = {}\n", key, value))
        .collect()
}

/// Reads and replaces the fact set kept in a single file.
#[derive(Debug, Clone)]
pub struct FactStore {
    path: PathBuf,
    logger: Logger,
}

impl FactStore {
    pub fn new(path: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            path: path.into(),
            logger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the fact set, never failing.
    ///
    /// A missing file is created empty. Any I/O error is logged as a warning
    /// and reported as an empty set.
    pub fn read(&self) -> FactSet {
        match self.try_read() {
            Ok(facts) => facts,
            Err(e) => {
                self.logger.in_scope(|| {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Could not access naily facts file"
                    )
                });
                FactSet::new()
            }
        }
    }

    /// Replace the whole fact set; `false` if any step failed.
    pub fn write(&self, facts: &FactSet) -> bool {
        match self.try_write(facts) {
            Ok(()) => true,
            Err(e) => {
                self.logger.in_scope(|| {
                    tracing::debug!(path = %self.path.display(), error = %e, "Fact write failed")
                });
                false
            }
        }
    }

    /// Read the fact set, creating an empty file if none exists
    pub fn try_read(&self) -> Result<FactSet, StoreError> {
        let exists = self.path.try_exists().map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        if !exists {
            File::create(&self.path).map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;
            self.logger.in_scope(|| {
                tracing::debug!(path = %self.path.display(), "Created empty facts file")
            });
            return Ok(FactSet::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;

        Ok(parse_facts(&content))
    }

    /// Truncate the file and write `facts`, one per line.
    ///
    /// A missing parent directory is created, but only one level deep.
    pub fn try_write(&self, facts: &FactSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;

        file.write_all(render_facts(facts).as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        self.logger.in_scope(|| {
            tracing::debug!(path = %self.path.display(), facts = facts.len(), "Facts written")
        });

        Ok(())
    }
}
