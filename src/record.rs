//! Records filed into the folder tree and the file they live in.
//!
//! Each category keeps its records in a JSON array next to its folder file.
//! A record remembers the unique path of the folder it belongs to, so the
//! tree can be rebuilt from the records after the folder file is loaded.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::tree::codec::write_file;
use crate::tree::path::{self, ROOT_ID};
use crate::tree::{Leaf, Relocate};

fn root_folder() -> String {
    ROOT_ID.to_string()
}

/// A named record. Two records are the same record when their names match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    /// Unique path of the owning folder, root marker included.
    #[serde(default = "root_folder")]
    pub folder: String,
}

impl Record {
    pub fn new(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, path::to_display(&self.folder))
    }
}

impl Leaf for Record {
    fn folder_path(&self) -> &str {
        &self.folder
    }

    fn set_folder_path(&mut self, path: &str) {
        self.folder = path.to_string();
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// The record file of one category.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    records: Vec<Record>,
}

impl RecordStore {
    /// Open the record file at `path`. A missing file is an empty store.
    ///
    /// A file that does not parse is renamed to `<path>.bak` and the store
    /// starts empty, so the category stays usable.
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                match serde_json::from_str(&content) {
                    Ok(records) => records,
                    Err(e) => {
                        let backup = backup_path(path);
                        error!(
                            path = %path.display(),
                            backup = %backup.display(),
                            error = %e,
                            "record file unreadable, starting empty"
                        );
                        fs::rename(path, &backup)?;
                        Vec::new()
                    }
                }
            }
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), count = records.len(), "opened record file");
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Insert a record, or replace the stored one with the same name in place.
    pub fn upsert(&mut self, record: Record) {
        match self.records.iter_mut().find(|r| **r == record) {
            Some(stored) => *stored = record,
            None => self.records.push(record),
        }
    }

    /// Point every record at the root folder and persist.
    pub fn reset_all_to_root(&mut self) -> bool {
        for record in &mut self.records {
            record.set_folder_path(ROOT_ID);
        }
        self.persist()
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_file(&self.path, json.as_bytes())
    }

    fn persist(&self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to write record file");
                false
            }
        }
    }
}

impl Relocate<Record> for RecordStore {
    fn relocate_to_root(&mut self, leaf: &mut Record) -> bool {
        leaf.set_folder_path(ROOT_ID);
        self.upsert(leaf.clone());
        self.persist()
    }
}
