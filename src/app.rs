use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::record::{Record, RecordStore};
use crate::tree::codec::{self, LoadOutcome};
use crate::tree::path::{self, ROOT_ID};
use crate::tree::{FolderNode, Leaf, PathResolver, Relocate};

/// Check that a category name is safe to use as a file stem.
pub fn validate_category(category: &str) -> Result<()> {
    let valid = !category.is_empty()
        && category
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "category '{}' may only use letters, digits, '_' and '-'",
            category
        )))
    }
}

/// One browsing session over a category's folders and records.
///
/// All folder operations apply to the folder currently being viewed.
pub struct Session {
    root: FolderNode<Record>,
    resolver: PathResolver,
    store: RecordStore,
    save_file: PathBuf,
    /// Preview copies never write to disk.
    fork: bool,
}

impl Session {
    /// Open the folder and record files of `category` in `data_dir`.
    ///
    /// An unusable folder file is reset, which also moves every record to the
    /// root. Records are then filed into the folders they declare.
    pub fn open(data_dir: &Path, category: &str) -> Result<Self> {
        validate_category(category)?;
        let save_file = data_dir.join(format!("{}.dat", category));
        let mut store = RecordStore::open(&data_dir.join(format!("{}.records.json", category)))?;

        let (root, outcome) = codec::load(&save_file, || store.reset_all_to_root());
        if outcome == LoadOutcome::Reset {
            info!(category, "started with an empty folder tree");
        }

        let mut session = Self {
            root,
            resolver: PathResolver::new(),
            store,
            save_file,
            fork: false,
        };
        let records = session.store.records().to_vec();
        session.populate(records);
        Ok(session)
    }

    /// Deep copy for previewing changes. The copy shares nothing with `self`
    /// and its `save` always fails.
    pub fn fork(&self) -> Session {
        Session {
            root: self.root.clone(),
            resolver: self.resolver.clone(),
            store: self.store.clone(),
            save_file: self.save_file.clone(),
            fork: true,
        }
    }

    #[allow(dead_code)]
    pub fn is_fork(&self) -> bool {
        self.fork
    }

    /// File each record into the folder its declared path names.
    ///
    /// Records whose folder no longer exists are moved to the root.
    pub fn populate(&mut self, records: Vec<Record>) {
        for mut record in records {
            if let Ok(relative) = path::relative_to_root(record.folder_path()) {
                let relative = relative.to_string();
                if let Ok(folder) = self.root.resolve_path_mut(&relative) {
                    folder.new_entry(record);
                    continue;
                }
            }

            warn!(record = %record.name, folder = %record.folder, "declared folder missing, filing at root");
            if self.fork {
                record.set_folder_path(ROOT_ID);
            } else {
                self.store.relocate_to_root(&mut record);
            }
            self.root.new_entry(record);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────

    #[allow(dead_code)]
    pub fn root(&self) -> &FolderNode<Record> {
        &self.root
    }

    /// The folder being viewed.
    pub fn current(&self) -> Result<&FolderNode<Record>> {
        self.resolver.current(&self.root)
    }

    fn current_mut(&mut self) -> Result<&mut FolderNode<Record>> {
        self.resolver.current_mut(&mut self.root)
    }

    pub fn folders(&self) -> Result<usize> {
        Ok(self.current()?.folders())
    }

    pub fn entry_count(&self) -> Result<usize> {
        Ok(self.current()?.entry_count())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.current()?.size())
    }

    pub fn child(&self, index: usize) -> Result<&FolderNode<Record>> {
        self.current()?.step_down(index)
    }

    pub fn entry(&self, index: usize) -> Result<&Record> {
        let folder = self.current()?;
        folder
            .entry(index)
            .ok_or_else(|| AppError::NotFound(format!("record {} in {}", index, folder.unique_id())))
    }

    /// Levels below the root.
    pub fn depth(&self) -> usize {
        self.resolver.depth()
    }

    /// Path of the current folder for display.
    pub fn display_path(&self) -> String {
        self.resolver.display_path()
    }

    /// Path of the current folder usable for lookups.
    pub fn unique_path(&self) -> String {
        self.resolver.unique_path()
    }

    pub fn records(&self) -> &[Record] {
        self.store.records()
    }

    pub fn save_file(&self) -> &Path {
        &self.save_file
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// Enter the child folder at `index`.
    pub fn enter(&mut self, index: usize) -> Result<()> {
        let id = self.current()?.step_down(index)?.unique_id().to_string();
        self.resolver.push(id);
        Ok(())
    }

    /// Enter the child folder with `unique_id`.
    pub fn enter_id(&mut self, unique_id: &str) -> Result<()> {
        let id = self.current()?.step_down_id(unique_id)?.unique_id().to_string();
        self.resolver.push(id);
        Ok(())
    }

    /// Jump to a full unique path.
    pub fn navigate_to(&mut self, unique_path: &str) -> Result<()> {
        self.resolver.navigate_to(&self.root, unique_path)
    }

    /// Go up one level. Returns `false` when already at the root.
    pub fn back(&mut self) -> bool {
        self.resolver.pop().is_some()
    }

    pub fn go_root(&mut self) {
        self.resolver.clear();
    }

    // ── Folder mutation ──────────────────────────────────────────────────

    /// Create a folder in the current folder and return its unique id.
    pub fn add_folder(&mut self, name: &str) -> Result<String> {
        let folder = self.current_mut()?.new_folder(name);
        Ok(folder.unique_id().to_string())
    }

    /// Rename the child folder at `index` of the current folder.
    ///
    /// Records below it are re-pointed at the renamed path.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<()> {
        self.current_mut()?.rename(index, name)?;
        self.sync_folder_paths();
        Ok(())
    }

    /// Delete the child folder at `index` and everything under it, then save.
    ///
    /// Records found in the deleted folders end up in the root. Returns
    /// `true` only if every record was relocated and the save succeeded.
    pub fn delete(&mut self, index: usize) -> Result<bool> {
        let parent = self.resolver.relative_path();
        let id = self.current()?.step_down(index)?.unique_id().to_string();

        let relocated = if self.fork {
            let mut to_root = |leaf: &mut Record| {
                leaf.set_folder_path(ROOT_ID);
                true
            };
            self.root.remove_nested(&parent, &id, &mut to_root)?
        } else {
            self.root.remove_nested(&parent, &id, &mut self.store)?
        };
        debug!(folder = %id, relocated, "deleted folder");
        // Later siblings were renumbered.
        let synced = self.sync_folder_paths();

        if self.fork {
            return Ok(relocated && synced);
        }
        Ok(self.save() && relocated && synced)
    }

    /// Rewrite the declared folder of every record whose folder id changed,
    /// and persist the record file. Returns `false` if that write failed.
    fn sync_folder_paths(&mut self) -> bool {
        let mut moved = Vec::new();
        self.root
            .refresh_folder_paths(ROOT_ID, &mut |record: &Record| moved.push(record.clone()));
        if moved.is_empty() {
            return true;
        }
        debug!(count = moved.len(), "re-pointed records at renumbered folders");
        for record in moved {
            self.store.upsert(record);
        }
        if self.fork {
            return true;
        }
        match self.store.save() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to write record file");
                false
            }
        }
    }

    // ── Records ──────────────────────────────────────────────────────────

    /// Add a record to the current folder, moving it if it already exists.
    pub fn add_record(&mut self, name: &str) -> Result<()> {
        let target = self.unique_path();
        let record = match self.store.get(name) {
            Some(existing) => existing.clone(),
            None => Record::new(name, target.as_str()),
        };
        self.file_record(record, &target)
    }

    /// Move an existing record into the folder at `unique_path`.
    pub fn move_record(&mut self, name: &str, unique_path: &str) -> Result<()> {
        let record = self
            .store
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("record '{}'", name)))?;
        self.file_record(record, unique_path)
    }

    fn file_record(&mut self, mut record: Record, unique_path: &str) -> Result<()> {
        let relative = path::relative_to_root(unique_path)?.to_string();
        self.root.resolve_path(&relative)?;

        // The declared path may be stale; search the tree for the current owner.
        self.root.take_entry(&record);

        let canonical = if relative.is_empty() {
            ROOT_ID.to_string()
        } else {
            format!("{}/{}", ROOT_ID, relative)
        };
        record.set_folder_path(&canonical);
        self.root.resolve_path_mut(&relative)?.new_entry(record.clone());
        self.store.upsert(record);

        if !self.fork {
            self.store.save()?;
        }
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Write the folder file. Returns `false` on failure or for a fork.
    pub fn save(&self) -> bool {
        if self.fork {
            debug!("preview session, not saving");
            return false;
        }
        match codec::save(&self.root, &self.save_file) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.save_file.display(), error = %e, "failed to save folder file");
                false
            }
        }
    }

    /// Tree listing; `verbose` includes records.
    pub fn dump(&self, verbose: bool) -> String {
        codec::encode(&self.root, verbose)
    }

    /// Log the full tree with records.
    pub fn print(&self) {
        info!("\n{}", self.dump(true));
    }
}
