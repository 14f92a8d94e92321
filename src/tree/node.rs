use std::collections::HashMap;

use tracing::{debug, warn};

use super::naming;
use super::{Leaf, Relocate};
use crate::error::{AppError, Result};

/// A folder in the tree.
///
/// Owns its child folders and the leaves filed directly into it. Children are
/// kept in creation order and a child's position always equals its ordinal,
/// so `child_index` maps a unique id straight to a position in `children`.
#[derive(Debug, Clone)]
pub struct FolderNode<K> {
    name: String,
    unique_id: String,
    depth: usize,
    ordinal: usize,
    children: Vec<FolderNode<K>>,
    child_index: HashMap<String, usize>,
    entries: Vec<K>,
}

/// Outcome of removing a folder.
#[derive(Debug)]
pub struct Removal<K> {
    /// Leaves pulled out of the removed subtree, in eviction order.
    pub evicted: Vec<K>,
    /// `false` if any relocation callback reported failure.
    pub relocated: bool,
}

impl<K> Removal<K> {
    fn new() -> Self {
        Self {
            evicted: Vec::new(),
            relocated: true,
        }
    }

    fn absorb(&mut self, other: Removal<K>) {
        self.evicted.extend(other.evicted);
        self.relocated &= other.relocated;
    }
}

/// Depth-first, pre-order walk over a folder and all of its descendants.
pub struct PreOrder<'a, K> {
    stack: Vec<&'a FolderNode<K>>,
}

impl<'a, K> Iterator for PreOrder<'a, K> {
    type Item = &'a FolderNode<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

impl<K> FolderNode<K> {
    /// Create an empty root folder (depth 0, ordinal 0).
    pub fn root(name: &str) -> Self {
        Self::at(naming::sanitize(name), 0, 0)
    }

    fn at(name: String, depth: usize, ordinal: usize) -> Self {
        let unique_id = naming::unique_id(&name, ordinal);
        Self {
            name,
            unique_id,
            depth,
            ordinal,
            children: Vec::new(),
            child_index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    #[allow(dead_code)]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Number of direct child folders.
    pub fn folders(&self) -> usize {
        self.child_index.len()
    }

    /// Number of leaves filed directly into this folder.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Child folders plus leaves.
    pub fn size(&self) -> usize {
        self.folders() + self.entry_count()
    }

    pub fn children(&self) -> &[FolderNode<K>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&FolderNode<K>> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut FolderNode<K>> {
        self.children.get_mut(index)
    }

    pub fn entries(&self) -> &[K] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&K> {
        self.entries.get(index)
    }

    pub fn pre_order(&self) -> PreOrder<'_, K> {
        PreOrder { stack: vec![self] }
    }

    /// Leaves filed anywhere in this subtree, this folder included.
    #[allow(dead_code)]
    pub fn total_entries(&self) -> usize {
        self.pre_order().map(|node| node.entries.len()).sum()
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// Child folder at a list position.
    pub fn step_down(&self, index: usize) -> Result<&FolderNode<K>> {
        self.children
            .get(index)
            .ok_or_else(|| AppError::NotFound(format!("folder index {} in {}", index, self.unique_id)))
    }

    /// Child folder with the given unique id.
    pub fn step_down_id(&self, unique_id: &str) -> Result<&FolderNode<K>> {
        match self.child_index.get(unique_id) {
            Some(&position) => Ok(&self.children[position]),
            None => Err(AppError::NotFound(format!("{} in {}", unique_id, self.unique_id))),
        }
    }

    pub fn step_down_id_mut(&mut self, unique_id: &str) -> Result<&mut FolderNode<K>> {
        match self.child_index.get(unique_id) {
            Some(&position) => Ok(&mut self.children[position]),
            None => Err(AppError::NotFound(format!("{} in {}", unique_id, self.unique_id))),
        }
    }

    /// Walk a `/`-separated unique path starting at this folder.
    ///
    /// An empty path resolves to `self`. Every segment must name an existing
    /// child; nothing is created along the way.
    pub fn resolve_path(&self, path: &str) -> Result<&FolderNode<K>> {
        if path.is_empty() {
            return Ok(self);
        }
        let mut current = self;
        for segment in path.split('/') {
            current = current.step_down_id(segment)?;
        }
        Ok(current)
    }

    pub fn resolve_path_mut(&mut self, path: &str) -> Result<&mut FolderNode<K>> {
        if path.is_empty() {
            return Ok(self);
        }
        let mut current = self;
        for segment in path.split('/') {
            current = current.step_down_id_mut(segment)?;
        }
        Ok(current)
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Append an empty child folder and return it.
    ///
    /// Display names need not be unique; the new child's ordinal is the
    /// current child count.
    pub fn new_folder(&mut self, name: &str) -> &mut FolderNode<K> {
        let ordinal = self.children.len();
        let child = Self::at(naming::sanitize(name), self.depth + 1, ordinal);
        debug!(parent = %self.unique_id, child = %child.unique_id, "new folder");
        self.child_index.insert(child.unique_id.clone(), ordinal);
        self.children.push(child);
        &mut self.children[ordinal]
    }

    /// Change the display name of the child at `index`, keeping its ordinal.
    ///
    /// Ids below the renamed folder are untouched.
    pub fn rename(&mut self, index: usize, new_name: &str) -> Result<()> {
        let child = self
            .children
            .get_mut(index)
            .ok_or_else(|| AppError::NotFound(format!("folder index {} in {}", index, self.unique_id)))?;

        self.child_index.remove(&child.unique_id);
        child.name = naming::sanitize(new_name);
        child.unique_id = naming::unique_id(&child.name, child.ordinal);
        self.child_index.insert(child.unique_id.clone(), index);
        debug!(parent = %self.unique_id, child = %child.unique_id, "renamed folder");
        Ok(())
    }

    /// Remove the child at a list position. See [`FolderNode::remove_dir`].
    #[allow(dead_code)]
    pub fn remove_dir_at<R: Relocate<K>>(
        &mut self,
        index: usize,
        relocate: &mut R,
    ) -> Result<Removal<K>> {
        let unique_id = self.step_down(index)?.unique_id.clone();
        self.remove_dir(&unique_id, relocate)
    }

    /// Remove a child folder and its whole subtree.
    ///
    /// Every leaf in the subtree is handed to `relocate` and returned in
    /// [`Removal::evicted`]; grandchildren are removed depth-first before
    /// their parent goes. A failed relocation is recorded but never stops the
    /// removal. Siblings after the removed folder are renumbered so ordinals
    /// stay contiguous.
    pub fn remove_dir<R: Relocate<K>>(
        &mut self,
        unique_id: &str,
        relocate: &mut R,
    ) -> Result<Removal<K>> {
        let position = match self.child_index.get(unique_id) {
            Some(&position) => position,
            None => return Err(AppError::NotFound(format!("{} in {}", unique_id, self.unique_id))),
        };

        let removal = self.children[position].evict_subtree(relocate);

        self.child_index.remove(unique_id);
        let target = self.children.remove(position);

        // Collect first, then renumber, so no key is rewritten while another
        // sibling still holds it.
        let stale: Vec<usize> = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, sibling)| sibling.ordinal > target.ordinal)
            .map(|(i, _)| i)
            .collect();
        for &i in &stale {
            self.child_index.remove(&self.children[i].unique_id);
        }
        for &i in &stale {
            let sibling = &mut self.children[i];
            sibling.ordinal -= 1;
            sibling.unique_id = naming::unique_id(&sibling.name, sibling.ordinal);
            self.child_index.insert(sibling.unique_id.clone(), sibling.ordinal);
        }

        debug!(
            parent = %self.unique_id,
            removed = %target.unique_id,
            evicted = removal.evicted.len(),
            "removed folder"
        );
        Ok(removal)
    }

    fn evict_subtree<R: Relocate<K>>(&mut self, relocate: &mut R) -> Removal<K> {
        let mut removal = Removal::new();

        for mut leaf in self.entries.drain(..) {
            if !relocate.relocate_to_root(&mut leaf) {
                warn!(folder = %self.unique_id, "failed to relocate evicted entry");
                removal.relocated = false;
            }
            removal.evicted.push(leaf);
        }

        // Last child first: nothing needs renumbering.
        while let Some(last) = self.children.last() {
            let id = last.unique_id.clone();
            match self.remove_dir(&id, relocate) {
                Ok(inner) => removal.absorb(inner),
                Err(e) => {
                    warn!(folder = %self.unique_id, error = %e, "subtree removal stopped");
                    removal.relocated = false;
                    break;
                }
            }
        }

        removal
    }

    /// Check the structural invariants of this subtree.
    ///
    /// Returns a description of the first violation found.
    pub fn verify(&self) -> std::result::Result<(), String> {
        for node in self.pre_order() {
            if node.children.len() != node.child_index.len() {
                return Err(format!(
                    "{}: {} children but {} index entries",
                    node.unique_id,
                    node.children.len(),
                    node.child_index.len()
                ));
            }
            for (i, child) in node.children.iter().enumerate() {
                if child.ordinal != i {
                    return Err(format!("{}: ordinal {} at position {}", child.unique_id, child.ordinal, i));
                }
                if child.unique_id != naming::unique_id(&child.name, child.ordinal) {
                    return Err(format!("{}: id does not match name and ordinal", child.unique_id));
                }
                if node.child_index.get(&child.unique_id) != Some(&i) {
                    return Err(format!("{}: missing from parent index", child.unique_id));
                }
                if child.depth != node.depth + 1 {
                    return Err(format!("{}: depth {} under depth {}", child.unique_id, child.depth, node.depth));
                }
            }
        }
        Ok(())
    }
}

impl<K: PartialEq> FolderNode<K> {
    /// File a leaf into this folder.
    ///
    /// An equal leaf already present is dropped first, so the new one always
    /// ends up last.
    pub fn new_entry(&mut self, leaf: K) -> &mut Self {
        if let Some(pos) = self.entries.iter().position(|e| *e == leaf) {
            self.entries.remove(pos);
        }
        self.entries.push(leaf);
        self
    }

    /// Take a leaf equal to `leaf` out of this folder.
    pub fn remove_entry(&mut self, leaf: &K) -> Option<K> {
        let pos = self.entries.iter().position(|e| e == leaf)?;
        Some(self.entries.remove(pos))
    }

    /// Take every leaf equal to `leaf` out of this subtree, wherever it is
    /// filed. Returns the one found deepest in pre-order, if any.
    pub fn take_entry(&mut self, leaf: &K) -> Option<K> {
        let mut found = self.remove_entry(leaf);
        for child in &mut self.children {
            if let Some(taken) = child.take_entry(leaf) {
                found = Some(taken);
            }
        }
        found
    }

    /// Remove `unique_id` from the folder at `parent_path` (relative to
    /// `self`) and file every evicted leaf into `self`.
    ///
    /// Meant to be called on the root. Returns whether every relocation
    /// succeeded.
    pub fn remove_nested<R: Relocate<K>>(
        &mut self,
        parent_path: &str,
        unique_id: &str,
        relocate: &mut R,
    ) -> Result<bool> {
        let removal = self.resolve_path_mut(parent_path)?.remove_dir(unique_id, relocate)?;
        for leaf in removal.evicted {
            self.new_entry(leaf);
        }
        Ok(removal.relocated)
    }
}

impl<K: Leaf> FolderNode<K> {
    /// Point every leaf in this subtree at the folder it actually sits in.
    ///
    /// `path` is the unique path of `self`. Needed after a rename or a
    /// renumbering changed the ids along a leaf's path. `on_change` sees each
    /// rewritten leaf; their number is returned.
    pub fn refresh_folder_paths<F: FnMut(&K)>(&mut self, path: &str, on_change: &mut F) -> usize {
        let mut changed = 0;
        for leaf in &mut self.entries {
            if leaf.folder_path() != path {
                leaf.set_folder_path(path);
                on_change(leaf);
                changed += 1;
            }
        }
        for child in &mut self.children {
            let child_path = format!("{}/{}", path, child.unique_id);
            changed += child.refresh_folder_paths(&child_path, on_change);
        }
        changed
    }
}
