//! Navigation through the folder tree and its two path dialects.
//!
//! A *unique path* joins unique ids (`base#0/Alpha#0/Beta#1`) and is the only
//! form that can be resolved. A *display path* joins display names
//! (`base/Alpha/Beta`) and is only for showing to the user.

use super::naming;
use super::FolderNode;
use crate::error::{AppError, Result};

/// Display name of the root folder.
pub const ROOT_NAME: &str = "base";
/// Unique id of the root folder; also the declared path of records filed at the root.
pub const ROOT_ID: &str = "base#0";

/// Strip the leading root marker from a full unique path, leaving a path that
/// [`FolderNode::resolve_path`] accepts when called on the root.
///
/// The marker is mandatory: a top-level folder named `base` also has the id
/// `base#0`, so an unmarked path would be ambiguous.
pub fn relative_to_root(path: &str) -> Result<&str> {
    if path == ROOT_ID {
        return Ok("");
    }
    match path.strip_prefix(ROOT_ID) {
        Some(rest) if rest.starts_with('/') => Ok(&rest[1..]),
        _ => Err(AppError::InvalidInput(format!(
            "'{}' is not a full unique path (must start with {})",
            path, ROOT_ID
        ))),
    }
}

/// Turn a unique path into its display form.
pub fn to_display(unique_path: &str) -> String {
    unique_path
        .split('/')
        .map(naming::display_name_of)
        .collect::<Vec<_>>()
        .join("/")
}

/// The folder the user is looking at, as a stack of unique ids below the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    stack: Vec<String>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the child with `unique_id` of the current folder.
    pub fn push(&mut self, unique_id: impl Into<String>) {
        self.stack.push(unique_id.into());
    }

    /// Go up one level. Returns the id that was left, or `None` at the root.
    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    /// Return to the root.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    #[allow(dead_code)]
    pub fn is_root(&self) -> bool {
        self.stack.is_empty()
    }

    /// Levels below the root.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Unique id of the current folder.
    #[allow(dead_code)]
    pub fn current_id(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or(ROOT_ID)
    }

    /// Path below the root, suitable for `resolve_path` on the root.
    pub fn relative_path(&self) -> String {
        self.stack.join("/")
    }

    /// Full unique path including the root marker.
    pub fn unique_path(&self) -> String {
        if self.stack.is_empty() {
            return ROOT_ID.to_string();
        }
        format!("{}/{}", ROOT_ID, self.relative_path())
    }

    /// Full display path including the root name.
    pub fn display_path(&self) -> String {
        let mut path = ROOT_NAME.to_string();
        for id in &self.stack {
            path.push('/');
            path.push_str(naming::display_name_of(id));
        }
        path
    }

    /// Replace the stack with the segments of a full unique path. The path is
    /// validated against `root` first.
    pub fn navigate_to<K>(&mut self, root: &FolderNode<K>, unique_path: &str) -> Result<()> {
        let relative = relative_to_root(unique_path)?;
        root.resolve_path(relative)?;
        self.stack = if relative.is_empty() {
            Vec::new()
        } else {
            relative.split('/').map(str::to_string).collect()
        };
        Ok(())
    }

    /// Resolve the current folder in `root`.
    pub fn current<'a, K>(&self, root: &'a FolderNode<K>) -> Result<&'a FolderNode<K>> {
        root.resolve_path(&self.relative_path())
    }

    pub fn current_mut<'a, K>(&self, root: &'a mut FolderNode<K>) -> Result<&'a mut FolderNode<K>> {
        root.resolve_path_mut(&self.relative_path())
    }
}
