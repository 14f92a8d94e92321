//! In-memory folder tree: nodes, naming, navigation and the save format.

pub mod codec;
pub mod naming;
pub mod node;
pub mod path;

use std::fmt::Display;

pub use node::FolderNode;
pub use path::PathResolver;

/// Capabilities a record needs before it can be filed into the tree.
///
/// Equality decides upserts; `Display` is the text used by the verbose dump.
pub trait Leaf: PartialEq + Display {
    /// Unique path of the folder the record says it belongs to.
    fn folder_path(&self) -> &str;
    fn set_folder_path(&mut self, path: &str);
}

/// Callback invoked for every leaf displaced by a folder deletion.
///
/// Implementations point the leaf at the root folder and perform whatever
/// host-side write keeps it from being lost. Calling it twice for the same
/// leaf must be harmless. Returns `false` if the host-side write failed.
pub trait Relocate<K> {
    fn relocate_to_root(&mut self, leaf: &mut K) -> bool;
}

impl<K, F> Relocate<K> for F
where
    F: FnMut(&mut K) -> bool,
{
    fn relocate_to_root(&mut self, leaf: &mut K) -> bool {
        self(leaf)
    }
}
