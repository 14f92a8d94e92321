//! Line-oriented folder file format.
//!
//! ```text
//! base#0:
//! Alpha#0:
//! 	Beta#0:
//! Gamma#1:
//! ```
//!
//! The first line is a fixed header. Every other line is one folder, written
//! pre-order as `<tabs><unique id>:` with one tab per level below the root's
//! children. The root itself is never written. The verbose form adds
//! `<tabs>- <entry>` lines for debugging; it is never read back.

use std::fmt::Display;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::{error, info, warn};

use super::naming;
use super::path::ROOT_NAME;
use super::FolderNode;
use crate::error::{AppError, Result};

/// First line of every valid folder file.
pub const HEADER: &str = "base#0:";

/// How a folder file was obtained by [`load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file parsed cleanly.
    Loaded,
    /// The file was missing or unreadable and has been rewritten empty.
    Reset,
}

/// Serialize the subtree below `root`.
///
/// With `verbose`, each folder's entries follow its subfolders.
pub fn encode<K: Display>(root: &FolderNode<K>, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    for child in root.children() {
        write_folder(child, root.depth(), verbose, &mut out);
    }
    if verbose {
        write_entries(root, 0, &mut out);
    }
    out
}

fn write_folder<K: Display>(node: &FolderNode<K>, base: usize, verbose: bool, out: &mut String) {
    let level = node.depth() - base;
    push_tabs(out, level - 1);
    out.push_str(node.unique_id());
    out.push_str(":\n");
    for child in node.children() {
        write_folder(child, base, verbose, out);
    }
    if verbose {
        write_entries(node, level, out);
    }
}

fn write_entries<K: Display>(node: &FolderNode<K>, tabs: usize, out: &mut String) {
    for entry in node.entries() {
        push_tabs(out, tabs);
        out.push_str("- ");
        out.push_str(&entry.to_string());
        out.push('\n');
    }
}

fn push_tabs(out: &mut String, count: usize) {
    out.extend(std::iter::repeat('\t').take(count));
}

/// Rebuild a folder tree from its structural encoding.
///
/// Folders are recreated by display name in file order, so ordinals are
/// re-derived rather than trusted. Blank lines are skipped.
pub fn decode<K>(text: &str) -> Result<FolderNode<K>> {
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, first)) if first.trim_end_matches('\r') == HEADER => {}
        _ => return Err(AppError::malformed(1, "missing header")),
    }

    let mut root = FolderNode::root(ROOT_NAME);
    // Child positions from the root down to the most recently opened folder.
    let mut open: Vec<usize> = Vec::new();

    for (i, raw) in lines {
        let line_no = i + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let tabs = line.chars().take_while(|&c| c == '\t').count();
        let body = &line[tabs..];
        if body.starts_with("- ") {
            return Err(AppError::malformed(line_no, "entry lines are not part of the saved format"));
        }
        let id = body
            .strip_suffix(':')
            .ok_or_else(|| AppError::malformed(line_no, "folder line must end with ':'"))?;
        let (name, _) = naming::split_unique_id(id)
            .ok_or_else(|| AppError::malformed(line_no, format!("'{}' is not a unique id", id)))?;

        let depth = tabs + 1;
        if depth > open.len() + 1 {
            return Err(AppError::malformed(
                line_no,
                format!("jumps from depth {} to {}", open.len(), depth),
            ));
        }
        open.truncate(depth - 1);

        let parent = descend(&mut root, &open)?;
        let position = parent.folders();
        parent.new_folder(name);
        open.push(position);
    }

    root.verify().map_err(|reason| AppError::malformed(0, reason))?;
    Ok(root)
}

fn descend<'a, K>(root: &'a mut FolderNode<K>, positions: &[usize]) -> Result<&'a mut FolderNode<K>> {
    let mut current = root;
    for &position in positions {
        current = current
            .child_mut(position)
            .ok_or_else(|| AppError::NotFound(format!("folder index {}", position)))?;
    }
    Ok(current)
}

/// Load a folder file, falling back to a hard reset.
///
/// A missing file, an unreadable file or one that fails to parse is
/// rewritten with only the header and an empty tree is returned. `on_reset`
/// runs after the rewrite so the caller can point every known record at the
/// root; none of them may stay filed under a folder that no longer exists.
pub fn load<K, F>(path: &Path, on_reset: F) -> (FolderNode<K>, LoadOutcome)
where
    F: FnOnce() -> bool,
{
    let parsed = fs::read_to_string(path)
        .map_err(AppError::from)
        .and_then(|text| decode(&text));

    match parsed {
        Ok(root) => {
            info!(path = %path.display(), folders = root.pre_order().count() - 1, "loaded folder file");
            (root, LoadOutcome::Loaded)
        }
        Err(e) => {
            if path.exists() {
                error!(path = %path.display(), error = %e, "folder file unusable, resetting");
            } else {
                info!(path = %path.display(), "no folder file yet, creating one");
            }
            hard_reset(path, on_reset);
            (FolderNode::root(ROOT_NAME), LoadOutcome::Reset)
        }
    }
}

/// Overwrite `path` with an empty folder file and run `on_reset`.
///
/// Returns `false` if either the write or the hook failed; both are logged.
pub fn hard_reset<F: FnOnce() -> bool>(path: &Path, on_reset: F) -> bool {
    let written = match write_file(path, format!("{}\n", HEADER).as_bytes()) {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to rewrite folder file");
            false
        }
    };
    let reset = on_reset();
    if !reset {
        warn!(path = %path.display(), "records could not all be moved to the root");
    }
    written && reset
}

/// Write the structural encoding of `root` to `path`.
pub fn save<K: Display>(root: &FolderNode<K>, path: &Path) -> Result<()> {
    write_file(path, encode(root, false).as_bytes())?;
    info!(path = %path.display(), "saved folder file");
    Ok(())
}

/// Write a whole buffer to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn sample() -> FolderNode<u32> {
        let mut root = FolderNode::root(ROOT_NAME);
        {
            let alpha = root.new_folder("Alpha");
            alpha.new_folder("Beta").new_folder("Deep");
            alpha.new_folder("Beta");
            alpha.new_entry(7);
        }
        root.new_folder("Gamma");
        root.new_entry(1);
        root
    }

    fn shape<K>(root: &FolderNode<K>) -> Vec<(String, usize)> {
        root.pre_order()
            .skip(1)
            .map(|n| (n.display_name().to_string(), n.depth()))
            .collect()
    }

    #[test]
    fn encode_writes_header_and_indented_ids() {
        let text = encode(&sample(), false);
        assert_eq!(
            text,
            "base#0:\nAlpha#0:\n\tBeta#0:\n\t\tDeep#0:\n\tBeta#1:\nGamma#1:\n"
        );
    }

    #[test]
    fn encode_empty_tree_is_header_only() {
        let root: FolderNode<u32> = FolderNode::root(ROOT_NAME);
        assert_eq!(encode(&root, false), "base#0:\n");
    }

    #[test]
    fn verbose_encode_lists_entries() {
        let text = encode(&sample(), true);
        assert!(text.contains("\t- 7\n"));
        assert!(text.ends_with("- 1\n"));
    }

    #[test]
    fn decode_builds_nested_folders() {
        let root: FolderNode<u32> = decode("base#0:\nAlpha#0:\n\tBeta#0:\n").unwrap();
        let alpha = root.step_down_id("Alpha#0").unwrap();
        assert_eq!(alpha.depth(), 1);
        let beta = alpha.step_down_id("Beta#0").unwrap();
        assert_eq!(beta.depth(), 2);
        assert_eq!(root.folders(), 1);
    }

    #[test]
    fn round_trip_preserves_pre_order_shape() {
        let original = sample();
        let decoded: FolderNode<u32> = decode(&encode(&original, false)).unwrap();
        assert_eq!(shape(&decoded), shape(&original));
        assert!(decoded.verify().is_ok());
        assert_eq!(decoded.total_entries(), 0);
    }

    #[test]
    fn decode_rederives_ordinals() {
        let root: FolderNode<u32> = decode("base#0:\nA#3:\nA#7:\n").unwrap();
        let ids: Vec<&str> = root.children().iter().map(|c| c.unique_id()).collect();
        assert_eq!(ids, vec!["A#0", "A#1"]);
    }

    #[test]
    fn decode_tolerates_crlf_and_blank_lines() {
        let root: FolderNode<u32> = decode("base#0:\r\nA#0:\r\n\r\n\tB#0:\r\n").unwrap();
        assert_eq!(root.resolve_path("A#0/B#0").unwrap().depth(), 2);
    }

    #[test]
    fn decode_keeps_hashes_and_colons_in_names() {
        let root: FolderNode<u32> = decode("base#0:\nTake #2: final#0:\n").unwrap();
        assert_eq!(root.step_down(0).unwrap().display_name(), "Take #2: final");
    }

    #[test]
    fn decode_rejects_bad_input() {
        let cases = [
            "",
            "nope\nA#0:\n",
            "base#0:\n\t\tA#0:\n",
            "base#0:\nA#0\n",
            "base#0:\nA:\n",
            "base#0:\nA#0:\n\t- entry\n",
        ];
        for case in cases {
            let result: Result<FolderNode<u32>> = decode(case);
            assert!(
                matches!(result, Err(AppError::Malformed { .. })),
                "accepted {:?}",
                case
            );
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("worlds.dat");
        let original = sample();
        save(&original, &path).unwrap();

        let (loaded, outcome) = load::<u32, _>(&path, || panic!("must not reset"));
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(shape(&loaded), shape(&original));
    }

    #[test]
    fn load_with_bad_header_hard_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("worlds.dat");
        fs::write(&path, "garbage\nAlpha#0:\n").unwrap();

        let hook_ran = Cell::new(false);
        let (root, outcome) = load::<u32, _>(&path, || {
            hook_ran.set(true);
            true
        });

        assert_eq!(outcome, LoadOutcome::Reset);
        assert_eq!(root.folders(), 0);
        assert!(hook_ran.get());
        assert_eq!(fs::read_to_string(&path).unwrap(), "base#0:\n");
    }

    #[test]
    fn load_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.dat");

        let (root, outcome) = load::<u32, _>(&path, || true);

        assert_eq!(outcome, LoadOutcome::Reset);
        assert_eq!(root.size(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "base#0:\n");
    }

    #[test]
    fn hard_reset_reports_hook_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("worlds.dat");
        assert!(!hard_reset(&path, || false));
        assert!(hard_reset(&path, || true));
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let result = save(&sample(), &blocker.join("worlds.dat"));
        assert!(result.is_err());
    }

    #[test]
    fn encode_subtree_is_relative() {
        let root = sample();
        let alpha = root.step_down(0).unwrap();
        assert_eq!(encode(alpha, false), "base#0:\nBeta#0:\n\tDeep#0:\nBeta#1:\n");
    }
}
