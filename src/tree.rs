use log::{debug, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::mft::MftRecord;

/// Well-known MFT entry number of the volume root directory.
pub const ROOT_ENTRY: u64 = 5;

/// Parent entry number -> ordered `(name, child entry number)` edges,
/// accumulated from every $FILE_NAME attribute across all records.
///
/// Duplicates are kept on purpose: a child legitimately appears twice under
/// one parent (DOS + Win32 names) or under several parents (hard links).
/// Built once by a full pass over the record list, read-only afterwards.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FilesystemTree {
    children: HashMap<u64, Vec<(String, u64)>>,
}

impl FilesystemTree {
    /// Fold every $FILE_NAME attribute of every record into edges.
    pub fn build(records: &[MftRecord]) -> Self {
        let mut tree = FilesystemTree::default();
        for record in records {
            for fname in record.file_names() {
                tree.insert(
                    fname.parent_ref,
                    fname.name.clone(),
                    u64::from(record.header.entry_number),
                );
            }
        }
        debug!("filesystem tree built with {} directories", tree.children.len());
        tree
    }

    /// Append one edge; never merges, never removes.
    pub fn insert(&mut self, parent: u64, name: String, child: u64) {
        self.children.entry(parent).or_default().push((name, child));
    }

    pub fn children(&self, entry: u64) -> Option<&[(String, u64)]> {
        self.children.get(&entry).map(Vec::as_slice)
    }

    /// A node is a folder iff its entry number itself appears as a parent key.
    pub fn is_directory(&self, entry: u64) -> bool {
        self.children.contains_key(&entry)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve a `/`-separated path to an entry number, walking component by
    /// component from the root, case-insensitively. An empty path, `.` or
    /// `/` names the root itself.
    pub fn resolve(&self, path: &str) -> Option<u64> {
        let mut current = ROOT_ENTRY;
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            let children = self.children.get(&current)?;
            let component_lower = component.to_lowercase();
            let (_, child) = children
                .iter()
                .find(|(name, _)| name.to_lowercase() == component_lower)?;
            current = *child;
        }
        Some(current)
    }

    /// Case-insensitive recursive search from the root for every full path
    /// whose final component contains `pattern`. The result is deduplicated
    /// and keeps discovery order.
    pub fn find(&self, pattern: &str) -> Vec<String> {
        let needle = pattern.to_lowercase();
        let mut seen_paths = HashSet::new();
        let mut found = Vec::new();
        let mut ancestors = Vec::new();
        self.find_under(
            ROOT_ENTRY,
            "",
            &needle,
            &mut seen_paths,
            &mut ancestors,
            &mut found,
        );
        found
    }

    fn find_under(
        &self,
        entry: u64,
        prefix: &str,
        needle: &str,
        seen_paths: &mut HashSet<String>,
        ancestors: &mut Vec<u64>,
        found: &mut Vec<String>,
    ) {
        let Some(children) = self.children.get(&entry) else {
            return;
        };
        ancestors.push(entry);
        for (name, child) in children {
            let path = format!("{}/{}", prefix, name);
            if !seen_paths.insert(path.clone()) {
                continue;
            }
            if name.to_lowercase().contains(needle) {
                found.push(path.clone());
            }
            if self.children.contains_key(child) {
                if ancestors.contains(child) {
                    warn!("parent/child cycle at entry {} ({}) - stopping descent", child, path);
                    continue;
                }
                self.find_under(*child, &path, needle, seen_paths, ancestors, found);
            }
        }
        ancestors.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FilesystemTree {
        let mut tree = FilesystemTree::default();
        tree.insert(ROOT_ENTRY, "Windows".into(), 40);
        tree.insert(ROOT_ENTRY, "Users".into(), 41);
        tree.insert(40, "notes.txt".into(), 100);
        tree.insert(41, "alice".into(), 42);
        tree.insert(42, "notes.txt".into(), 101);
        tree
    }

    #[test]
    fn children_keep_discovery_order() {
        let mut tree = FilesystemTree::default();
        tree.insert(7, "b.txt".into(), 20);
        tree.insert(7, "a.txt".into(), 21);
        let children = tree.children(7).unwrap();
        assert_eq!(children[0], ("b.txt".to_string(), 20));
        assert_eq!(children[1], ("a.txt".to_string(), 21));
    }

    #[test]
    fn duplicate_edges_are_kept() {
        let mut tree = FilesystemTree::default();
        tree.insert(5, "LONGNAME.TXT".into(), 30);
        tree.insert(5, "LONGNA~1.TXT".into(), 30);
        assert_eq!(tree.children(5).unwrap().len(), 2);
    }

    #[test]
    fn resolve_walks_paths_case_insensitively() {
        let tree = sample_tree();
        assert_eq!(tree.resolve(""), Some(ROOT_ENTRY));
        assert_eq!(tree.resolve("."), Some(ROOT_ENTRY));
        assert_eq!(tree.resolve("/"), Some(ROOT_ENTRY));
        assert_eq!(tree.resolve("windows"), Some(40));
        assert_eq!(tree.resolve("Users/ALICE"), Some(42));
        assert_eq!(tree.resolve("/users/alice/"), Some(42));
        assert_eq!(tree.resolve("users/bob"), None);
    }

    #[test]
    fn find_returns_distinct_paths_from_separate_directories() {
        let tree = sample_tree();
        let hits = tree.find("notes");
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&"/Windows/notes.txt".to_string()));
        assert!(hits.contains(&"/Users/alice/notes.txt".to_string()));
    }

    #[test]
    fn find_matches_substring_of_final_component_only() {
        let tree = sample_tree();
        // "alice" is a directory name; it still matches as a component.
        assert_eq!(tree.find("alice"), vec!["/Users/alice".to_string()]);
        // Directory names along the path do not match for their children.
        assert!(tree.find("windows").iter().all(|p| p == "/Windows"));
    }

    #[test]
    fn find_survives_parent_child_cycles() {
        let mut tree = FilesystemTree::default();
        tree.insert(ROOT_ENTRY, "a".into(), 10);
        tree.insert(10, "b".into(), 11);
        tree.insert(11, "a".into(), 10); // cycle back
        let hits = tree.find("b");
        assert_eq!(hits, vec!["/a/b".to_string()]);
    }
}
