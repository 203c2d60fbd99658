//! Link-target resolution against the indexed workspace.
//!
//! The index is explicit state owned by the builder and passed by reference
//! to consumers; nothing here reaches for global lookup tables.

use std::collections::HashMap;

use crate::tree::parent_of;

/// Index of workspace files for link resolution.
///
/// Lookups are case-insensitive. `by_path` maps the full normalized path,
/// `by_stem` maps the file name with and without extension to every path
/// that answers to it.
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    by_path: HashMap<String, String>,
    by_stem: HashMap<String, Vec<String>>,
}

fn normalize(target: &str) -> String {
    target
        .trim()
        .trim_start_matches("./")
        .replace('\\', "/")
        .to_ascii_lowercase()
}

fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Register a workspace-relative path.
    pub fn insert(&mut self, path: &str) {
        let normalized = normalize(path);
        self.by_path.insert(normalized.clone(), path.to_string());

        let name = normalized.rsplit('/').next().unwrap_or(&normalized);
        for key in [name.to_string(), stem_of(name).to_string()] {
            let paths = self.by_stem.entry(key).or_default();
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
    }

    /// Forget a path (on deletion or re-processing).
    pub fn remove(&mut self, path: &str) {
        let normalized = normalize(path);
        self.by_path.remove(&normalized);
        let name = normalized.rsplit('/').next().unwrap_or(&normalized).to_string();
        for key in [name.clone(), stem_of(&name).to_string()] {
            if let Some(paths) = self.by_stem.get_mut(&key) {
                paths.retain(|p| p != path);
                if paths.is_empty() {
                    self.by_stem.remove(&key);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_stem.clear();
    }

    /// Resolve a raw link target against the index.
    ///
    /// Exact path match wins; then the path with a markdown extension
    /// appended; then a file-name/stem match, preferring a candidate in the
    /// same directory as the linking document when several files share the
    /// name. Returns `None` for targets no indexed file answers — the caller
    /// substitutes a phantom node.
    pub fn resolve(&self, target: &str, source_path: &str) -> Option<String> {
        let normalized = normalize(target);
        if normalized.is_empty() {
            return None;
        }

        if let Some(path) = self.by_path.get(&normalized) {
            return Some(path.clone());
        }
        for ext in ["md", "markdown"] {
            if let Some(path) = self.by_path.get(&format!("{normalized}.{ext}")) {
                return Some(path.clone());
            }
        }

        let name = normalized.rsplit('/').next().unwrap_or(&normalized);
        let candidates = self.by_stem.get(name)?;
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }

        let source_dir = parent_of(&normalize(source_path));
        let mut sorted: Vec<&String> = candidates.iter().collect();
        sorted.sort();
        sorted
            .iter()
            .find(|p| parent_of(&normalize(p)) == source_dir)
            .or(sorted.first())
            .map(|p| (*p).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(paths: &[&str]) -> FileIndex {
        let mut idx = FileIndex::new();
        for p in paths {
            idx.insert(p);
        }
        idx
    }

    #[test]
    fn exact_path_wins() {
        let idx = index(&["home.md", "projects/home.md"]);
        assert_eq!(idx.resolve("projects/home.md", "other.md").as_deref(), Some("projects/home.md"));
    }

    #[test]
    fn extension_appended() {
        let idx = index(&["projects/readme.md"]);
        assert_eq!(
            idx.resolve("Projects/README", "home.md").as_deref(),
            Some("projects/readme.md")
        );
    }

    #[test]
    fn stem_match_case_insensitive() {
        let idx = index(&["notes/Weekly Plan.md"]);
        assert_eq!(
            idx.resolve("weekly plan", "home.md").as_deref(),
            Some("notes/Weekly Plan.md")
        );
    }

    #[test]
    fn same_directory_preferred_on_ambiguity() {
        let idx = index(&["a/readme.md", "b/readme.md"]);
        assert_eq!(
            idx.resolve("readme", "b/index.md").as_deref(),
            Some("b/readme.md")
        );
    }

    #[test]
    fn unresolved_returns_none() {
        let idx = index(&["home.md"]);
        assert_eq!(idx.resolve("No Such Note", "home.md"), None);
    }

    #[test]
    fn remove_forgets_path() {
        let mut idx = index(&["home.md"]);
        idx.remove("home.md");
        assert_eq!(idx.resolve("home", "x.md"), None);
        assert!(idx.is_empty());
    }
}
