//! File-tree types, flattening, and the directory-backed provider.

use std::collections::HashMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::ProviderError;

/// One entry in the hierarchical workspace tree supplied by a collaborator.
#[derive(Debug, Clone)]
pub struct FileTreeEntry {
    /// Display name (final path component).
    pub name: String,
    /// Workspace-relative path with `/` separators.
    pub path: String,
    pub is_directory: bool,
    pub children: Vec<FileTreeEntry>,
}

impl FileTreeEntry {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: false,
            children: Vec::new(),
        }
    }

    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<FileTreeEntry>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: true,
            children,
        }
    }
}

/// Supplies the workspace tree and per-path text to the builder.
///
/// Both operations may fail per item without aborting the overall build.
pub trait VaultProvider {
    fn file_tree(&self) -> Result<FileTreeEntry, ProviderError>;
    fn read_file(&self, path: &str) -> Result<String, ProviderError>;
}

/// A file surfaced by flattening, with its containing directory.
#[derive(Debug, Clone)]
pub struct FlatFile {
    pub path: String,
    pub name: String,
    pub parent: String,
}

/// Flatten the tree into files, depth-bounded, with exclusion patterns
/// applied to every path component. Uses an explicit work stack so deep
/// trees never recurse.
pub fn flatten_tree(
    root: &FileTreeEntry,
    max_depth: usize,
    exclude_patterns: &[String],
    extensions: &[String],
) -> Vec<FlatFile> {
    let mut files = Vec::new();
    let mut stack: Vec<(&FileTreeEntry, usize)> = vec![(root, 0)];

    while let Some((entry, depth)) = stack.pop() {
        if depth > max_depth || is_excluded(&entry.path, exclude_patterns) {
            continue;
        }
        if entry.is_directory {
            for child in &entry.children {
                stack.push((child, depth + 1));
            }
        } else if matches_extension(&entry.name, extensions) {
            files.push(FlatFile {
                path: entry.path.clone(),
                name: entry.name.clone(),
                parent: parent_of(&entry.path),
            });
        }
    }

    // Stack order is traversal-dependent; sort for determinism.
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Containing directory of a workspace-relative path ("" at the root).
pub fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn is_excluded(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| !p.is_empty() && path.contains(p.as_str()))
}

fn matches_extension(name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return false,
    };
    extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Directories never worth indexing.
const BLACKLIST: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".git",
    "vendor",
    ".next",
    "coverage",
];

/// Filesystem-backed provider over a root directory.
///
/// This is the only place the crate touches the filesystem; everything else
/// consumes the `VaultProvider` trait.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: std::path::PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.') && s.len() > 1)
        .unwrap_or(false)
}

fn is_blacklisted(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| BLACKLIST.contains(&s))
        .unwrap_or(false)
}

impl VaultProvider for DirectoryProvider {
    fn file_tree(&self) -> Result<FileTreeEntry, ProviderError> {
        let mut root = FileTreeEntry::directory("", "", Vec::new());
        // Maps a relative directory path to its position in the tree,
        // expressed as a child-index trail from the root.
        let mut dir_trails: HashMap<String, Vec<usize>> = HashMap::new();
        dir_trails.insert(String::new(), Vec::new());

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e) && !is_blacklisted(e))
        {
            let entry = entry.map_err(|e| ProviderError::Tree(e.to_string()))?;
            let rel = self.relative(entry.path());
            let name = entry.file_name().to_string_lossy().to_string();
            let parent = parent_of(&rel);

            let Some(trail) = dir_trails.get(&parent).cloned() else {
                continue;
            };
            let parent_entry = entry_at_mut(&mut root, &trail);

            if entry.file_type().is_dir() {
                let mut trail = trail;
                trail.push(parent_entry.children.len());
                parent_entry
                    .children
                    .push(FileTreeEntry::directory(name, rel.clone(), Vec::new()));
                dir_trails.insert(rel, trail);
            } else {
                parent_entry.children.push(FileTreeEntry::file(name, rel));
            }
        }

        Ok(root)
    }

    fn read_file(&self, path: &str) -> Result<String, ProviderError> {
        let full = self.root.join(path);
        if !full.exists() {
            return Err(ProviderError::NotFound(path.to_string()));
        }
        std::fs::read_to_string(&full).map_err(|e| ProviderError::Read {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

fn entry_at_mut<'a>(root: &'a mut FileTreeEntry, trail: &[usize]) -> &'a mut FileTreeEntry {
    let mut current = root;
    for &idx in trail {
        current = &mut current.children[idx];
    }
    current
}
