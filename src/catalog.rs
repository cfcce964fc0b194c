//! Folder-backed tool catalog.
//!
//! The root directory holds one subdirectory per category; the files directly
//! inside a category are its tools. Nothing is cached: every call re-reads
//! the filesystem, and missing directories read as empty.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

/// How a tool file points at what it launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutFormat {
    /// Windows shell link (`.lnk`)
    WindowsLink,
    /// freedesktop.org desktop entry (`.desktop`)
    DesktopEntry,
    /// Filesystem symbolic link
    Symlink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "format")]
pub enum ToolKind {
    File,
    Shortcut(ShortcutFormat),
}

impl ToolKind {
    pub fn classify(path: &Path) -> Self {
        let is_symlink = std::fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        Self::from_parts(path, is_symlink)
    }

    fn from_parts(path: &Path, is_symlink: bool) -> Self {
        if is_symlink {
            return Self::Shortcut(ShortcutFormat::Symlink);
        }
        match lowercase_extension(path).as_deref() {
            Some("lnk") => Self::Shortcut(ShortcutFormat::WindowsLink),
            Some("desktop") => Self::Shortcut(ShortcutFormat::DesktopEntry),
            _ => Self::File,
        }
    }

    pub fn is_shortcut(&self) -> bool {
        matches!(self, Self::Shortcut(_))
    }
}

/// Stable identity of a tool: `"<category>/<filename>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ToolKey {
    pub category: String,
    pub file_name: String,
}

impl ToolKey {
    pub fn new(category: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            file_name: file_name.into(),
        }
    }

    /// File name without its last extension, used as the default display name.
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone())
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub key: ToolKey,
    pub path: PathBuf,
    pub kind: ToolKind,
}

pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Category names, sorted.
    pub fn list_categories(&self) -> Vec<String> {
        if !self.root.is_dir() {
            return Vec::new();
        }
        direct_children(&self.root)
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }

    /// Files directly inside `category`, sorted by file name.
    pub fn list_tools(&self, category: &str) -> Vec<Tool> {
        if !is_plain_name(category) {
            return Vec::new();
        }
        let dir = self.root.join(category);
        if !dir.is_dir() {
            return Vec::new();
        }
        direct_children(&dir)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let file_name = e.file_name().to_string_lossy().into_owned();
                let kind = ToolKind::from_parts(e.path(), e.path_is_symlink());
                Tool {
                    key: ToolKey::new(category, file_name),
                    path: e.into_path(),
                    kind,
                }
            })
            .collect()
    }

    pub fn find_tool(&self, key: &ToolKey) -> Option<Tool> {
        if !is_plain_name(&key.file_name) {
            return None;
        }
        self.list_tools(&key.category)
            .into_iter()
            .find(|t| t.key.file_name == key.file_name)
    }
}

fn direct_children(dir: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Broken symlinks and unreadable entries are not tools
                tracing::debug!("Skipping catalog entry: {}", e);
                None
            }
        })
}

/// A single path component: no separators, not `.` or `..`.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}
