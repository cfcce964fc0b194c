use std::fmt;
use std::path::{Path, PathBuf};

use crate::catalog::{lowercase_extension, ToolKind};

/// Extensions whose files carry their own icon resources.
pub const RESOURCE_EXTENSIONS: &[&str] = &["exe", "dll", "ico"];

/// The file an icon is actually extracted from, plus the sub-index selecting
/// one icon among several embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSource {
    pub path: PathBuf,
    pub index: i32,
}

impl IconSource {
    pub fn new(path: impl Into<PathBuf>, index: i32) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }

    /// Parse a shell icon location such as `C:\app.exe,2` or `"C:\app.exe"`.
    ///
    /// The index follows the last comma; a missing or non-numeric index reads
    /// as 0. Returns `None` when the path part is empty (e.g. `",0"`).
    pub fn parse_location(location: &str) -> Option<Self> {
        let location = location.trim();
        let (path, index) = match location.rsplit_once(',') {
            Some((path, index)) => (path, index.trim().parse::<i32>().unwrap_or(0)),
            None => (location, 0),
        };
        let path = path.trim().trim_matches('"').trim();
        if path.is_empty() {
            return None;
        }
        Some(Self::new(path, index))
    }
}

/// Icon cache key.
///
/// Resource-bearing tools key on `lowercase(source)@index`, so distinct
/// executables never collide. Everything else keys on the tool's extension
/// and shares one generic icon per file type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IconKey(String);

impl IconKey {
    pub fn for_tool(
        tool_path: &Path,
        kind: ToolKind,
        source: &IconSource,
        is_resource_bearing: impl Fn(&str) -> bool,
    ) -> Self {
        let extension = lowercase_extension(tool_path);
        let resource = kind.is_shortcut()
            || extension.as_deref().map(&is_resource_bearing).unwrap_or(false);

        if resource {
            Self(format!(
                "{}@{}",
                source.path.to_string_lossy().to_lowercase(),
                source.index
            ))
        } else {
            Self(extension.map(|e| format!(".{}", e)).unwrap_or_default())
        }
    }

    #[allow(dead_code)]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for IconKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_default_resource_extension(extension: &str) -> bool {
    RESOURCE_EXTENSIONS.contains(&extension)
}
