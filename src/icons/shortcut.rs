//! Shortcut resolution: what a link points at and which icon it asks for.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::theme::IconTheme;
use super::IconError;
use crate::catalog::ShortcutFormat;

/// Desktop entry Exec field codes (%f, %U, %i, ...)
static FIELD_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[a-zA-Z%]").unwrap());

/// What a shortcut declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutInfo {
    pub target: Option<PathBuf>,
    /// Icon hint in `path,index` form
    pub icon_location: Option<String>,
}

pub trait ShortcutResolver {
    fn resolve(&self, path: &Path, format: ShortcutFormat) -> Result<ShortcutInfo, IconError>;
}

/// Reads the shortcut formats the host understands.
pub struct SystemShortcuts {
    theme: IconTheme,
}

impl SystemShortcuts {
    pub fn new(theme: IconTheme) -> Self {
        Self { theme }
    }
}

impl ShortcutResolver for SystemShortcuts {
    fn resolve(&self, path: &Path, format: ShortcutFormat) -> Result<ShortcutInfo, IconError> {
        match format {
            ShortcutFormat::Symlink => resolve_symlink(path),
            ShortcutFormat::DesktopEntry => {
                let content = std::fs::read_to_string(path)?;
                let entry = DesktopEntry::parse(&content)
                    .ok_or_else(|| IconError::Shortcut("missing [Desktop Entry] group".into()))?;
                Ok(entry.into_info(&self.theme))
            }
            #[cfg(windows)]
            ShortcutFormat::WindowsLink => super::win32::read_shell_link(path),
            #[cfg(not(windows))]
            ShortcutFormat::WindowsLink => Err(IconError::Unsupported("shell links")),
        }
    }
}

fn resolve_symlink(path: &Path) -> Result<ShortcutInfo, IconError> {
    let target = std::fs::read_link(path)?;
    let target = if target.is_relative() {
        path.parent().map(|p| p.join(&target)).unwrap_or(target)
    } else {
        target
    };
    Ok(ShortcutInfo {
        target: Some(target),
        icon_location: None,
    })
}

/// The `[Desktop Entry]` group of a .desktop file, unlocalized keys only.
#[derive(Debug, Default)]
pub struct DesktopEntry {
    fields: HashMap<String, String>,
}

impl DesktopEntry {
    pub fn parse(content: &str) -> Option<Self> {
        let mut fields = HashMap::new();
        let mut in_entry = false;
        let mut seen_entry = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_entry = line == "[Desktop Entry]";
                seen_entry |= in_entry;
                continue;
            }
            if !in_entry {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.contains('[') {
                    fields.insert(key.to_string(), value.trim().to_string());
                }
            }
        }

        seen_entry.then_some(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// The program this entry runs, from `TryExec` or the first `Exec` word.
    pub fn program(&self) -> Option<String> {
        if let Some(try_exec) = self.get("TryExec") {
            return Some(try_exec.to_string());
        }
        let exec = self.get("Exec")?;
        let exec = FIELD_CODE.replace_all(exec, "");
        let program = if let Some(rest) = exec.trim_start().strip_prefix('"') {
            rest.split('"').next().unwrap_or_default()
        } else {
            exec.split_whitespace().next().unwrap_or_default()
        };
        (!program.is_empty()).then(|| program.to_string())
    }

    fn into_info(self, theme: &IconTheme) -> ShortcutInfo {
        let icon_location = self.get("Icon").and_then(|icon| {
            if Path::new(icon).is_absolute() {
                Some(icon.to_string())
            } else {
                theme
                    .lookup(icon)
                    .map(|p| p.to_string_lossy().into_owned())
            }
        });

        let target = self.program().and_then(|program| {
            let program = PathBuf::from(program);
            if program.is_absolute() {
                Some(program)
            } else {
                which::which(&program).ok()
            }
        });

        ShortcutInfo {
            target,
            icon_location,
        }
    }
}
