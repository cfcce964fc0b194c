//! freedesktop.org icon theme lookup (PNG icons only).

use std::path::{Path, PathBuf};

use crate::config::IconsConfig;

const CONTEXTS: &[&str] = &[
    "apps",
    "mimetypes",
    "places",
    "devices",
    "categories",
    "actions",
    "status",
];

const FALLBACK_SIZES: &[u32] = &[48, 32, 64, 24, 128, 256, 16];

#[derive(Debug, Clone)]
pub struct IconTheme {
    base_dirs: Vec<PathBuf>,
    themes: Vec<String>,
    sizes: Vec<u32>,
}

impl IconTheme {
    pub fn new(base_dirs: Vec<PathBuf>, themes: Vec<String>, preferred_size: u32) -> Self {
        let mut sizes = vec![preferred_size];
        sizes.extend(FALLBACK_SIZES.iter().copied().filter(|s| *s != preferred_size));
        Self {
            base_dirs,
            themes,
            sizes,
        }
    }

    /// Configured directories first, then the XDG search path.
    pub fn from_config(config: &IconsConfig) -> Self {
        let mut base_dirs = config.theme_dirs.clone();
        base_dirs.extend(xdg_icon_dirs());
        Self::new(base_dirs, config.themes.clone(), config.size)
    }

    /// Find the PNG for icon `name`, preferring the configured size.
    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        let name = strip_image_extension(name);
        if name.is_empty() || name.contains(['/', '\\']) {
            return None;
        }
        let file_name = format!("{}.png", name);

        for base in &self.base_dirs {
            for theme in &self.themes {
                for size in &self.sizes {
                    let size_dir = base.join(theme).join(format!("{0}x{0}", size));
                    for context in CONTEXTS {
                        let candidate = size_dir.join(context).join(&file_name);
                        if candidate.is_file() {
                            return Some(candidate);
                        }
                    }
                }
            }
            // pixmaps-style flat directory
            let flat = base.join(&file_name);
            if flat.is_file() {
                return Some(flat);
            }
        }
        None
    }
}

fn strip_image_extension(name: &str) -> &str {
    let path = Path::new(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") | Some("xpm") | Some("svg") => name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(name),
        _ => name,
    }
}

fn xdg_icon_dirs() -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Some(home) = dirs::home_dir() {
        found.push(home.join(".icons"));
    }
    if let Some(data) = dirs::data_dir() {
        found.push(data.join("icons"));
    }
    let data_dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
        found.push(Path::new(dir).join("icons"));
    }
    found.push(PathBuf::from("/usr/share/pixmaps"));
    found
}
