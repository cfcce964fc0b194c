use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Edge length of rendered icons in logical pixels.
pub const DEFAULT_ICON_SIZE: u32 = 48;

/// Largest accepted `icons.size`.
pub const MAX_ICON_SIZE: u32 = 256;

/// toolbox configuration from config.toml
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct ToolboxConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub icons: IconsConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Directory holding one subdirectory per category
    #[serde(default = "default_catalog_root")]
    pub root: PathBuf,
    /// Create the root directory at startup when it is missing
    #[serde(default = "default_true")]
    pub create_missing: bool,
}

fn default_catalog_root() -> PathBuf {
    PathBuf::from("tools")
}

fn default_true() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: default_catalog_root(),
            create_missing: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_path")]
    pub path: PathBuf,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("toolbox_data.json")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: default_metadata_path(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IconsConfig {
    /// Disable to always show the placeholder glyph
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_icon_size")]
    pub size: u32,
    /// Remember failed lookups until the next category switch
    #[serde(default = "default_true")]
    pub negative_cache: bool,
    /// Extra icon theme base directories, searched before the XDG ones
    #[serde(default)]
    pub theme_dirs: Vec<PathBuf>,
    #[serde(default = "default_themes")]
    pub themes: Vec<String>,
}

fn default_icon_size() -> u32 {
    DEFAULT_ICON_SIZE
}

fn default_themes() -> Vec<String> {
    vec!["hicolor".to_string()]
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: default_icon_size(),
            negative_cache: true,
            theme_dirs: Vec::new(),
            themes: default_themes(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GridConfig {
    #[serde(default = "default_columns")]
    pub columns: usize,
}

fn default_columns() -> usize {
    5
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
        }
    }
}

impl ToolboxConfig {
    /// Resolve relative catalog and metadata paths against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if self.catalog.root.is_relative() {
            self.catalog.root = base.join(&self.catalog.root);
        }
        if self.metadata.path.is_relative() {
            self.metadata.path = base.join(&self.metadata.path);
        }
        self
    }

    /// Replace out-of-range values with defaults.
    pub fn validated(mut self) -> Self {
        if !(1..=MAX_ICON_SIZE).contains(&self.icons.size) {
            tracing::warn!(
                "icons.size {} out of range 1..={}, using {}",
                self.icons.size,
                MAX_ICON_SIZE,
                DEFAULT_ICON_SIZE
            );
            self.icons.size = DEFAULT_ICON_SIZE;
        }
        if self.grid.columns == 0 {
            tracing::warn!("grid.columns must be at least 1, using {}", default_columns());
            self.grid.columns = default_columns();
        }
        self
    }
}

/// Path of the config file inside a `.toolbox` directory.
pub fn config_path(toolbox_dir: &Path) -> PathBuf {
    toolbox_dir.join("config.toml")
}

/// Load config.toml from `toolbox_dir`, falling back to defaults.
pub fn load_config(toolbox_dir: &Path) -> ToolboxConfig {
    let config_path = config_path(toolbox_dir);
    if !config_path.exists() {
        return ToolboxConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => toml::from_str::<ToolboxConfig>(&content)
            .map(ToolboxConfig::validated)
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config.toml: {}", e);
                ToolboxConfig::default()
            }),
        Err(e) => {
            tracing::warn!("Failed to read config.toml: {}", e);
            ToolboxConfig::default()
        }
    }
}

pub const DEFAULT_CONFIG: &str = r#"# toolbox configuration
# See: toolbox config --help

[catalog]
root = "tools"
create_missing = true

[metadata]
path = "toolbox_data.json"

[icons]
enabled = true
size = 48
negative_cache = true
theme_dirs = []
themes = ["hicolor"]

[grid]
columns = 5
"#;
