//! Presentation model: what a window (or the CLI) shows and the actions it
//! can trigger. Owns the icon cache and clears it on every category switch.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheStats, IconCache};
use crate::catalog::{Catalog, Tool, ToolKey, ToolKind};
use crate::config::ToolboxConfig;
use crate::error::{Result, ToolboxError};
use crate::icons::{Bitmap, IconResolver, PLACEHOLDER_GLYPH};
use crate::launcher::{Opener, SystemOpener};
use crate::metadata::MetadataStore;

pub const EMPTY_CATEGORY_MESSAGE: &str = "No tools in this category";

/// One grid item.
#[derive(Debug, Clone, Serialize)]
pub struct ToolTile {
    pub key: String,
    pub file_name: String,
    pub path: PathBuf,
    pub kind: ToolKind,
    pub display_name: String,
    /// Tooltip text; absent when no description is stored
    pub tooltip: Option<String>,
    #[serde(skip)]
    pub icon: Option<Arc<Bitmap>>,
    pub row: usize,
    pub column: usize,
}

impl ToolTile {
    /// Text to draw where the icon would be.
    pub fn glyph(&self) -> Option<&'static str> {
        self.icon.is_none().then_some(PLACEHOLDER_GLYPH)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub category: String,
    pub tiles: Vec<ToolTile>,
    pub columns: usize,
}

impl CategoryView {
    pub fn empty_message(&self) -> Option<&'static str> {
        self.tiles.is_empty().then_some(EMPTY_CATEGORY_MESSAGE)
    }
}

/// Prefilled contents of the edit dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub key: ToolKey,
    pub name: String,
    pub description: String,
    /// Whether the values come from stored info rather than defaults
    pub stored: bool,
}

pub struct Toolbox {
    config: ToolboxConfig,
    catalog: Catalog,
    metadata: MetadataStore,
    icons: IconResolver,
    icon_cache: IconCache,
    opener: Box<dyn Opener>,
    current: Option<String>,
}

impl Toolbox {
    pub fn load(config: ToolboxConfig) -> Result<Self> {
        let catalog = Catalog::new(&config.catalog.root);
        if catalog.root().exists() && !catalog.root().is_dir() {
            return Err(ToolboxError::Config(format!(
                "catalog root {} is not a directory",
                catalog.root().display()
            )));
        }
        if config.catalog.create_missing {
            catalog.ensure_root()?;
        }
        let metadata = MetadataStore::load(&config.metadata.path);
        let icons = IconResolver::from_config(&config.icons);
        Ok(Self::with_parts(config, catalog, metadata, icons, Box::new(SystemOpener::new())))
    }

    pub fn with_parts(
        config: ToolboxConfig,
        catalog: Catalog,
        metadata: MetadataStore,
        icons: IconResolver,
        opener: Box<dyn Opener>,
    ) -> Self {
        Self {
            config,
            catalog,
            metadata,
            icons,
            icon_cache: IconCache::new(),
            opener,
            current: None,
        }
    }

    pub fn catalog_root(&self) -> &std::path::Path {
        self.catalog.root()
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn icons_supported(&self) -> bool {
        self.icons.is_supported()
    }

    pub fn categories(&self) -> Vec<String> {
        self.catalog.list_categories()
    }

    #[allow(dead_code)]
    pub fn current_category(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.icon_cache.stats()
    }

    /// Show the first category, if there is one.
    pub fn initial_view(&mut self) -> Option<CategoryView> {
        let first = self.categories().into_iter().next()?;
        Some(self.select_category(&first))
    }

    /// Display `category`: drops every cached icon, then rebuilds the grid.
    pub fn select_category(&mut self, category: &str) -> CategoryView {
        self.icon_cache.clear();
        self.current = Some(category.to_string());

        let columns = self.config.grid.columns.max(1);
        let tools = self.catalog.list_tools(category);
        tracing::debug!("Showing {} tools in category {}", tools.len(), category);

        let tiles = tools
            .into_iter()
            .enumerate()
            .map(|(idx, tool)| self.tile(tool, idx / columns, idx % columns))
            .collect();

        CategoryView {
            category: category.to_string(),
            tiles,
            columns,
        }
    }

    /// Rebuild the current category after an edit.
    #[allow(dead_code)]
    pub fn refresh(&mut self) -> Option<CategoryView> {
        let current = self.current.clone()?;
        Some(self.select_category(&current))
    }

    fn tile(&mut self, tool: Tool, row: usize, column: usize) -> ToolTile {
        let info = self.metadata.get(&tool.key);
        let icon = self
            .icons
            .resolve_tool(&mut self.icon_cache, &tool.path, tool.kind);
        ToolTile {
            key: tool.key.to_string(),
            file_name: tool.key.file_name.clone(),
            path: tool.path,
            kind: tool.kind,
            display_name: info.display_name,
            tooltip: (!info.description.is_empty()).then_some(info.description),
            icon,
            row,
            column,
        }
    }

    pub fn find_tool(&self, key: &ToolKey) -> Result<Tool> {
        if !self.catalog.list_categories().contains(&key.category) {
            return Err(ToolboxError::CategoryNotFound(key.category.clone()));
        }
        self.catalog
            .find_tool(key)
            .ok_or_else(|| ToolboxError::ToolNotFound(key.to_string()))
    }

    /// Resolve the icon for a single tool in the current cache scope.
    pub fn tool_icon(&mut self, key: &ToolKey) -> Result<Option<Arc<Bitmap>>> {
        let tool = self.find_tool(key)?;
        Ok(self.icons.resolve(&mut self.icon_cache, &tool.path))
    }

    pub fn edit_form(&self, key: &ToolKey) -> Result<EditForm> {
        self.find_tool(key)?;
        let info = self.metadata.get(key);
        Ok(EditForm {
            key: key.clone(),
            name: info.display_name,
            description: info.description,
            stored: self.metadata.contains(key),
        })
    }

    pub fn save_edit(&mut self, key: &ToolKey, name: &str, description: &str) -> Result<()> {
        self.find_tool(key)?;
        self.metadata.set(key, name, description)?;
        tracing::info!("Updated tool info for {}", key);
        Ok(())
    }

    /// Drop stored info for `key`. Returns whether anything was stored.
    pub fn reset(&mut self, key: &ToolKey) -> Result<bool> {
        let removed = self.metadata.remove(key)?;
        if removed {
            tracing::info!("Reset tool info for {}", key);
        }
        Ok(removed)
    }

    /// Hand the tool to the OS default handler.
    pub fn open(&self, key: &ToolKey) -> Result<()> {
        let tool = self.find_tool(key)?;
        self.opener.open(&tool.path)
    }
}
