//! Icon resolution for catalog tools.
//!
//! A lookup walks: shortcut indirection -> icon source -> cache key -> cache
//! -> native extraction (embedded resource, then file-type association) ->
//! fixed-size bitmap. Every failure along the way becomes `None` so the
//! caller can show a placeholder.

mod freedesktop;
mod shortcut;
mod source;
mod theme;
#[cfg(windows)]
mod win32;

use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use thiserror::Error;

use crate::cache::{CachedIcon, IconCache};
use crate::catalog::ToolKind;
use crate::config::{IconsConfig, MAX_ICON_SIZE};

pub use freedesktop::FreedesktopIconProvider;
pub use shortcut::{ShortcutResolver, SystemShortcuts};
pub use source::{IconKey, IconSource};
pub use theme::IconTheme;

/// Shown in place of an icon when none could be resolved.
pub const PLACEHOLDER_GLYPH: &str = "📦";

#[derive(Error, Debug)]
pub enum IconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Malformed shortcut: {0}")]
    Shortcut(String),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("Render failed: {0}")]
    Render(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),
}

/// A square RGBA bitmap ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    /// Scale `image` to `edge` x `edge`.
    pub fn from_rgba(image: &RgbaImage, edge: u32) -> Self {
        let image = if image.width() == edge && image.height() == edge {
            image.clone()
        } else {
            imageops::resize(image, edge, edge, FilterType::Lanczos3)
        };
        Self { image }
    }

    #[allow(dead_code)]
    pub fn solid(edge: u32, rgba: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(edge, edge, Rgba(rgba)),
        }
    }

    pub fn edge(&self) -> u32 {
        self.image.width()
    }

    #[allow(dead_code)]
    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> Result<(), IconError> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// A native icon. Whatever it holds is released when it is dropped.
pub trait IconHandle {
    fn render(&self, edge: u32) -> Result<Bitmap, IconError>;
}

pub type NativeIcon = Box<dyn IconHandle>;

/// Platform icon extraction capability.
pub trait IconProvider {
    fn is_supported(&self) -> bool {
        true
    }

    /// Whether files with this (lowercase) extension carry their own icon
    /// and therefore need a per-file cache key.
    fn is_resource_bearing(&self, extension: &str) -> bool {
        source::is_default_resource_extension(extension)
    }

    /// Icon embedded in `source` at its sub-index, small variant preferred.
    fn extract_resource(&self, source: &IconSource) -> Option<NativeIcon>;

    /// Generic icon the OS associates with the type of `path`.
    fn association_icon(&self, path: &Path) -> Option<NativeIcon>;
}

/// Small variant first, large when no small one exists.
pub fn pick_variant<T>(small: Option<T>, large: Option<T>) -> Option<T> {
    small.or(large)
}

/// Used where icons cannot be extracted; every lookup yields `None`.
pub struct NullIconProvider;

impl IconProvider for NullIconProvider {
    fn is_supported(&self) -> bool {
        false
    }

    fn extract_resource(&self, _source: &IconSource) -> Option<NativeIcon> {
        None
    }

    fn association_icon(&self, _path: &Path) -> Option<NativeIcon> {
        None
    }
}

pub struct IconResolver {
    provider: Box<dyn IconProvider>,
    shortcuts: Box<dyn ShortcutResolver>,
    edge: u32,
    negative_cache: bool,
}

impl IconResolver {
    pub fn new(
        provider: Box<dyn IconProvider>,
        shortcuts: Box<dyn ShortcutResolver>,
        edge: u32,
    ) -> Self {
        Self {
            provider,
            shortcuts,
            edge,
            negative_cache: true,
        }
    }

    pub fn with_negative_cache(mut self, enabled: bool) -> Self {
        self.negative_cache = enabled;
        self
    }

    /// Pick the provider for the host platform.
    pub fn from_config(config: &IconsConfig) -> Self {
        let theme = IconTheme::from_config(config);
        let shortcuts = Box::new(SystemShortcuts::new(theme.clone()));

        let provider: Box<dyn IconProvider> = if !config.enabled {
            Box::new(NullIconProvider)
        } else {
            platform_provider(theme)
        };
        tracing::debug!(
            "Icon extraction {}",
            if provider.is_supported() { "enabled" } else { "disabled" }
        );

        let edge = config.size.clamp(1, MAX_ICON_SIZE);
        Self::new(provider, shortcuts, edge).with_negative_cache(config.negative_cache)
    }

    pub fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    /// Resolve the icon for the file at `path`.
    pub fn resolve(&self, cache: &mut IconCache, path: &Path) -> CachedIcon {
        self.resolve_tool(cache, path, ToolKind::classify(path))
    }

    pub fn resolve_tool(&self, cache: &mut IconCache, path: &Path, kind: ToolKind) -> CachedIcon {
        if !self.provider.is_supported() {
            return None;
        }

        let source = self.icon_source(path, kind);
        let key = self.cache_key(path, kind, &source);
        if let Some(cached) = cache.get(&key) {
            return cached;
        }

        let icon = self.extract(&source).map(Arc::new);
        if icon.is_some() || self.negative_cache {
            cache.insert(key, icon.clone());
        }
        icon
    }

    /// The file (and sub-index) the icon for `path` comes from.
    pub fn icon_source(&self, path: &Path, kind: ToolKind) -> IconSource {
        let ToolKind::Shortcut(format) = kind else {
            return IconSource::new(path, 0);
        };

        match self.shortcuts.resolve(path, format) {
            Ok(info) => info
                .icon_location
                .as_deref()
                .and_then(IconSource::parse_location)
                .or_else(|| info.target.map(|target| IconSource::new(target, 0)))
                .unwrap_or_else(|| IconSource::new(path, 0)),
            Err(e) => {
                tracing::debug!("Cannot resolve shortcut {}: {}", path.display(), e);
                IconSource::new(path, 0)
            }
        }
    }

    pub fn cache_key(&self, path: &Path, kind: ToolKind, source: &IconSource) -> IconKey {
        IconKey::for_tool(path, kind, source, |ext| {
            self.provider.is_resource_bearing(ext)
        })
    }

    fn extract(&self, source: &IconSource) -> Option<Bitmap> {
        let handle = self
            .provider
            .extract_resource(source)
            .or_else(|| self.provider.association_icon(&source.path))?;

        // `handle` drops at the end of this scope on both arms
        match handle.render(self.edge) {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                tracing::debug!("Failed to render icon for {}: {}", source.path.display(), e);
                None
            }
        }
    }
}

#[cfg(windows)]
fn platform_provider(_theme: IconTheme) -> Box<dyn IconProvider> {
    Box::new(win32::ShellIconProvider)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_provider(theme: IconTheme) -> Box<dyn IconProvider> {
    Box::new(FreedesktopIconProvider::new(theme))
}

#[cfg(not(any(windows, all(unix, not(target_os = "macos")))))]
fn platform_provider(_theme: IconTheme) -> Box<dyn IconProvider> {
    Box::new(NullIconProvider)
}

#[cfg(test)]
mod tests {
    use super::shortcut::ShortcutInfo;
    use super::*;
    use crate::catalog::ShortcutFormat;
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Counts extraction calls and handle releases.
    #[derive(Default)]
    struct Counters {
        resource_calls: Cell<u32>,
        association_calls: Cell<u32>,
        released: Cell<u32>,
        sources: RefCell<Vec<IconSource>>,
    }

    struct FakeHandle {
        counters: Rc<Counters>,
        fail: bool,
    }

    impl IconHandle for FakeHandle {
        fn render(&self, edge: u32) -> Result<Bitmap, IconError> {
            if self.fail {
                return Err(IconError::Render("boom".into()));
            }
            Ok(Bitmap::solid(edge, [10, 20, 30, 255]))
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.counters.released.set(self.counters.released.get() + 1);
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        counters: Rc<Counters>,
        has_resource: bool,
        has_association: bool,
        render_fails: bool,
    }

    impl FakeProvider {
        fn handle(&self) -> NativeIcon {
            Box::new(FakeHandle {
                counters: self.counters.clone(),
                fail: self.render_fails,
            })
        }
    }

    impl IconProvider for FakeProvider {
        fn extract_resource(&self, source: &IconSource) -> Option<NativeIcon> {
            let c = &self.counters;
            c.resource_calls.set(c.resource_calls.get() + 1);
            c.sources.borrow_mut().push(source.clone());
            self.has_resource.then(|| self.handle())
        }

        fn association_icon(&self, _path: &Path) -> Option<NativeIcon> {
            let c = &self.counters;
            c.association_calls.set(c.association_calls.get() + 1);
            self.has_association.then(|| self.handle())
        }
    }

    struct FakeShortcuts(Option<ShortcutInfo>);

    impl ShortcutResolver for FakeShortcuts {
        fn resolve(&self, _path: &Path, _format: ShortcutFormat) -> Result<ShortcutInfo, IconError> {
            self.0
                .clone()
                .ok_or_else(|| IconError::Shortcut("unreadable".into()))
        }
    }

    fn resolver(provider: FakeProvider, shortcuts: Option<ShortcutInfo>) -> IconResolver {
        IconResolver::new(Box::new(provider), Box::new(FakeShortcuts(shortcuts)), 48)
    }

    fn resource_provider() -> (FakeProvider, Rc<Counters>) {
        let provider = FakeProvider {
            has_resource: true,
            ..Default::default()
        };
        let counters = provider.counters.clone();
        (provider, counters)
    }

    #[test]
    fn test_unsupported_platform_returns_none() {
        let resolver = IconResolver::new(
            Box::new(NullIconProvider),
            Box::new(FakeShortcuts(None)),
            48,
        );
        let mut cache = IconCache::new();
        assert!(resolver.resolve_tool(&mut cache, Path::new("a.exe"), ToolKind::File).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let (provider, counters) = resource_provider();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();

        let first = resolver
            .resolve_tool(&mut cache, Path::new("t/app.exe"), ToolKind::File)
            .unwrap();
        let second = resolver
            .resolve_tool(&mut cache, Path::new("t/app.exe"), ToolKind::File)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.edge(), 48);
        assert_eq!(counters.resource_calls.get(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_executables_do_not_collide() {
        let (provider, counters) = resource_provider();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();

        resolver.resolve_tool(&mut cache, Path::new("t/a.exe"), ToolKind::File);
        resolver.resolve_tool(&mut cache, Path::new("t/b.exe"), ToolKind::File);
        assert_eq!(counters.resource_calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_same_extension_shares_entry() {
        let provider = FakeProvider {
            has_association: true,
            ..Default::default()
        };
        let counters = provider.counters.clone();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();

        let a = resolver.resolve_tool(&mut cache, Path::new("t/a.txt"), ToolKind::File).unwrap();
        let b = resolver.resolve_tool(&mut cache, Path::new("t/b.txt"), ToolKind::File).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&IconKey::from_raw(".txt")));
        assert_eq!(counters.association_calls.get(), 1);
    }

    #[test]
    fn test_shortcut_icon_location_wins() {
        let (provider, counters) = resource_provider();
        let info = ShortcutInfo {
            target: Some(PathBuf::from(r"C:\other.exe")),
            icon_location: Some(r"C:\app.exe,2".into()),
        };
        let resolver = resolver(provider, Some(info));
        let mut cache = IconCache::new();
        let kind = ToolKind::Shortcut(ShortcutFormat::WindowsLink);

        assert!(resolver.resolve_tool(&mut cache, Path::new("t/App.lnk"), kind).is_some());
        assert_eq!(
            counters.sources.borrow().as_slice(),
            &[IconSource::new(r"C:\app.exe", 2)]
        );
        assert!(cache.contains(&IconKey::from_raw(r"c:\app.exe@2")));
    }

    #[test]
    fn test_shortcut_falls_back_to_target_then_itself() {
        let kind = ToolKind::Shortcut(ShortcutFormat::WindowsLink);
        let link = Path::new("t/App.lnk");

        let target_only = ShortcutInfo {
            target: Some(PathBuf::from(r"C:\tool.exe")),
            icon_location: Some(",0".into()),
        };
        let resolver_a = resolver(FakeProvider::default(), Some(target_only));
        assert_eq!(resolver_a.icon_source(link, kind), IconSource::new(r"C:\tool.exe", 0));

        let resolver_b = resolver(FakeProvider::default(), None);
        assert_eq!(resolver_b.icon_source(link, kind), IconSource::new(link, 0));

        let resolver_c = resolver(FakeProvider::default(), Some(ShortcutInfo::default()));
        assert_eq!(resolver_c.icon_source(link, kind), IconSource::new(link, 0));
    }

    #[test]
    fn test_association_fallback_after_missing_resource() {
        let provider = FakeProvider {
            has_association: true,
            ..Default::default()
        };
        let counters = provider.counters.clone();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();

        assert!(resolver.resolve_tool(&mut cache, Path::new("t/a.exe"), ToolKind::File).is_some());
        assert_eq!(counters.resource_calls.get(), 1);
        assert_eq!(counters.association_calls.get(), 1);
    }

    #[test]
    fn test_failures_are_negatively_cached() {
        let provider = FakeProvider::default();
        let counters = provider.counters.clone();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();

        assert!(resolver.resolve_tool(&mut cache, Path::new("t/a.bin"), ToolKind::File).is_none());
        assert!(resolver.resolve_tool(&mut cache, Path::new("t/b.bin"), ToolKind::File).is_none());
        assert_eq!(counters.resource_calls.get(), 1);
        assert_eq!(cache.stats().negative_entries, 1);
    }

    #[test]
    fn test_negative_cache_can_be_disabled() {
        let provider = FakeProvider::default();
        let counters = provider.counters.clone();
        let resolver = resolver(provider, None).with_negative_cache(false);
        let mut cache = IconCache::new();

        resolver.resolve_tool(&mut cache, Path::new("t/a.bin"), ToolKind::File);
        resolver.resolve_tool(&mut cache, Path::new("t/a.bin"), ToolKind::File);
        assert_eq!(counters.resource_calls.get(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_handles_released_even_when_render_fails() {
        let provider = FakeProvider {
            has_resource: true,
            render_fails: true,
            ..Default::default()
        };
        let counters = provider.counters.clone();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();

        for name in ["a.exe", "b.exe", "c.exe"] {
            assert!(resolver
                .resolve_tool(&mut cache, &Path::new("t").join(name), ToolKind::File)
                .is_none());
        }
        assert_eq!(counters.resource_calls.get(), 3);
        assert_eq!(counters.released.get(), 3);
    }

    #[test]
    fn test_handles_released_after_success() {
        let (provider, counters) = resource_provider();
        let resolver = resolver(provider, None);
        let mut cache = IconCache::new();
        resolver.resolve_tool(&mut cache, Path::new("t/a.exe"), ToolKind::File);
        assert_eq!(counters.released.get(), 1);
    }

    #[test]
    fn test_configured_edge_is_bounded() {
        let mut config = IconsConfig::default();
        config.size = 100_000;
        assert_eq!(IconResolver::from_config(&config).edge, MAX_ICON_SIZE);
        config.size = 0;
        assert_eq!(IconResolver::from_config(&config).edge, 1);
    }

    #[test]
    fn test_pick_variant_prefers_small() {
        assert_eq!(pick_variant(Some(16), Some(32)), Some(16));
        assert_eq!(pick_variant(None, Some(32)), Some(32));
        assert_eq!(pick_variant::<u32>(None, None), None);
    }

    #[test]
    fn test_bitmap_png_export() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("icon.png");
        let bitmap = Bitmap::from_rgba(&RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255])), 48);
        bitmap.save_png(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (48, 48));
    }
}
