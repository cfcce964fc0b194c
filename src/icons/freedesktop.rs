//! Icons on freedesktop.org desktops.
//!
//! Icon resources are read from `.ico` files and plain images; everything
//! else gets the theme icon for its MIME type.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::RgbaImage;

use super::source::is_default_resource_extension;
use super::theme::IconTheme;
use super::{pick_variant, Bitmap, IconError, IconHandle, IconProvider, IconSource, NativeIcon};
use crate::catalog::lowercase_extension;

/// Edge of the "small" variant in a multi-size `.ico`.
const SMALL_EDGE: u32 = 16;

const IMAGE_EXTENSIONS: &[&str] = &["png", "bmp", "gif", "jpg", "jpeg"];

pub struct FreedesktopIconProvider {
    theme: IconTheme,
}

impl FreedesktopIconProvider {
    pub fn new(theme: IconTheme) -> Self {
        Self { theme }
    }

    fn load_theme_icon(&self, name: &str) -> Option<NativeIcon> {
        let path = self.theme.lookup(name)?;
        match image::open(&path) {
            Ok(image) => Some(Box::new(DecodedIcon::new(image.to_rgba8()))),
            Err(e) => {
                tracing::debug!("Unreadable theme icon {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl IconProvider for FreedesktopIconProvider {
    fn is_resource_bearing(&self, extension: &str) -> bool {
        is_default_resource_extension(extension) || IMAGE_EXTENSIONS.contains(&extension)
    }

    fn extract_resource(&self, source: &IconSource) -> Option<NativeIcon> {
        let extension = lowercase_extension(&source.path)?;
        let result = if extension == "ico" {
            read_ico(&source.path, source.index)
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) && source.index == 0 {
            image::open(&source.path)
                .map(|image| Some(DecodedIcon::new(image.to_rgba8())))
                .map_err(IconError::from)
        } else {
            return None;
        };

        match result {
            Ok(icon) => icon.map(|icon| Box::new(icon) as NativeIcon),
            Err(e) => {
                tracing::debug!("No icon resource in {}: {}", source.path.display(), e);
                None
            }
        }
    }

    fn association_icon(&self, path: &Path) -> Option<NativeIcon> {
        association_names(path)
            .iter()
            .find_map(|name| self.load_theme_icon(name))
    }
}

/// A single `.ico` holds one icon group, so only index 0 exists.
fn read_ico(path: &Path, index: i32) -> Result<Option<DecodedIcon>, IconError> {
    if index != 0 {
        return Ok(None);
    }
    let dir = ico::IconDir::read(BufReader::new(File::open(path)?))?;
    let entries = dir.entries();
    let small = entries.iter().find(|e| e.width() == SMALL_EDGE);
    let large = entries.iter().max_by_key(|e| e.width());

    let Some(entry) = pick_variant(small, large) else {
        return Ok(None);
    };
    let image = entry.decode()?;
    let rgba = RgbaImage::from_raw(image.width(), image.height(), image.rgba_data().to_vec())
        .ok_or_else(|| IconError::Render("ico entry size mismatch".into()))?;
    Ok(Some(DecodedIcon::new(rgba)))
}

/// Theme icon names for the file type of `path`, most specific first.
pub fn association_names(path: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if path.is_dir() {
        names.push("folder".to_string());
        return names;
    }
    match mime_guess::from_path(path).first() {
        Some(mime) => {
            names.push(mime.essence_str().replace('/', "-"));
            names.push(format!("{}-x-generic", mime.type_().as_str()));
        }
        None if is_executable(path) => names.push("application-x-executable".to_string()),
        None => {}
    }
    names.push("unknown".to_string());
    names
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Decoded pixels; nothing native to release.
pub struct DecodedIcon {
    image: RgbaImage,
}

impl DecodedIcon {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }
}

impl IconHandle for DecodedIcon {
    fn render(&self, edge: u32) -> Result<Bitmap, IconError> {
        if self.image.width() == 0 || self.image.height() == 0 {
            return Err(IconError::Render("empty image".into()));
        }
        Ok(Bitmap::from_rgba(&self.image, edge))
    }
}
