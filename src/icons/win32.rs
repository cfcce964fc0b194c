//! Windows shell icons and shell links.
//!
//! Every native object (icon handle, device context, GDI bitmap, COM
//! apartment) lives in a guard whose `Drop` releases it, so early returns and
//! failed calls never leak handles.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use windows::core::{Interface, HSTRING};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ,
};
use windows::Win32::Storage::FileSystem::FILE_FLAGS_AND_ATTRIBUTES;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, IPersistFile, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED, STGM_READ,
};
use windows::Win32::UI::Shell::{
    ExtractIconExW, IShellLinkW, SHGetFileInfoW, ShellLink, SHFILEINFOW, SHGFI_ICON,
    SHGFI_LARGEICON,
};
use windows::Win32::UI::WindowsAndMessaging::{DestroyIcon, DrawIconEx, DI_NORMAL, HICON};

use super::shortcut::ShortcutInfo;
use super::{pick_variant, Bitmap, IconError, IconHandle, IconProvider, IconSource, NativeIcon};

const MAX_PATH_CHARS: usize = 260;

pub struct ShellIconProvider;

impl IconProvider for ShellIconProvider {
    fn extract_resource(&self, source: &IconSource) -> Option<NativeIcon> {
        let file = HSTRING::from(source.path.as_path());
        let mut large = HICON::default();
        let mut small = HICON::default();
        let extracted = unsafe {
            ExtractIconExW(&file, source.index, Some(&mut large), Some(&mut small), 1)
        };
        if extracted == 0 || extracted == u32::MAX {
            return None;
        }
        let large = OwnedIcon::new(large);
        let small = OwnedIcon::new(small);
        // The unpicked variant is destroyed when it drops here
        pick_variant(small, large).map(|icon| Box::new(icon) as NativeIcon)
    }

    fn association_icon(&self, path: &Path) -> Option<NativeIcon> {
        let file = HSTRING::from(path);
        let mut info = SHFILEINFOW::default();
        let ok = unsafe {
            SHGetFileInfoW(
                &file,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                Some(&mut info),
                std::mem::size_of::<SHFILEINFOW>() as u32,
                SHGFI_ICON | SHGFI_LARGEICON,
            )
        };
        if ok == 0 {
            return None;
        }
        OwnedIcon::new(info.hIcon).map(|icon| Box::new(icon) as NativeIcon)
    }
}

/// An icon handle destroyed on drop.
struct OwnedIcon(HICON);

impl OwnedIcon {
    fn new(handle: HICON) -> Option<Self> {
        (!handle.is_invalid()).then_some(Self(handle))
    }
}

impl Drop for OwnedIcon {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyIcon(self.0);
        }
    }
}

struct ScreenDc(HDC);

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(None, self.0);
        }
    }
}

struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

struct GdiBitmap(HBITMAP);

impl Drop for GdiBitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0.into());
        }
    }
}

/// Restores the previously selected object so the bitmap can be read/freed.
struct Selection {
    dc: HDC,
    previous: HGDIOBJ,
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc, self.previous);
        }
    }
}

impl IconHandle for OwnedIcon {
    fn render(&self, edge: u32) -> Result<Bitmap, IconError> {
        let side = i32::try_from(edge)
            .map_err(|_| IconError::Render(format!("icon edge {} too large", edge)))?;
        unsafe {
            let screen = ScreenDc(GetDC(None));
            if screen.0.is_invalid() {
                return Err(IconError::Render("GetDC failed".into()));
            }
            let memory = MemoryDc(CreateCompatibleDC(Some(screen.0)));
            if memory.0.is_invalid() {
                return Err(IconError::Render("CreateCompatibleDC failed".into()));
            }
            let bitmap = GdiBitmap(CreateCompatibleBitmap(screen.0, side, side));
            if bitmap.0.is_invalid() {
                return Err(IconError::Render("CreateCompatibleBitmap failed".into()));
            }

            let selection = Selection {
                dc: memory.0,
                previous: SelectObject(memory.0, bitmap.0.into()),
            };
            DrawIconEx(memory.0, 0, 0, self.0, side, side, 0, None, DI_NORMAL)?;
            drop(selection);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: side,
                    // negative height: top-down rows
                    biHeight: -side,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let len = (edge as usize)
                .checked_mul(edge as usize)
                .and_then(|n| n.checked_mul(4))
                .ok_or_else(|| IconError::Render(format!("icon edge {} too large", edge)))?;
            let mut pixels = vec![0u8; len];
            let lines = GetDIBits(
                memory.0,
                bitmap.0,
                0,
                edge,
                Some(pixels.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            );
            if lines == 0 {
                return Err(IconError::Render("GetDIBits failed".into()));
            }

            // BGRX -> RGBA
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
                px[3] = 255;
            }
            let image = RgbaImage::from_raw(edge, edge, pixels)
                .ok_or_else(|| IconError::Render("bitmap size mismatch".into()))?;
            Ok(Bitmap::from_rgba(&image, edge))
        }
    }
}

/// Balances a successful `CoInitializeEx`.
struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        Self {
            initialized: hr.is_ok(),
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
        }
    }
}

/// Read target and icon location of a `.lnk` file through `IShellLinkW`.
pub fn read_shell_link(path: &Path) -> Result<ShortcutInfo, IconError> {
    let _com = ComApartment::enter();
    unsafe {
        let link: IShellLinkW = CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER)?;
        let file: IPersistFile = link.cast()?;
        file.Load(&HSTRING::from(path), STGM_READ)?;

        let mut icon_path = [0u16; MAX_PATH_CHARS];
        let mut icon_index = 0i32;
        link.GetIconLocation(&mut icon_path, &mut icon_index)?;
        let icon_path = wide_to_string(&icon_path);

        let mut target = [0u16; MAX_PATH_CHARS];
        link.GetPath(&mut target, std::ptr::null_mut(), 0)?;
        let target = wide_to_string(&target);

        Ok(ShortcutInfo {
            target: (!target.is_empty()).then(|| PathBuf::from(target)),
            icon_location: (!icon_path.is_empty())
                .then(|| format!("{},{}", icon_path, icon_index)),
        })
    }
}

fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|c| *c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}
