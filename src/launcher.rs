//! Hand a tool to the OS default handler.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Result, ToolboxError};

pub trait Opener {
    fn open(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OpenMethod {
    /// ShellExecute "open" verb; the path never passes through a command line
    ShellExecute,
    /// `<program> <path>`
    Program(String),
}

/// Opens paths with the host's default handler.
pub struct SystemOpener {
    method: OpenMethod,
}

impl SystemOpener {
    pub fn new() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    pub fn for_os(os: &str) -> Self {
        let method = match os {
            "windows" => OpenMethod::ShellExecute,
            "macos" => OpenMethod::Program("open".into()),
            _ => OpenMethod::Program("xdg-open".into()),
        };
        Self { method }
    }

    /// Open paths by running `program <path>`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            method: OpenMethod::Program(program.into()),
        }
    }

    /// Command that opens `path`, or `None` when the shell opens it directly.
    pub fn command(&self, path: &Path) -> Option<Command> {
        match &self.method {
            OpenMethod::ShellExecute => None,
            OpenMethod::Program(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(path);
                Some(cmd)
            }
        }
    }
}

impl Default for SystemOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl Opener for SystemOpener {
    fn open(&self, path: &Path) -> Result<()> {
        let launch_error = |reason: String| ToolboxError::Launch {
            path: path.to_path_buf(),
            reason,
        };

        if std::fs::symlink_metadata(path).is_err() {
            return Err(launch_error("file does not exist".into()));
        }

        let Some(mut cmd) = self.command(path) else {
            tracing::info!("Opening {} via shell", path.display());
            return shell_open(path).map_err(launch_error);
        };
        tracing::info!("Opening {} via {:?}", path.display(), cmd.get_program());

        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| launch_error(format!("failed to start {:?}: {}", cmd.get_program(), e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(launch_error(format!("opener exited with {}", status)))
        }
    }
}

#[cfg(windows)]
fn shell_open(path: &Path) -> std::result::Result<(), String> {
    use windows::core::{w, HSTRING, PCWSTR};
    use windows::Win32::UI::Shell::ShellExecuteW;
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    let file = HSTRING::from(path);
    let result = unsafe {
        ShellExecuteW(
            None,
            w!("open"),
            &file,
            PCWSTR::null(),
            PCWSTR::null(),
            SW_SHOWNORMAL,
        )
    };
    // values up to 32 are error codes
    let code = result.0 as isize;
    if code <= 32 {
        return Err(format!("ShellExecute failed with code {}", code));
    }
    Ok(())
}

#[cfg(not(windows))]
fn shell_open(_path: &Path) -> std::result::Result<(), String> {
    Err("shell open is only available on Windows".into())
}
