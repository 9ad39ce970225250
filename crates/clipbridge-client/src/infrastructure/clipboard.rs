//! System clipboard access.
//!
//! [`SystemClipboard`] talks to the clipboard through `arboard`.  When that
//! fails (headless session, missing display server) it falls back to the
//! platform's clipboard commands:
//!
//! | Platform | Read                         | Write                        |
//! |----------|------------------------------|------------------------------|
//! | macOS    | `pbpaste`                    | `pbcopy`                     |
//! | Linux    | `wl-paste`, `xclip`, `xsel`  | `wl-copy`, `xclip`, `xsel`   |
//! | Windows  | PowerShell `Get-Clipboard`   | PowerShell `Set-Clipboard`   |

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::domain::ports::ClipboardService;

/// A clipboard helper program and its arguments.
type ClipboardCommand = (&'static str, &'static [&'static str]);

#[cfg(target_os = "macos")]
const READ_COMMANDS: &[ClipboardCommand] = &[("pbpaste", &[])];
#[cfg(target_os = "macos")]
const WRITE_COMMANDS: &[ClipboardCommand] = &[("pbcopy", &[])];

#[cfg(target_os = "windows")]
const READ_COMMANDS: &[ClipboardCommand] = &[(
    "powershell.exe",
    &["-NoProfile", "-NonInteractive", "-Command", "Get-Clipboard -Raw"],
)];
#[cfg(target_os = "windows")]
const WRITE_COMMANDS: &[ClipboardCommand] = &[(
    "powershell.exe",
    &[
        "-NoProfile",
        "-NonInteractive",
        "-Command",
        "[Console]::InputEncoding = [Text.Encoding]::UTF8; Set-Clipboard -Value ([Console]::In.ReadToEnd())",
    ],
)];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const READ_COMMANDS: &[ClipboardCommand] = &[
    ("wl-paste", &["--no-newline"]),
    ("xclip", &["-selection", "clipboard", "-o"]),
    ("xsel", &["--clipboard", "--output"]),
];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const WRITE_COMMANDS: &[ClipboardCommand] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// The desktop clipboard.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    fn arboard_read() -> Result<String, arboard::Error> {
        arboard::Clipboard::new()?.get_text()
    }

    fn arboard_write(text: &str) -> Result<(), arboard::Error> {
        arboard::Clipboard::new()?.set_text(text.to_string())
    }
}

impl ClipboardService for SystemClipboard {
    fn is_available(&self) -> bool {
        if arboard::Clipboard::new().is_ok() {
            return true;
        }
        // Presence only: a read command fails on an empty clipboard.
        let path = std::env::var_os("PATH");
        let available = READ_COMMANDS
            .iter()
            .chain(WRITE_COMMANDS)
            .any(|(program, _)| find_on_path(program, path.as_deref()));
        if !available {
            warn!("no clipboard backend available");
        }
        available
    }

    fn read(&self) -> Option<String> {
        match Self::arboard_read() {
            Ok(text) => return Some(text),
            Err(arboard::Error::ContentNotAvailable) => return None,
            Err(e) => debug!("arboard read failed: {e}; trying clipboard commands"),
        }
        READ_COMMANDS
            .iter()
            .find_map(|(program, args)| run_read(program, args))
    }

    fn copy(&self, text: &str) -> bool {
        match Self::arboard_write(text) {
            Ok(()) => return true,
            Err(e) => debug!("arboard write failed: {e}; trying clipboard commands"),
        }
        let copied = WRITE_COMMANDS
            .iter()
            .any(|(program, args)| run_write(program, args, text));
        if !copied {
            warn!("could not copy text to the clipboard");
        }
        copied
    }
}

/// Whether `program` exists in one of the directories of `path`.
fn find_on_path(program: &str, path: Option<&OsStr>) -> bool {
    let Some(path) = path else {
        return false;
    };
    std::env::split_paths(path).any(|dir| is_program(&dir, program))
}

fn is_program(dir: &Path, program: &str) -> bool {
    if dir.join(program).is_file() {
        return true;
    }
    cfg!(windows)
        && Path::new(program).extension().is_none()
        && dir.join(format!("{program}.exe")).is_file()
}

/// Runs a read command; `None` when it is missing or fails.
fn run_read(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        debug!("{program} exited with {}", output.status);
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pipes `text` into a write command; `true` when it exits successfully.
fn run_write(program: &str, args: &[&str], text: &str) -> bool {
    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            debug!("cannot start {program}: {e}");
            return false;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            debug!("writing to {program} failed: {e}");
        }
    }
    matches!(child.wait(), Ok(status) if status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_platform_has_fallback_commands() {
        assert!(!READ_COMMANDS.is_empty());
        assert!(!WRITE_COMMANDS.is_empty());
    }

    #[test]
    fn test_missing_read_program_yields_none() {
        assert_eq!(run_read("clipbridge-no-such-program", &[]), None);
    }

    #[test]
    fn test_missing_write_program_yields_false() {
        assert!(!run_write("clipbridge-no-such-program", &[], "text"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_read_captures_stdout() {
        assert_eq!(run_read("echo", &["hello"]).as_deref(), Some("hello\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_write_feeds_stdin() {
        // `cat` consumes stdin and exits 0.
        assert!(run_write("cat", &[], "piped text"));
    }

    #[test]
    fn test_find_on_path_detects_present_program() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clipbridge-fake-xclip"), b"").unwrap();
        let path = std::env::join_paths([dir.path()]).unwrap();

        // Act / Assert
        assert!(find_on_path("clipbridge-fake-xclip", Some(path.as_os_str())));
        assert!(!find_on_path("clipbridge-fake-xsel", Some(path.as_os_str())));
    }

    #[test]
    fn test_find_on_path_without_path_is_false() {
        assert!(!find_on_path("xclip", None));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_that_fails_on_read_still_counts_as_present() {
        // `false` exits non-zero, as `xclip -o` does on an empty clipboard.
        let path = std::env::var_os("PATH");
        assert_eq!(run_read("false", &[]), None);
        assert!(find_on_path("false", path.as_deref()));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_read_program_yields_none() {
        assert_eq!(run_read("false", &[]), None);
    }
}
