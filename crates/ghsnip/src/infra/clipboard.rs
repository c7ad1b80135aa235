//! Clipboard access for the "copy path" action.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};

/// Where a copy ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardBackend {
    /// The platform clipboard via arboard.
    System,
    /// An external helper such as `xclip` or `pbcopy`.
    Command(&'static str),
}

impl ClipboardBackend {
    pub fn describe(&self) -> &'static str {
        match self {
            ClipboardBackend::System => "system clipboard",
            ClipboardBackend::Command(program) => program,
        }
    }
}

/// System clipboard with shell fallbacks for headless sessions.
pub struct Clipboard {
    system: Option<arboard::Clipboard>,
}

impl Clipboard {
    pub fn new() -> Self {
        let system = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(err) => {
                tracing::debug!(error = %err, "system clipboard unavailable");
                None
            }
        };
        Self { system }
    }

    /// Write `text` to the first backend that accepts it.
    pub fn write_text(&mut self, text: &str) -> Result<ClipboardBackend> {
        if let Some(system) = self.system.as_mut() {
            match system.set_text(text.to_owned()) {
                Ok(()) => return Ok(ClipboardBackend::System),
                Err(err) => tracing::debug!(error = %err, "system clipboard rejected text"),
            }
            self.system = None;
        }

        for command in fallback_commands() {
            match pipe_to(command, text) {
                Ok(()) => return Ok(ClipboardBackend::Command(command[0])),
                Err(err) => tracing::debug!(program = command[0], error = %err, "clipboard helper failed"),
            }
        }

        Err(anyhow!("no clipboard backend accepted the text"))
    }

    /// Copy a file path and return the transient notice to show.
    pub fn copy_path(&mut self, path: &str) -> Result<String> {
        let backend = self
            .write_text(path)
            .with_context(|| format!("failed to copy '{path}' to the clipboard"))?;
        Ok(copied_notice(path, backend))
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new()
    }
}

pub fn copied_notice(path: &str, backend: ClipboardBackend) -> String {
    format!("Copied {path} to {}", backend.describe())
}

fn pipe_to(command: &[&str], text: &str) -> Result<()> {
    let (program, args) = command
        .split_first()
        .context("clipboard command missing program")?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .with_context(|| format!("failed to write to {program}"))?;
    }

    let status = child
        .wait()
        .with_context(|| format!("{program} did not exit cleanly"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("{program} exited with status {status}"))
    }
}

#[cfg(target_os = "macos")]
fn fallback_commands() -> &'static [&'static [&'static str]] {
    &[&["pbcopy"]]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn fallback_commands() -> &'static [&'static [&'static str]] {
    &[&["wl-copy"], &["xclip", "-selection", "clipboard"], &["xsel", "--clipboard", "--input"]]
}

#[cfg(target_os = "windows")]
fn fallback_commands() -> &'static [&'static [&'static str]] {
    &[&["clip.exe"]]
}

#[cfg(not(any(unix, target_os = "windows")))]
fn fallback_commands() -> &'static [&'static [&'static str]] {
    &[]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_names_backend() {
        assert_eq!(
            copied_notice("src/lib.rs", ClipboardBackend::System),
            "Copied src/lib.rs to system clipboard"
        );
        assert_eq!(
            copied_notice("a.py", ClipboardBackend::Command("xclip")),
            "Copied a.py to xclip"
        );
    }

    #[test]
    fn fallback_commands_name_a_program() {
        assert!(fallback_commands().iter().all(|command| !command.is_empty()));
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(pipe_to(&["ghsnip-no-such-clipboard-helper"], "x").is_err());
    }
}
