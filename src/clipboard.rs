use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

// Candidate clipboard tools in probe order; the first one that spawns and
// exits cleanly wins.
#[cfg(target_os = "macos")]
const TOOLS: &[&[&str]] = &[&["pbcopy"]];
#[cfg(target_os = "windows")]
const TOOLS: &[&[&str]] = &[&["clip"]];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const TOOLS: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
];

/// Copies `text` to the system clipboard by piping it into the platform
/// clipboard tool.
pub fn copy(text: &str) -> Result<()> {
    for tool in TOOLS {
        let Some((program, args)) = tool.split_first() else {
            continue;
        };

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            // tool not installed, try the next one
            Err(_) => continue,
        };

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(text.as_bytes())
                .with_context(|| format!("failed to pipe text to {program}"))?;
        }
        drop(child.stdin.take());

        let status = child
            .wait()
            .with_context(|| format!("{program} did not exit cleanly"))?;
        if status.success() {
            return Ok(());
        }
    }

    bail!("no clipboard tool available");
}
