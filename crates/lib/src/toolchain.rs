//! External toolchain invocation.
//!
//! Every external tool call in the pipeline goes through [`run_tool`]:
//! spawn to completion, capture both streams, and turn a non-zero
//! termination into a structured [`BuildError::ToolFailed`]. The caller's
//! task is suspended while the child runs; independent pipeline runs in the
//! same process are not blocked.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::error::{BuildError, Termination};

/// Captured output of a successful tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
}

/// Remediation hint when the roc compiler cannot be located.
pub const ROC_NOT_FOUND_HINT: &str =
  "rocbundle could not find the `roc` binary it needs to compile .roc modules. \
   Install roc and make sure it is on your PATH, or pass an explicit path to it.";

/// Run an external tool to completion and capture its output.
///
/// `tokens` is the full command line, executable first. Empty tokens are
/// filtered out before spawning; they come from conditionally-assembled
/// flag lists and must never reach the child's argument vector literally.
pub async fn run_tool(tokens: &[String]) -> Result<ToolOutput, BuildError> {
  let tokens: Vec<&String> = tokens.iter().filter(|token| !token.is_empty()).collect();

  let Some((executable, args)) = tokens.split_first() else {
    return Err(BuildError::ToolNotFound {
      tool: String::new(),
      hint: "an empty command line was assembled; this is a caller bug",
    });
  };

  let command_line = tokens
    .iter()
    .map(|token| token.as_str())
    .collect::<Vec<_>>()
    .join(" ");

  debug!(command = %command_line, "spawning toolchain process");

  let output = Command::new(executable).args(args).output().await.map_err(|err| {
    if err.kind() == std::io::ErrorKind::NotFound {
      BuildError::ToolNotFound {
        tool: executable.to_string(),
        hint: "make sure it is installed and on your PATH",
      }
    } else {
      BuildError::ArtifactIo(err)
    }
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout).to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).to_string();

  if !output.status.success() {
    let termination = match output.status.code() {
      Some(code) => Termination::Exited(code),
      None => Termination::Signaled(signal_of(&output.status)),
    };

    return Err(BuildError::ToolFailed {
      command: command_line,
      termination,
      stdout,
      stderr,
    });
  }

  Ok(ToolOutput { stdout, stderr })
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> Option<i32> {
  use std::os::unix::process::ExitStatusExt;
  status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> Option<i32> {
  None
}

/// Locate the roc compiler binary.
///
/// An explicit path always wins. Otherwise the directories on `PATH` are
/// searched for `roc`. Failure is [`BuildError::ToolNotFound`] with a fixed
/// remediation hint.
pub fn locate_roc(explicit: Option<&Path>) -> Result<PathBuf, BuildError> {
  if let Some(path) = explicit {
    if path.is_file() {
      return Ok(path.to_path_buf());
    }
    return Err(BuildError::ToolNotFound {
      tool: path.display().to_string(),
      hint: ROC_NOT_FOUND_HINT,
    });
  }

  if let Some(found) = find_on_path(roc_binary_name()) {
    return Ok(found);
  }

  Err(BuildError::ToolNotFound {
    tool: "roc".to_string(),
    hint: ROC_NOT_FOUND_HINT,
  })
}

fn roc_binary_name() -> &'static str {
  if cfg!(windows) { "roc.exe" } else { "roc" }
}

/// Search the `PATH` directories for an executable with the given name.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
  let path_var = std::env::var_os("PATH")?;

  for dir in std::env::split_paths(&path_var) {
    let candidate = dir.join(name);
    if candidate.is_file() {
      return Some(candidate);
    }
  }

  None
}
