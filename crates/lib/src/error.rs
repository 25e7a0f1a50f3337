//! Error types for the addon build pipeline.

use std::fmt;

use thiserror::Error;

/// How an external tool process ended.
///
/// A signal termination reports no exit code, so it must be described
/// explicitly instead of printing a blank or misleading code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
  /// The process exited on its own with a non-zero code.
  Exited(i32),
  /// The process was killed by a signal (signal number when known).
  Signaled(Option<i32>),
}

impl fmt::Display for Termination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Termination::Exited(code) => write!(f, "code {code}"),
      Termination::Signaled(Some(sig)) => {
        write!(f, "no exit code, because it was terminated by signal {sig}")
      }
      Termination::Signaled(None) => {
        write!(f, "no exit code, because it was terminated by a signal")
      }
    }
  }
}

/// Errors that can occur while building a Roc module into a native addon.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The target selector is not in the supported table.
  #[error("unrecognized --target option for the roc compiler: {target}")]
  UnsupportedTarget { target: String },

  /// A required executable could not be located.
  #[error("could not find the `{tool}` executable. {hint}")]
  ToolNotFound { tool: String, hint: &'static str },

  /// An external compiler or linker process failed.
  ///
  /// Carries the exact command line and the captured streams verbatim so
  /// the user can diagnose the failure without re-running anything.
  #[error(
    "`{command}` exited with {termination}.\n\nstdout was:\n\n{stdout}\n\nstderr was:\n\n{stderr}"
  )]
  ToolFailed {
    command: String,
    termination: Termination,
    stdout: String,
    stderr: String,
  },

  /// Creating the temp build directory or writing an artifact failed.
  #[error("artifact io failed: {0}")]
  ArtifactIo(#[from] std::io::Error),
}
