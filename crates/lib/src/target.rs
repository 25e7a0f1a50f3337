//! Target selector resolution.
//!
//! Maps an abstract platform-arch selector (or "" for the current host) to
//! the flags the two toolchains need: the roc compiler's `--target=` value
//! and the C toolchain's `--target=` triple. The two vocabularies differ
//! and must not be conflated (roc says `linux-x64`, cc says
//! `x86_64-linux-gnu`).

use crate::error::BuildError;

/// Platform family a build is targeting, derived from the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformFamily {
  Mac,
  Linux,
  Windows,
  Wasm,
  Other,
}

/// Resolved target flags for one pipeline run.
///
/// Never mutated after derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTriple {
  /// Value for the roc compiler's `--target=` flag; `None` for host builds.
  pub roc_target: Option<String>,
  /// Value for the C toolchain's `--target=` flag, e.g. `x86_64-linux-gnu`.
  pub cc_triple: String,
  /// Platform family, used for platform-conditional link flags.
  pub family: PlatformFamily,
  /// Whether the selector names something other than the current host.
  pub cross: bool,
}

impl TargetTriple {
  pub fn is_mac(&self) -> bool {
    self.family == PlatformFamily::Mac
  }

  pub fn is_linux(&self) -> bool {
    self.family == PlatformFamily::Linux
  }
}

/// Resolve a target selector against the current host.
///
/// An empty selector means "build for the machine we are running on".
/// Unrecognized non-empty selectors fail with
/// [`BuildError::UnsupportedTarget`] carrying the offending string.
pub fn resolve(selector: &str) -> Result<TargetTriple, BuildError> {
  resolve_for_host(selector, std::env::consts::ARCH, std::env::consts::OS)
}

/// Resolve a selector for an explicit host arch/os pair.
///
/// `host_arch` and `host_os` are only consulted when `selector` is empty.
/// Both Rust-style (`x86_64`, `macos`) and Node-style (`x64`, `darwin`)
/// names are accepted, since callers may be relaying whatever the host
/// runtime reported.
pub fn resolve_for_host(selector: &str, host_arch: &str, host_os: &str) -> Result<TargetTriple, BuildError> {
  let (roc_target, cc_triple, family) = match selector {
    "" => {
      let arch = match host_arch {
        "x64" | "x86_64" => "x86_64",
        "arm64" | "aarch64" => "aarch64",
        "ia32" | "x86" | "i386" => "i386",
        "arm" => "arm",
        other => {
          return Err(BuildError::UnsupportedTarget {
            target: format!("host architecture {other}"),
          });
        }
      };

      let (os_triple, family) = match host_os {
        "linux" => ("linux-gnu", PlatformFamily::Linux),
        "macos" | "darwin" => ("apple-darwin", PlatformFamily::Mac),
        "windows" | "win32" => ("windows-gnu", PlatformFamily::Windows),
        other => {
          return Err(BuildError::UnsupportedTarget {
            target: format!("host operating system {other}"),
          });
        }
      };

      return Ok(TargetTriple {
        roc_target: None,
        cc_triple: format!("{arch}-{os_triple}"),
        family,
        cross: false,
      });
    }
    "macos-arm64" => (selector, "aarch64-apple-darwin", PlatformFamily::Mac),
    "macos-x64" => (selector, "x86_64-apple-darwin", PlatformFamily::Mac),
    "linux-arm64" => (selector, "aarch64-linux-gnu", PlatformFamily::Linux),
    "linux-x64" => (selector, "x86_64-linux-gnu", PlatformFamily::Linux),
    "linux-x32" => (selector, "i386-linux-gnu", PlatformFamily::Linux),
    "windows-x64" => (selector, "x86_64-windows-gnu", PlatformFamily::Windows),
    "wasm32" => (selector, "wasm32-unknown-unknown", PlatformFamily::Wasm),
    other => {
      return Err(BuildError::UnsupportedTarget {
        target: other.to_string(),
      });
    }
  };

  Ok(TargetTriple {
    roc_target: Some(roc_target.to_string()),
    cc_triple: cc_triple.to_string(),
    family,
    cross: true,
  })
}
