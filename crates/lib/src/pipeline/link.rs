//! Link-step command assembly.
//!
//! Replaces what binding.gyp would do for an ordinary native addon, in a
//! single C-toolchain invocation that also works with a cross-capable
//! wrapper such as `zig cc`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BuildError;
use crate::pipeline::BuildRequest;
use crate::target::TargetTriple;
use crate::toolchain::{self, run_tool};

/// Preprocessor defines required by the Node extension ABI.
const DEFINES: &[&str] = &[
  "NODE_GYP_MODULE_NAME=addon",
  "USING_UV_SHARED=1",
  "USING_V8_SHARED=1",
  "V8_DEPRECATION_WARNINGS=1",
  "V8_DEPRECATION_WARNINGS",
  "V8_IMMINENT_DEPRECATION_WARNINGS",
  "_GLIBCXX_USE_CXX11_ABI=1",
  "_DARWIN_USE_64_BIT_INODE=1",
  "_LARGEFILE_SOURCE",
  "_FILE_OFFSET_BITS=64",
  "__STDC_FORMAT_MACROS",
  "OPENSSL_NO_PINSHARED",
  "OPENSSL_THREADS",
  "BUILDING_NODE_EXTENSION",
];

const WARNING_FLAGS: &[&str] = &["-Wall", "-Wextra", "-Wendif-labels", "-W", "-Wno-unused-parameter"];

const LIBRARIES: &[&str] = &["c", "m", "pthread", "dl", "util"];

/// Step 4: link the Roc object file and the C bridge into the addon.
pub(super) async fn link_addon(
  request: &BuildRequest,
  triple: &TargetTriple,
  object_path: &Path,
  glue_source: &Path,
  warnings: &mut Vec<String>,
) -> Result<(), BuildError> {
  let node_root = node_include_root(request, warnings);
  let tokens = link_command(request, triple, object_path, glue_source, node_root.as_deref());

  debug!(cc = %tokens.join(" "), "linking addon");

  run_tool(&tokens).await?;

  Ok(())
}

/// The N-API headers live two levels above the `node` executable
/// (`<root>/bin/node` next to `<root>/include/node`).
fn node_include_root(request: &BuildRequest, warnings: &mut Vec<String>) -> Option<PathBuf> {
  if let Some(root) = &request.node_root {
    return Some(root.clone());
  }

  let node = if cfg!(windows) { "node.exe" } else { "node" };

  match toolchain::find_on_path(node).and_then(|exe| Some(exe.parent()?.parent()?.to_path_buf())) {
    Some(root) => Some(root),
    None => {
      warnings.push(
        "could not locate the node executable, so the N-API include path was omitted from the link step"
          .to_string(),
      );
      None
    }
  }
}

/// Assemble the full C-toolchain command line.
///
/// A `cc` override replaces the leading tokens wholesale; everything else
/// is appended regardless, including the cross target flag. Passing a
/// non-cross-capable compiler together with a foreign target is a caller
/// error this function does not detect.
fn link_command(
  request: &BuildRequest,
  triple: &TargetTriple,
  object_path: &Path,
  glue_source: &Path,
  node_root: Option<&Path>,
) -> Vec<String> {
  let mut tokens = request.cc.clone();

  if triple.cross {
    tokens.push(format!("--target={}", triple.cc_triple));
  }

  tokens.extend([
    "-o".to_string(),
    request.addon_path.display().to_string(),
    object_path.display().to_string(),
    glue_source.display().to_string(),
  ]);

  for define in DEFINES {
    tokens.push(format!("-D{define}"));
  }

  if let Some(root) = node_root {
    tokens.push(format!("-I{}", root.join("include").join("node").display()));
  }

  tokens.push("-fPIC".to_string());
  tokens.push("-pthread".to_string());

  if request.optimize {
    tokens.push("-O3".to_string());
  }

  if triple.is_mac() {
    // Roc hosts need aligned_alloc, which macOS added in 10.15.
    tokens.push("-mmacosx-version-min=10.15".to_string());
  }

  for flag in WARNING_FLAGS {
    tokens.push(flag.to_string());
  }

  tokens.push(
    if triple.is_mac() {
      "-fno-strict-aliasing"
    } else {
      "-fno-omit-frame-pointer"
    }
    .to_string(),
  );

  if triple.is_mac() {
    // Node's own symbols are resolved when the addon is loaded.
    tokens.push("-Wl,-undefined,dynamic_lookup".to_string());
  }

  for library in LIBRARIES {
    tokens.push(format!("-l{library}"));
  }

  if triple.is_linux() {
    tokens.push("-lrt".to_string());
    tokens.push("-shared".to_string());
  }

  tokens
}
