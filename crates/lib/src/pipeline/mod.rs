//! The addon build pipeline.
//!
//! One [`build_addon`] call is a strictly sequential chain of four steps:
//! compile the Roc module to an object file, generate the C glue bridging
//! the Node extension ABI to it, emit the `.d.ts` declaration stub beside
//! the source, and link everything into one `.node` binary. The first
//! failing step aborts the run; no step is retried, since a partial output
//! file may already exist.
//!
//! Every invocation owns an isolated temp directory for its intermediate
//! artifacts, so concurrent builds of different sources (or of the same
//! basename for different targets) never collide.

mod link;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::BuildError;
use crate::target::{self, TargetTriple};
use crate::toolchain::{self, run_tool};

/// File extension of Roc source modules.
pub const ROC_EXTENSION: &str = "roc";

/// File extension of the produced native addon.
pub const ADDON_EXTENSION: &str = "node";

/// Glue spec handed to `roc glue`; independent of the user's source.
const NODE_GLUE_TEMPLATE: &str = include_str!("../../glue/node-glue.roc");

/// C bridge between the N-API and the compiled Roc object.
const NODE_BRIDGE_SOURCE: &str = include_str!("../../glue/node-to-roc.c");

/// Contents of the generated `.d.ts` stub. The call surface is JSON in,
/// JSON out, so the declarations never vary by source or target.
const DECLARATIONS: &str = r#"// This file was generated by rocbundle, based on the .roc file that has
// the same path as this file but without the .d.ts at the end.
//
// It will be regenerated on every build.

type JsonValue = boolean | number | string | null | JsonArray | JsonObject
interface JsonArray extends Array<JsonValue> {}
interface JsonObject {
  [key: string]: JsonValue
}

// The input is serialized to JSON for Roc to consume, and Roc's answer is
// serialized back to JSON before being parsed into a JS value again.
export function callRoc<T extends JsonValue, U extends JsonValue>(input: T): U
"#;

/// Everything one pipeline run needs, immutable once constructed.
///
/// Defaults are supplied by [`BuildRequest::new`]; nothing here is read
/// from ambient process state.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  /// Absolute path to the `.roc` module to build.
  pub source_path: PathBuf,
  /// Where the linked `.node` addon should be written.
  pub addon_path: PathBuf,
  /// Target selector; empty means "the current host".
  pub target: String,
  /// C compiler invocation tokens. An override such as `["zig", "cc"]`
  /// replaces the default `["cc"]` wholesale, including for target-triple
  /// flags that only a cross-capable compiler understands.
  pub cc: Vec<String>,
  /// Explicit path to the roc compiler; searched for on PATH when unset.
  pub roc: Option<PathBuf>,
  /// Node installation root for N-API headers; derived from the `node`
  /// executable on PATH when unset.
  pub node_root: Option<PathBuf>,
  /// Pass the optimize flag to both toolchains.
  pub optimize: bool,
  /// Keep the temp directory around for debugging instead of removing it.
  pub keep_artifacts: bool,
}

impl BuildRequest {
  pub fn new(source_path: impl Into<PathBuf>, addon_path: impl Into<PathBuf>) -> Self {
    Self {
      source_path: source_path.into(),
      addon_path: addon_path.into(),
      target: String::new(),
      cc: vec!["cc".to_string()],
      roc: None,
      node_root: None,
      optimize: false,
      keep_artifacts: false,
    }
  }
}

/// Result of a successful pipeline run. There is no partial success: either
/// the run reached a linked binary or it returned a [`BuildError`].
#[derive(Debug, Clone)]
pub struct BuildOutcome {
  /// Path of the linked addon (the caller-requested output path).
  pub addon_path: PathBuf,
  /// Path of the `.d.ts` stub written beside the source file.
  pub declaration_path: PathBuf,
  /// Non-fatal diagnostics collected along the way, in order.
  pub warnings: Vec<String>,
}

/// Build a Roc module into a native Node addon.
///
/// Resolves the target and locates the roc compiler before anything is
/// spawned, so a bad selector fails without running any external process.
pub async fn build_addon(request: &BuildRequest) -> Result<BuildOutcome, BuildError> {
  let triple = target::resolve(&request.target)?;
  let roc = toolchain::locate_roc(request.roc.as_deref())?;

  info!(
    source = %request.source_path.display(),
    target = %triple.cc_triple,
    cross = triple.cross,
    "building addon"
  );

  let build_dir = tempfile::Builder::new().prefix("rocbundle-").tempdir()?;
  let mut warnings = Vec::new();

  let object_path = compile(request, &roc, &triple, build_dir.path(), &mut warnings).await?;
  let glue_source = generate_glue(request, &roc, build_dir.path()).await?;
  let declaration_path = write_declarations(&request.source_path)?;
  link::link_addon(request, &triple, &object_path, &glue_source, &mut warnings).await?;

  info!(addon = %request.addon_path.display(), "addon linked");

  if request.keep_artifacts {
    let kept = build_dir.keep();
    debug!(path = %kept.display(), "keeping intermediate artifacts");
  }

  Ok(BuildOutcome {
    addon_path: request.addon_path.clone(),
    declaration_path,
    warnings,
  })
}

/// Step 1: compile the Roc source to a relocatable object file, no link.
async fn compile(
  request: &BuildRequest,
  roc: &Path,
  triple: &TargetTriple,
  build_dir: &Path,
  warnings: &mut Vec<String>,
) -> Result<PathBuf, BuildError> {
  let object_path = object_path_for(build_dir, &request.source_path, triple);

  let mut tokens = vec![roc.display().to_string(), "build".to_string()];

  if let Some(roc_target) = &triple.roc_target {
    tokens.push(format!("--target={roc_target}"));
  }
  if request.optimize {
    tokens.push("--optimize".to_string());
  }

  tokens.extend([
    "--no-link".to_string(),
    "--output".to_string(),
    object_path.display().to_string(),
    request.source_path.display().to_string(),
  ]);

  let output = run_tool(&tokens).await?;

  // The compiler exits zero but may still warn; surface those in order.
  if !output.stderr.trim().is_empty() {
    warnings.push(output.stderr.trim().to_string());
  }

  Ok(object_path)
}

/// Intermediate object names are always suffixed with the resolved target,
/// so host and cross artifacts of the same source never collide within a
/// build directory.
fn object_path_for(build_dir: &Path, source_path: &Path, triple: &TargetTriple) -> PathBuf {
  let stem = source_path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "module".to_string());
  let suffix = triple.roc_target.as_deref().unwrap_or("native");

  build_dir.join(format!("{stem}-{suffix}.o"))
}

/// Step 2: write the repository-provided glue template and C bridge into
/// the build directory, then run `roc glue` against the platform's main
/// entry descriptor.
///
/// Nothing here depends on the build target, so the generated glue is
/// identical across selectors for a given source file.
async fn generate_glue(request: &BuildRequest, roc: &Path, build_dir: &Path) -> Result<PathBuf, BuildError> {
  let glue_dir = build_dir.join("glue");
  std::fs::create_dir_all(&glue_dir)?;

  let template_path = glue_dir.join("node-glue.roc");
  std::fs::write(&template_path, NODE_GLUE_TEMPLATE)?;

  let bridge_path = glue_dir.join("node-to-roc.c");
  std::fs::write(&bridge_path, NODE_BRIDGE_SOURCE)?;

  let source_dir = request.source_path.parent().unwrap_or(Path::new("."));
  let platform_main = source_dir.join("platform").join("main.roc");

  run_tool(&[
    roc.display().to_string(),
    "glue".to_string(),
    template_path.display().to_string(),
    glue_dir.display().to_string(),
    platform_main.display().to_string(),
  ])
  .await?;

  debug!(path = %bridge_path.display(), "glue generated");

  Ok(bridge_path)
}

/// Step 3: write the declaration stub beside the source file.
///
/// The stub lives next to the source (not in the temp directory) so editors
/// and external tooling can discover it after the build.
fn write_declarations(source_path: &Path) -> Result<PathBuf, BuildError> {
  let declaration_path = declaration_path_for(source_path);
  std::fs::write(&declaration_path, DECLARATIONS)?;

  debug!(path = %declaration_path.display(), "declarations written");

  Ok(declaration_path)
}

/// `foo/hello.roc` declares its types in `foo/hello.roc.d.ts`.
fn declaration_path_for(source_path: &Path) -> PathBuf {
  let mut name = source_path.file_name().unwrap_or_default().to_os_string();
  name.push(".d.ts");
  source_path.with_file_name(name)
}
