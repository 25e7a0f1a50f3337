//! Implementation of the `rocbundle build` command.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::debug;

use rocbundle_lib::pipeline::ADDON_EXTENSION;
use rocbundle_lib::{BuildRequest, build_addon};

use crate::output::{self, OutputFormat};

pub struct BuildArgs {
  pub source: PathBuf,
  pub output: Option<PathBuf>,
  pub target: String,
  pub cc: Vec<String>,
  pub roc: Option<PathBuf>,
  pub node_root: Option<PathBuf>,
  pub optimize: bool,
  pub keep_artifacts: bool,
  pub format: OutputFormat,
}

/// Execute the build command.
///
/// Threads the flags into one [`BuildRequest`], runs the pipeline, and
/// prints a summary. A failing build surfaces the captured toolchain
/// diagnostics verbatim and exits non-zero via the propagated error.
pub async fn cmd_build(args: BuildArgs) -> Result<()> {
  if !args.source.is_file() {
    bail!("source file not found: {}", args.source.display());
  }

  let source = dunce::canonicalize(&args.source)
    .with_context(|| format!("failed to resolve {}", args.source.display()))?;

  let addon = match args.output {
    Some(path) => path,
    None => source.with_extension(ADDON_EXTENSION),
  };

  let mut request = BuildRequest::new(&source, &addon);
  request.target = args.target;
  if !args.cc.is_empty() {
    request.cc = args.cc;
  }
  request.roc = args.roc;
  request.node_root = args.node_root;
  request.optimize = args.optimize;
  request.keep_artifacts = args.keep_artifacts;

  debug!(source = %source.display(), addon = %addon.display(), "starting build");

  let outcome = build_addon(&request).await?;

  for warning in &outcome.warnings {
    output::print_warning(warning);
  }

  if args.format.is_json() {
    println!(
      "{}",
      serde_json::json!({
        "addon": outcome.addon_path,
        "declarations": outcome.declaration_path,
        "warnings": outcome.warnings,
      })
    );
  } else {
    output::print_success(&format!("addon written to {}", outcome.addon_path.display()));
    output::print_success(&format!(
      "declarations written to {}",
      outcome.declaration_path.display()
    ));
  }

  Ok(())
}
