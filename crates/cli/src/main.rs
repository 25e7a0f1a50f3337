//! rocbundle - build Roc modules into native Node addons.

mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "rocbundle")]
#[command(author, version, about = "Build .roc modules into loadable .node addons")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile and link one Roc module into a native Node addon
  Build {
    /// Path to the .roc module to build
    source: PathBuf,

    /// Where to write the .node addon (default: the source path with a
    /// .node extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target selector (e.g. linux-x64, macos-arm64); defaults to the host
    #[arg(long, default_value = "")]
    target: String,

    /// C compiler invocation token; repeat for multi-token invocations
    /// such as `--cc zig --cc cc`
    #[arg(long = "cc")]
    cc: Vec<String>,

    /// Explicit path to the roc compiler (default: search PATH)
    #[arg(long)]
    roc: Option<PathBuf>,

    /// Node installation root containing include/node (default: derived
    /// from the node executable on PATH)
    #[arg(long)]
    node_root: Option<PathBuf>,

    /// Build with optimizations
    #[arg(long)]
    optimize: bool,

    /// Keep the temp directory with intermediate artifacts for debugging
    #[arg(long)]
    keep_artifacts: bool,

    /// Output format for the build summary
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Print the resolved toolchain flags for a target selector
  Target {
    /// Target selector; empty for the current host
    #[arg(default_value = "")]
    selector: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Build {
      source,
      output,
      target,
      cc,
      roc,
      node_root,
      optimize,
      keep_artifacts,
      format,
    } => {
      cmd::cmd_build(cmd::BuildArgs {
        source,
        output,
        target,
        cc,
        roc,
        node_root,
        optimize,
        keep_artifacts,
        format,
      })
      .await
    }
    Commands::Target { selector } => cmd::cmd_target(&selector),
  }
}
