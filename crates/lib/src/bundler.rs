//! Bundler integration adapter.
//!
//! Exposes the pipeline to a module-graph resolution protocol as two
//! resolve rules and one load rule:
//!
//! - a `.roc` import in the default namespace is rewritten to its eventual
//!   `.node` path and reclassified into the internal build namespace, so
//!   the bundler's generic loader never tries to parse Roc source,
//! - loading a path in the build namespace runs the pipeline (once per
//!   distinct source path per build) and returns a small JS stub that
//!   `require`s the linked addon,
//! - a `.node` import seen from the build namespace is handed back to the
//!   default namespace, where the bundler's ordinary copy-as-file-asset
//!   behavior takes over.
//!
//! The two-phase dance exists because a load hook cannot return raw binary
//! bytes as script source; routing the binary back through the default
//! namespace reuses the bundler's asset-copy and path-rewriting logic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::BuildError;
use crate::pipeline::{self, ADDON_EXTENSION, BuildOutcome, BuildRequest, ROC_EXTENSION};

/// Tag of the internal build namespace, as seen by the bundler protocol.
pub const ROC_NODE_NAMESPACE: &str = "roc-node-file";

/// The closed set of namespaces this adapter participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
  /// The bundler's default file namespace.
  File,
  /// The internal namespace that routes paths through the pipeline.
  RocNodeFile,
}

impl Namespace {
  pub fn tag(self) -> &'static str {
    match self {
      Namespace::File => "file",
      Namespace::RocNodeFile => ROC_NODE_NAMESPACE,
    }
  }
}

/// Arguments a bundler passes to a resolve hook.
#[derive(Debug)]
pub struct ResolveArgs<'a> {
  /// The import specifier, possibly relative.
  pub path: &'a str,
  /// Directory the importing module was resolved from.
  pub resolve_dir: &'a Path,
  pub namespace: Namespace,
}

/// A resolve hook's answer: a path reclassified under a namespace.
#[derive(Debug, PartialEq, Eq)]
pub struct Resolution {
  pub path: PathBuf,
  pub namespace: Namespace,
}

/// Arguments a bundler passes to a load hook.
#[derive(Debug)]
pub struct LoadArgs<'a> {
  pub path: &'a Path,
  pub namespace: Namespace,
}

/// How the bundler should treat returned contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
  /// Parse as JavaScript.
  Js,
  /// Copy the bytes into the output directory as an opaque file asset.
  CopyFile,
}

/// A load hook's answer.
#[derive(Debug)]
pub struct LoadResult {
  pub contents: String,
  pub loader: Loader,
}

/// Configuration surface consumed by the adapter, defaulted only here at
/// the outermost entry point.
#[derive(Debug, Clone)]
pub struct PluginConfig {
  /// C compiler invocation tokens, e.g. `["zig", "cc"]` for cross builds.
  pub cc: Vec<String>,
  /// Target selector; empty means the current host.
  pub target: String,
  pub optimize: bool,
  /// Explicit roc compiler path; searched for on PATH when unset.
  pub roc: Option<PathBuf>,
  /// Node installation root for N-API headers.
  pub node_root: Option<PathBuf>,
}

impl Default for PluginConfig {
  fn default() -> Self {
    Self {
      cc: vec!["cc".to_string()],
      target: String::new(),
      optimize: false,
      roc: None,
      node_root: None,
    }
  }
}

/// The plugin state for one bundler run.
///
/// Holds the per-source build cache: each distinct `.roc` path is built at
/// most once per plugin instance, and concurrent loads of the same source
/// are serialized so the declaration file beside it is never written twice
/// at once.
pub struct RocPlugin {
  config: PluginConfig,
  built: Mutex<HashMap<PathBuf, Arc<Mutex<Option<BuildOutcome>>>>>,
}

impl RocPlugin {
  pub fn new(config: PluginConfig) -> Self {
    Self {
      config,
      built: Mutex::new(HashMap::new()),
    }
  }

  /// Resolve hook, covering both registrations.
  ///
  /// Returns `None` when the path is not ours to handle, letting the
  /// bundler fall through to its default resolution.
  pub fn on_resolve(&self, args: &ResolveArgs<'_>) -> Option<Resolution> {
    match args.namespace {
      // Rule A: a `.roc` import gets rewritten to its addon path and moved
      // into the build namespace.
      Namespace::File => {
        if !has_extension(args.path, ROC_EXTENSION) {
          return None;
        }

        let requested = Path::new(args.path);
        let absolute = if requested.is_absolute() {
          requested.to_path_buf()
        } else {
          args.resolve_dir.join(requested)
        };
        let source = dunce::canonicalize(&absolute).unwrap_or(absolute);

        Some(Resolution {
          path: source.with_extension(ADDON_EXTENSION),
          namespace: Namespace::RocNodeFile,
        })
      }
      // Rule B: the addon path resolved earlier goes back to the default
      // namespace unchanged, so the bundler copies it as a file asset.
      Namespace::RocNodeFile => {
        if !has_extension(args.path, ADDON_EXTENSION) {
          return None;
        }

        Some(Resolution {
          path: PathBuf::from(args.path),
          namespace: Namespace::File,
        })
      }
    }
  }

  /// Load hook for the build namespace (filter: match-all).
  ///
  /// Runs the pipeline for the underlying `.roc` source, then returns a
  /// stub module that `require`s the linked addon at runtime.
  pub async fn on_load(&self, args: &LoadArgs<'_>) -> Result<Option<LoadResult>, BuildError> {
    match args.namespace {
      Namespace::File => Ok(None),
      Namespace::RocNodeFile => {
        let source = args.path.with_extension(ROC_EXTENSION);
        let outcome = self.build_once(&source, args.path).await?;

        debug!(
          source = %source.display(),
          addon = %outcome.addon_path.display(),
          "loaded roc module"
        );

        Ok(Some(LoadResult {
          contents: loader_stub(&outcome.addon_path),
          loader: Loader::Js,
        }))
      }
    }
  }

  /// The `.node` suffix must be registered with the bundler as an opaque
  /// file-asset loader if the caller has not configured one already.
  pub fn default_loader(&self) -> (&'static str, Loader) {
    (".node", Loader::CopyFile)
  }

  /// Build a source at most once, serializing concurrent requests for the
  /// same path.
  async fn build_once(&self, source: &Path, addon: &Path) -> Result<BuildOutcome, BuildError> {
    let cell = {
      let mut built = self.built.lock().await;
      Arc::clone(
        built
          .entry(source.to_path_buf())
          .or_insert_with(|| Arc::new(Mutex::new(None))),
      )
    };

    let mut slot = cell.lock().await;

    if let Some(outcome) = slot.as_ref() {
      debug!(source = %source.display(), "addon already built in this run");
      return Ok(outcome.clone());
    }

    let mut request = BuildRequest::new(source, addon);
    request.target = self.config.target.clone();
    request.cc = self.config.cc.clone();
    request.optimize = self.config.optimize;
    request.roc = self.config.roc.clone();
    request.node_root = self.config.node_root.clone();

    let outcome = pipeline::build_addon(&request).await?;
    *slot = Some(outcome.clone());

    Ok(outcome)
  }
}

/// The stub body returned for a loaded Roc module: require the addon at its
/// resolved path and re-export it wholesale.
fn loader_stub(addon_path: &Path) -> String {
  let path_json = serde_json::to_string(&addon_path.display().to_string())
    .expect("a path string is always serializable");

  format!("module.exports = require({path_json});\n")
}

fn has_extension(path: &str, extension: &str) -> bool {
  Path::new(path).extension().is_some_and(|ext| ext == extension)
}
