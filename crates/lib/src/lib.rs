//! rocbundle-lib: Build native Node addons from Roc modules
//!
//! This crate turns a `.roc` source module into a loadable `.node` N-API
//! addon and exposes that transformation to a JavaScript bundler:
//! - `target`: maps a platform-arch selector to roc and cc target flags
//! - `toolchain`: runs external compiler processes and captures their output
//! - `pipeline`: the compile / glue / declarations / link sequence
//! - `bundler`: resolve- and load-hook adapter over the module graph

pub mod bundler;
pub mod error;
pub mod pipeline;
pub mod target;
pub mod toolchain;

pub use error::BuildError;
pub use pipeline::{BuildOutcome, BuildRequest, build_addon};
pub use target::{PlatformFamily, TargetTriple, resolve};
