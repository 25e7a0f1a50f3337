mod build;
mod target;

pub use build::{BuildArgs, cmd_build};
pub use target::cmd_target;
