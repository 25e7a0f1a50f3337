//! Implementation of the `rocbundle target` command.

use anyhow::Result;

use rocbundle_lib::resolve;

/// Print the toolchain flags a selector resolves to.
pub fn cmd_target(selector: &str) -> Result<()> {
  let triple = resolve(selector)?;

  match &triple.roc_target {
    Some(roc_target) => println!("roc: --target={roc_target}"),
    None => println!("roc: (host build, no target flag)"),
  }
  println!("cc:  --target={}", triple.cc_triple);
  println!("family: {:?}", triple.family);
  println!("cross: {}", triple.cross);

  Ok(())
}
