//! Pipeline and adapter integration tests, driven by fake `roc` and `cc`
//! executables that log every invocation and create the output files a real
//! toolchain would.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rocbundle_lib::bundler::{LoadArgs, Namespace, PluginConfig, ResolveArgs, RocPlugin};
use rocbundle_lib::{BuildError, BuildRequest, build_addon};

struct FakeToolchain {
  _dir: TempDir,
  roc: PathBuf,
  cc: PathBuf,
  log: PathBuf,
}

impl FakeToolchain {
  /// A roc/cc pair that succeeds, creating whatever output file the
  /// command line asks for and appending one log line per invocation.
  fn succeeding() -> Self {
    Self::with_roc_body(
      r#"
next_is_output=0
out=""
for arg in "$@"; do
  if [ "$next_is_output" = 1 ]; then out="$arg"; next_is_output=0; fi
  if [ "$arg" = "--output" ]; then next_is_output=1; fi
done
if [ -n "$out" ]; then : > "$out"; fi
exit 0
"#,
    )
  }

  /// A toolchain whose roc exits 2 with diagnostics on stderr.
  fn failing_roc() -> Self {
    Self::with_roc_body("echo 'roc says no' >&2\nexit 2\n")
  }

  fn with_roc_body(roc_body: &str) -> Self {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("invocations.log");

    let roc = write_script(
      dir.path(),
      "roc",
      &format!("echo \"roc $*\" >> {}\n{roc_body}", log.display()),
    );

    let cc = write_script(
      dir.path(),
      "cc",
      &format!(
        r#"echo "cc $*" >> {}
next_is_output=0
out=""
for arg in "$@"; do
  if [ "$next_is_output" = 1 ]; then out="$arg"; next_is_output=0; fi
  if [ "$arg" = "-o" ]; then next_is_output=1; fi
done
if [ -n "$out" ]; then : > "$out"; fi
exit 0
"#,
        log.display()
      ),
    );

    Self { _dir: dir, roc, cc, log }
  }

  fn request(&self, source: &Path, addon: &Path) -> BuildRequest {
    let mut request = BuildRequest::new(source, addon);
    request.roc = Some(self.roc.clone());
    request.cc = vec![self.cc.to_str().unwrap().to_string()];
    request.node_root = Some(PathBuf::from("/usr/local/fake-node"));
    request
  }

  fn plugin_config(&self, target: &str) -> PluginConfig {
    PluginConfig {
      cc: vec![self.cc.to_str().unwrap().to_string()],
      target: target.to_string(),
      optimize: false,
      roc: Some(self.roc.clone()),
      node_root: Some(PathBuf::from("/usr/local/fake-node")),
    }
  }

  fn log_lines(&self) -> Vec<String> {
    match std::fs::read_to_string(&self.log) {
      Ok(contents) => contents.lines().map(|line| line.to_string()).collect(),
      Err(_) => Vec::new(),
    }
  }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
  let mut perms = std::fs::metadata(&path).unwrap().permissions();
  perms.set_mode(0o755);
  std::fs::set_permissions(&path, perms).unwrap();
  path
}

/// Create a project directory holding `hello.roc` and the platform stub
/// that `roc glue` is pointed at.
fn project_with_source(name: &str) -> (TempDir, PathBuf) {
  let dir = TempDir::new().unwrap();
  let source = dir.path().join(name);
  std::fs::write(&source, "app \"hello\"\n").unwrap();
  std::fs::create_dir(dir.path().join("platform")).unwrap();
  std::fs::write(dir.path().join("platform").join("main.roc"), "platform \"hello\"\n").unwrap();
  (dir, source)
}

#[tokio::test]
async fn end_to_end_build_with_default_config() {
  let tools = FakeToolchain::succeeding();
  let (project, source) = project_with_source("hello.roc");
  let addon = project.path().join("hello.node");

  let outcome = build_addon(&tools.request(&source, &addon)).await.unwrap();

  assert_eq!(outcome.addon_path, addon);
  assert!(addon.exists(), "linked addon should exist at the requested path");

  let declarations = project.path().join("hello.roc.d.ts");
  assert_eq!(outcome.declaration_path, declarations);
  let contents = std::fs::read_to_string(&declarations).unwrap();
  assert_eq!(contents.matches("export function").count(), 1);

  // compile, glue, link; in that order.
  let lines = tools.log_lines();
  assert_eq!(lines.len(), 3);
  assert!(lines[0].starts_with("roc build"));
  assert!(lines[0].contains("--no-link"));
  assert!(!lines[0].contains("--target="), "host build passes no target flag");
  assert!(lines[1].starts_with("roc glue"));
  assert!(lines[2].starts_with("cc "));
  assert!(lines[2].contains(&format!("-o {}", addon.display())));

  // Without keep_artifacts the temp build directory is reclaimed.
  let object = lines[0]
    .split_whitespace()
    .skip_while(|token| *token != "--output")
    .nth(1)
    .unwrap()
    .to_string();
  assert!(!Path::new(&object).exists(), "temp artifacts should be cleaned up");
}

#[tokio::test]
async fn bogus_target_fails_before_any_process_spawns() {
  let tools = FakeToolchain::succeeding();
  let (project, source) = project_with_source("hello.roc");
  let addon = project.path().join("hello.node");

  let mut request = tools.request(&source, &addon);
  request.target = "bogus".to_string();

  let err = build_addon(&request).await.unwrap_err();

  match err {
    BuildError::UnsupportedTarget { target } => assert_eq!(target, "bogus"),
    other => panic!("expected UnsupportedTarget, got {other:?}"),
  }
  assert!(tools.log_lines().is_empty(), "no tool may run for a bad selector");
}

#[tokio::test]
async fn failed_compile_step_short_circuits_the_pipeline() {
  let tools = FakeToolchain::failing_roc();
  let (project, source) = project_with_source("hello.roc");
  let addon = project.path().join("hello.node");

  let err = build_addon(&tools.request(&source, &addon)).await.unwrap_err();

  match err {
    BuildError::ToolFailed { stderr, .. } => assert!(stderr.contains("roc says no")),
    other => panic!("expected ToolFailed, got {other:?}"),
  }

  let lines = tools.log_lines();
  assert_eq!(lines.len(), 1, "glue and link must not run after a failed compile");
  assert!(lines[0].starts_with("roc build"));
  assert!(!project.path().join("hello.roc.d.ts").exists());
  assert!(!addon.exists());
}

#[tokio::test]
async fn cross_builds_pass_both_toolchains_their_own_target_vocabulary() {
  let tools = FakeToolchain::succeeding();
  let (project, source) = project_with_source("hello.roc");
  let addon = project.path().join("hello.node");

  let mut request = tools.request(&source, &addon);
  request.target = "linux-x64".to_string();

  build_addon(&request).await.unwrap();

  let lines = tools.log_lines();
  assert!(lines[0].contains("--target=linux-x64"));
  assert!(lines[2].contains("--target=x86_64-linux-gnu"));
}

#[tokio::test]
async fn concurrent_builds_of_same_basename_do_not_collide() {
  let tools = FakeToolchain::succeeding();
  let (project_a, source_a) = project_with_source("hello.roc");
  let (project_b, source_b) = project_with_source("hello.roc");
  let addon_a = project_a.path().join("hello.node");
  let addon_b = project_b.path().join("hello.node");

  let request_a = tools.request(&source_a, &addon_a);
  let request_b = tools.request(&source_b, &addon_b);
  let (a, b) = tokio::join!(build_addon(&request_a), build_addon(&request_b),);

  a.unwrap();
  b.unwrap();
  assert!(addon_a.exists());
  assert!(addon_b.exists());
}

#[tokio::test]
async fn declarations_are_identical_across_targets() {
  let tools = FakeToolchain::succeeding();
  let (project, source) = project_with_source("hello.roc");

  let mut first = tools.request(&source, &project.path().join("hello-x64.node"));
  first.target = "linux-x64".to_string();
  let first_decl = build_addon(&first).await.unwrap().declaration_path;
  let first_bytes = std::fs::read(&first_decl).unwrap();

  let mut second = tools.request(&source, &project.path().join("hello-arm64.node"));
  second.target = "linux-arm64".to_string();
  let second_decl = build_addon(&second).await.unwrap().declaration_path;
  let second_bytes = std::fs::read(&second_decl).unwrap();

  assert_eq!(first_decl, second_decl);
  assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn plugin_builds_each_source_exactly_once() {
  let tools = FakeToolchain::succeeding();
  let (project, source) = project_with_source("hello.roc");

  let plugin = RocPlugin::new(tools.plugin_config(""));

  // The bundler resolves the import, then loads it (twice, e.g. from two
  // importing modules).
  let resolution = plugin
    .on_resolve(&ResolveArgs {
      path: source.to_str().unwrap(),
      resolve_dir: project.path(),
      namespace: Namespace::File,
    })
    .unwrap();
  assert_eq!(resolution.namespace, Namespace::RocNodeFile);

  let load = LoadArgs {
    path: &resolution.path,
    namespace: Namespace::RocNodeFile,
  };

  let first = plugin.on_load(&load).await.unwrap().unwrap();
  let second = plugin.on_load(&load).await.unwrap().unwrap();

  assert_eq!(first.contents, second.contents);
  assert!(first.contents.contains("require("));

  let builds = tools
    .log_lines()
    .into_iter()
    .filter(|line| line.starts_with("roc build"))
    .count();
  assert_eq!(builds, 1, "the pipeline must run once per distinct source path");
}

#[tokio::test]
async fn keep_artifacts_retains_the_object_file() {
  let tools = FakeToolchain::succeeding();
  let (project, source) = project_with_source("hello.roc");
  let addon = project.path().join("hello.node");

  let mut request = tools.request(&source, &addon);
  request.keep_artifacts = true;

  build_addon(&request).await.unwrap();

  // The object path is recorded in the roc build invocation; with
  // keep_artifacts the temp directory must survive the build.
  let lines = tools.log_lines();
  let build_line = &lines[0];
  let object = build_line
    .split_whitespace()
    .skip_while(|token| *token != "--output")
    .nth(1)
    .expect("roc build was passed --output");

  assert!(Path::new(object).exists(), "kept artifact {object} should still exist");
  std::fs::remove_dir_all(Path::new(object).parent().unwrap()).unwrap();
}
