use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct NormalizedInputOptions {
  /// Entry module, relative to `cwd` unless absolute.
  pub input: String,
  pub cwd: PathBuf,
  /// Specifiers that are never traversed into or inlined.
  pub external: BTreeSet<String>,
  /// Prefer the `browser` field of package manifests and honor its substitutions.
  pub browser: bool,
  // Resolve node built-ins as externals before looking at node_modules.
  pub prefer_builtins: bool,
}

impl Default for NormalizedInputOptions {
  fn default() -> Self {
    Self {
      input: String::from("src/index.ts"),
      cwd: env::current_dir().unwrap_or_default(),
      external: BTreeSet::default(),
      browser: true,
      prefer_builtins: true,
    }
  }
}

impl NormalizedInputOptions {
  pub fn is_external(&self, specifier: &str) -> bool {
    self.external.contains(specifier)
      || specifier
        .strip_prefix("node:")
        .map_or(false, |s| self.external.contains(s))
  }
}
