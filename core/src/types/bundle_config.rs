use std::path::Path;

use crate::types::{NormalizedInputOptions, NormalizedOutputOptions, OutputFormat};
use crate::utils::package_json::PackageJson;
use crate::BuildError;

#[derive(Debug, Clone)]
pub struct WatchOptions {
  /// Glob patterns, relative to `cwd`, whose changes trigger a rebuild.
  pub include: Vec<String>,
}

impl Default for WatchOptions {
  fn default() -> Self {
    Self {
      include: vec![String::from("src/**")],
    }
  }
}

#[derive(Debug, Clone)]
pub struct BundleConfig {
  pub input: NormalizedInputOptions,
  pub output: Vec<NormalizedOutputOptions>,
  pub watch: WatchOptions,
}

impl BundleConfig {
  /// Library layout driven by the package manifest in `dir`: `src/index.ts` is
  /// bundled to a UMD file at `main` and an ES module at `module`.
  pub fn from_package_dir(dir: &Path, library_name: &str) -> Result<Self, BuildError> {
    let pkg = PackageJson::read(dir)?
      .ok_or_else(|| BuildError::Config(format!("no package.json in {}", dir.display())))?;
    let main = pkg
      .main
      .ok_or_else(|| BuildError::Config("package.json has no \"main\" field".to_owned()))?;
    let module = pkg
      .module
      .ok_or_else(|| BuildError::Config("package.json has no \"module\" field".to_owned()))?;

    let input = NormalizedInputOptions {
      input: String::from("src/index.ts"),
      cwd: dir.to_path_buf(),
      external: ["crypto".to_owned()].into_iter().collect(),
      browser: true,
      prefer_builtins: true,
    };

    Ok(Self {
      input,
      output: vec![
        NormalizedOutputOptions::new(dir.join(main), OutputFormat::Umd).with_name(library_name),
        NormalizedOutputOptions::new(dir.join(module), OutputFormat::Es),
      ],
      watch: WatchOptions::default(),
    })
  }
}
