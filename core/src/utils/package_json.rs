use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::BuildError;

/// The fields of a library's own manifest that pick its output files.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PackageJson {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub main: Option<String>,
  #[serde(default)]
  pub module: Option<String>,
}

impl PackageJson {
  pub fn read(dir: &Path) -> Result<Option<Self>, BuildError> {
    let path = dir.join("package.json");
    if !path.is_file() {
      return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
    serde_json::from_str(&text)
      .map(Some)
      .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_output_fields() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join("package.json"),
      r#"{ "name": "lib", "main": "dist/lib.umd.js", "module": "dist/lib.es5.js", "browser": { "fs": false } }"#,
    )
    .unwrap();
    let pkg = PackageJson::read(dir.path()).unwrap().unwrap();
    assert_eq!(pkg.name.as_deref(), Some("lib"));
    assert_eq!(pkg.main.as_deref(), Some("dist/lib.umd.js"));
    assert_eq!(pkg.module.as_deref(), Some("dist/lib.es5.js"));

    assert!(PackageJson::read(&dir.path().join("missing")).unwrap().is_none());
    fs::write(dir.path().join("package.json"), "{").unwrap();
    assert!(PackageJson::read(dir.path()).is_err());
  }
}
