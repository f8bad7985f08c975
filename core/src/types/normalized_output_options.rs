use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
  Umd,
  Es,
}

#[derive(Debug, Clone)]
pub struct NormalizedOutputOptions {
  pub file: PathBuf,
  pub format: OutputFormat,
  // global name of the UMD bundle
  pub name: Option<String>,
  pub sourcemap: bool,
  /// Global variable names for externals when the UMD bundle runs as a plain script.
  pub globals: HashMap<String, String>,
}

impl NormalizedOutputOptions {
  pub fn new(file: impl Into<PathBuf>, format: OutputFormat) -> Self {
    Self {
      file: file.into(),
      format,
      name: None,
      sourcemap: true,
      globals: HashMap::default(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn map_file(&self) -> PathBuf {
    let mut file = self.file.clone().into_os_string();
    file.push(".map");
    PathBuf::from(file)
  }
}
