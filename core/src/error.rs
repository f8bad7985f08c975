use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("Could not resolve \"{specifier}\" (imported by {})", format_chain(.importer_chain))]
  Resolution {
    specifier: String,
    importer_chain: Vec<String>,
  },
  #[error("{file}:{line}:{column}: {message}")]
  Compile {
    file: String,
    line: usize,
    column: usize,
    message: String,
  },
  #[error("{file}:{line}:{column}: {message}")]
  Parse {
    file: String,
    line: usize,
    column: usize,
    message: String,
  },
  #[error("Invalid JSON in {file}: {message}")]
  Json { file: String, message: String },
  #[error("Invalid source map for {file}: {message}")]
  SourceMap { file: String, message: String },
  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("Invalid config: {0}")]
  Config(String),
  #[error("UMD output {0} needs a library name")]
  MissingName(String),
  #[error("Watch failed: {0}")]
  Watch(String),
}

impl BuildError {
  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

impl From<notify::Error> for BuildError {
  fn from(err: notify::Error) -> Self {
    Self::Watch(err.to_string())
  }
}

impl From<sourcemap::Error> for BuildError {
  fn from(err: sourcemap::Error) -> Self {
    Self::SourceMap {
      file: String::from("<output>"),
      message: err.to_string(),
    }
  }
}

fn format_chain(chain: &[String]) -> String {
  if chain.is_empty() {
    String::from("entry")
  } else {
    chain.join(" -> ")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
  #[error("Circular dependency: {}", .cycle.join(" -> "))]
  CircularDependency { cycle: Vec<String> },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolution_error_names_the_chain() {
    let err = BuildError::Resolution {
      specifier: "missing".to_owned(),
      importer_chain: vec!["src/index.ts".to_owned(), "src/a.ts".to_owned()],
    };
    assert_eq!(
      err.to_string(),
      "Could not resolve \"missing\" (imported by src/index.ts -> src/a.ts)"
    );
  }

  #[test]
  fn circular_warning_display() {
    let warning = Warning::CircularDependency {
      cycle: vec!["a.ts".to_owned(), "b.ts".to_owned(), "a.ts".to_owned()],
    };
    assert_eq!(warning.to_string(), "Circular dependency: a.ts -> b.ts -> a.ts");
  }
}
