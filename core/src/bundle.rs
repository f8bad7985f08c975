use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sourcemap::SourceMap;

use crate::chunk::Chunk;
use crate::error::BuildError;
use crate::graph::ModuleGraph;
use crate::source_map;
use crate::types::{BundleConfig, NormalizedOutputOptions};

/// One rendered output file, kept in memory until the pass is published.
pub struct BuildArtifact {
  pub target: NormalizedOutputOptions,
  pub code: String,
  pub map: Option<SourceMap>,
}

impl BuildArtifact {
  /// Paths this artifact publishes, with their contents.
  fn files(&self) -> Result<Vec<(PathBuf, Vec<u8>)>, BuildError> {
    let mut files = vec![(self.target.file.clone(), self.code.clone().into_bytes())];
    if let Some(map) = &self.map {
      let mut json = vec![];
      map.to_writer(&mut json)?;
      files.push((self.target.map_file(), json));
    }
    Ok(files)
  }

  pub fn write(&self) -> Result<(), BuildError> {
    publish(self.files()?)
  }
}

/// Sibling of `file` that holds its contents until they are complete.
fn staging_path(file: &Path) -> PathBuf {
  let name = file
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  file.with_file_name(format!(".{}.tmp", name))
}

/// Writes every file next to its destination first and renames them into
/// place only once all of them were written. On failure the staged files are
/// removed and no destination is touched.
fn publish(files: Vec<(PathBuf, Vec<u8>)>) -> Result<(), BuildError> {
  let mut staged: Vec<(PathBuf, PathBuf)> = vec![];
  let written = files.iter().try_for_each(|(file, contents)| {
    if let Some(dir) = file.parent() {
      fs::create_dir_all(dir).map_err(|err| BuildError::io(dir, err))?;
    }
    let staging = staging_path(file);
    staged.push((staging.clone(), file.clone()));
    fs::write(&staging, contents).map_err(|err| BuildError::io(file, err))
  });
  if let Err(err) = written {
    for (staging, _) in &staged {
      let _ = fs::remove_file(staging);
    }
    return Err(err);
  }

  for (staging, file) in &staged {
    fs::rename(staging, file).map_err(|err| BuildError::io(file, err))?;
    log::debug!("[bundle] wrote {}", file.display());
  }
  Ok(())
}

/// Result of a successful pass: the graph and one artifact per output.
pub struct BuildOutput {
  pub graph: ModuleGraph,
  pub artifacts: Vec<BuildArtifact>,
}

impl BuildOutput {
  /// Writes every artifact and its map, all or nothing.
  pub fn write(&self) -> Result<(), BuildError> {
    write_artifacts(&self.artifacts)
  }
}

fn write_artifacts(artifacts: &[BuildArtifact]) -> Result<(), BuildError> {
  let mut files = vec![];
  for artifact in artifacts {
    files.extend(artifact.files()?);
  }
  publish(files)
}

#[derive(Clone)]
#[non_exhaustive]
pub struct Bundle {
  pub config: BundleConfig,
}

impl Bundle {
  pub fn new(config: BundleConfig) -> Self {
    Self { config }
  }

  /// Renders one output from the graph. Never touches the file system.
  pub fn generate(
    graph: &ModuleGraph,
    target: &NormalizedOutputOptions,
  ) -> Result<BuildArtifact, BuildError> {
    let rendered = Chunk::new(graph).render(target)?;
    let mut code = rendered.code;

    let map = if target.sourcemap {
      let map = source_map::compose(graph, target, &rendered.rendered_positions);
      let map_name = target
        .map_file()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
      code.push_str(&format!("//# sourceMappingURL={}\n", map_name));
      Some(map)
    } else {
      None
    };

    Ok(BuildArtifact {
      target: target.clone(),
      code,
      map,
    })
  }

  /// Runs one full pass: builds the graph once, then renders every output
  /// from it in parallel. Nothing is written.
  pub fn build(&self) -> Result<BuildOutput, BuildError> {
    let graph = ModuleGraph::build(&self.config.input)?;
    let artifacts = self
      .config
      .output
      .par_iter()
      .map(|target| Self::generate(&graph, target))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(BuildOutput { graph, artifacts })
  }

  /// Builds, then writes only if every output rendered.
  pub fn build_and_write(&self) -> Result<BuildOutput, BuildError> {
    let output = self.build()?;
    output.write()?;
    Ok(output)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::OutputFormat;

  fn artifact(file: PathBuf, code: &str) -> BuildArtifact {
    let mut target = NormalizedOutputOptions::new(file, OutputFormat::Es);
    target.sourcemap = false;
    BuildArtifact {
      target,
      code: code.to_owned(),
      map: None,
    }
  }

  #[test]
  fn a_failing_output_leaves_every_destination_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("dist");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("lib.es.js"), "previous").unwrap();
    // a regular file where a directory is needed
    fs::write(out.join("blocked"), "").unwrap();

    let artifacts = vec![
      artifact(out.join("lib.es.js"), "next"),
      artifact(out.join("blocked/lib.umd.js"), "next"),
    ];
    assert!(write_artifacts(&artifacts).is_err());

    assert_eq!(fs::read_to_string(out.join("lib.es.js")).unwrap(), "previous");
    let mut names = fs::read_dir(&out)
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
      .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["blocked", "lib.es.js"]);
  }

  #[test]
  fn publishes_every_output_once_staged() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = vec![
      artifact(dir.path().join("a/one.js"), "one"),
      artifact(dir.path().join("b/two.js"), "two"),
    ];
    write_artifacts(&artifacts).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("a/one.js")).unwrap(), "one");
    assert_eq!(fs::read_to_string(dir.path().join("b/two.js")).unwrap(), "two");
    assert!(!dir.path().join("a/.one.js.tmp").exists());
  }
}
