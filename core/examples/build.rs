use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use libroll::{watch, Bundle, BundleConfig};

fn main() -> anyhow::Result<()> {
  env_logger::init();

  let mut dir = None;
  let mut name = String::from("followthemoney");
  let mut watch_mode = false;
  let mut args = env::args().skip(1);
  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--watch" | "-w" => watch_mode = true,
      "--name" => name = args.next().context("--name needs a value")?,
      _ if dir.is_none() => dir = Some(PathBuf::from(arg)),
      other => bail!("unexpected argument {}", other),
    }
  }
  let dir = match dir {
    Some(dir) => dir,
    None => env::current_dir()?,
  };

  let config = BundleConfig::from_package_dir(&dir, &name)
    .with_context(|| format!("failed to read the package in {}", dir.display()))?;
  let bundle = Bundle::new(config);

  if watch_mode {
    watch(bundle)?;
    return Ok(());
  }

  let output = bundle.build_and_write()?;
  for warning in &output.graph.warnings {
    eprintln!("(!) {}", warning);
  }
  for artifact in &output.artifacts {
    println!("created {}", artifact.target.file.display());
  }
  Ok(())
}
