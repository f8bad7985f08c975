use std::fs;
use std::path::Path;
use std::process::Command;

use libroll::{BuildOutput, Bundle, BundleConfig, OutputFormat};

const CHECK: &str = r#"import fs from 'node:fs';
import vm from 'node:vm';
import url from 'node:url';

const [umdFile, esFile] = process.argv.slice(2);
const sandbox = {};
vm.runInNewContext(fs.readFileSync(umdFile, 'utf8'), sandbox);
const umd = sandbox.demo;
const es = await import(url.pathToFileURL(esFile).href);

const read = (m) => ({
  keys: Object.keys(m).sort(),
  counter: m.counter,
  data: JSON.parse(JSON.stringify(m.data)),
  doubled: m.doubled,
});
const before = { umd: read(umd), es: read(es) };
umd.inc();
es.inc();
const after = { umd: umd.counter, es: es.counter };
console.log(JSON.stringify({ before, after }));
"#;

fn write(root: &Path, file: &str, content: &str) {
  let path = root.join(file);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

fn build_demo(root: &Path) -> BuildOutput {
  write(
    root,
    "package.json",
    r#"{ "name": "demo", "main": "dist/demo.umd.js", "module": "dist/demo.mjs" }"#,
  );
  write(
    root,
    "src/index.ts",
    "import { counter, inc } from './counter';\nimport data from './data.json';\nimport { twice } from './util';\n\nexport { IShape } from './types';\nexport { counter, inc, data };\nexport const doubled: number = twice(21);\n",
  );
  write(
    root,
    "src/counter.ts",
    "export let counter: number = 0;\nexport function inc(): void {\n  counter += 1;\n}\n",
  );
  write(root, "src/types.ts", "export interface IShape {\n  area(): number;\n}\n");
  write(
    root,
    "src/data.json",
    r#"{ "name": "demo", "tags": ["a", "b"], "nested": { "deep": true, "count": 2 } }"#,
  );
  write(
    root,
    "src/util.js",
    "exports.twice = function (value) {\n  return value * 2;\n};\n",
  );

  let config = BundleConfig::from_package_dir(root, "demo").unwrap();
  Bundle::new(config).build_and_write().unwrap()
}

fn has_node() -> bool {
  Command::new("node")
    .arg("--version")
    .output()
    .map_or(false, |output| output.status.success())
}

#[test]
fn es_output_exports_bindings_not_copies() {
  let dir = tempfile::tempdir().unwrap();
  let output = build_demo(dir.path());
  let es = output
    .artifacts
    .iter()
    .find(|artifact| artifact.target.format == OutputFormat::Es)
    .unwrap();

  assert!(es.code.contains("let counter = 0;"));
  assert!(es.code.contains("function inc() {"));
  assert!(es.code.contains("export { counter, inc, data_default as data, doubled };"));
  assert!(!es.code.contains("IShape"));
  for artifact in &output.artifacts {
    assert!(!artifact.code.contains("__export(exports, \"IShape\""));
  }
}

#[test]
fn both_formats_evaluate_to_the_same_exports() {
  if !has_node() {
    eprintln!("node is not installed, skipping");
    return;
  }
  let dir = tempfile::tempdir().unwrap();
  build_demo(dir.path());
  fs::write(dir.path().join("check.mjs"), CHECK).unwrap();

  let run = Command::new("node")
    .arg(dir.path().join("check.mjs"))
    .arg(dir.path().join("dist/demo.umd.js"))
    .arg(dir.path().join("dist/demo.mjs"))
    .output()
    .unwrap();
  assert!(
    run.status.success(),
    "{}",
    String::from_utf8_lossy(&run.stderr)
  );
  let report: serde_json::Value = serde_json::from_slice(&run.stdout).unwrap();

  let expected_data = serde_json::json!({
    "name": "demo",
    "tags": ["a", "b"],
    "nested": { "deep": true, "count": 2 }
  });
  for format in ["umd", "es"] {
    let before = &report["before"][format];
    assert_eq!(
      before["keys"],
      serde_json::json!(["counter", "data", "doubled", "inc"]),
      "{}",
      format
    );
    assert_eq!(before["counter"], 0, "{}", format);
    assert_eq!(before["data"], expected_data, "{}", format);
    assert_eq!(before["doubled"], 42, "{}", format);
  }
  // a mutation inside the bundle is visible through both outputs
  assert_eq!(report["after"]["umd"], 1);
  assert_eq!(report["after"]["es"], 1);
  assert_eq!(report["before"]["umd"], report["before"]["es"]);
}
