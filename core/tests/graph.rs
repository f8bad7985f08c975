use std::fs;
use std::path::Path;

use libroll::{BuildError, ModuleGraph, NormalizedInputOptions, EMPTY_MODULE_PREFIX};

fn write(root: &Path, file: &str, content: &str) {
  let path = root.join(file);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

fn options(root: &Path, input: &str) -> NormalizedInputOptions {
  NormalizedInputOptions {
    input: input.to_owned(),
    cwd: root.to_path_buf(),
    ..NormalizedInputOptions::default()
  }
}

fn relative_ids(graph: &ModuleGraph) -> Vec<String> {
  graph
    .modules
    .keys()
    .map(|id| graph.relative_id(id))
    .collect()
}

#[test]
fn library_fixture_graph() {
  let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/library");
  let mut options = options(&root, "src/index.ts");
  options.external.insert("crypto".to_owned());
  let graph = ModuleGraph::build(&options).unwrap();

  assert_eq!(
    relative_ids(&graph),
    vec![
      "src/index.ts",
      "crypto",
      "src/model.ts",
      "src/defaults.json",
      "src/util.js"
    ]
  );
  assert_eq!(
    graph.execution_order_relative(),
    vec!["src/model.ts", "src/defaults.json", "src/util.js", "src/index.ts"]
  );
  assert!(graph.warnings.is_empty());

  let util = graph
    .ordered_modules()
    .find(|m| m.id.ends_with("util.js"))
    .unwrap();
  assert!(util.is_commonjs);
  assert!(util.transformed_source.contains("export default module.exports;"));

  let entry = graph.entry_module().unwrap();
  assert!(entry.is_entry);
  assert!(!entry.transformed_source.contains(": string"));
  assert_eq!(graph.externals().len(), 1);
}

#[test]
fn shared_dependencies_are_loaded_once() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "src/index.js", "import './a';\nimport './b';\n");
  write(root, "src/a.js", "import { x } from './shared';\nconsole.log(x);\n");
  write(root, "src/b.js", "import { x } from './shared.js';\nconsole.log(x + 1);\n");
  write(root, "src/shared.js", "export const x = 1;\n");

  let graph = ModuleGraph::build(&options(root, "src/index.js")).unwrap();
  assert_eq!(graph.modules.len(), 4);

  let shared = graph
    .ordered_modules()
    .find(|m| m.id.ends_with("shared.js"))
    .unwrap();
  let importers = shared
    .importers
    .iter()
    .map(|id| graph.relative_id(id))
    .collect::<Vec<_>>();
  assert_eq!(importers, vec!["src/a.js", "src/b.js"]);
  assert_eq!(
    graph.execution_order_relative(),
    vec!["src/shared.js", "src/a.js", "src/b.js", "src/index.js"]
  );
}

#[test]
fn externals_are_never_traversed() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "src/index.js",
    "import leftPad from 'left-pad';\nimport tiny from 'tiny';\nexport default leftPad(tiny, 4);\n",
  );
  write(
    root,
    "node_modules/left-pad/package.json",
    r#"{ "name": "left-pad", "main": "index.js" }"#,
  );
  write(
    root,
    "node_modules/left-pad/index.js",
    "import './never-loaded';\nexport default function () {}\n",
  );
  write(
    root,
    "node_modules/tiny/package.json",
    r#"{ "name": "tiny", "main": "lib/main.js" }"#,
  );
  write(root, "node_modules/tiny/lib/main.js", "export default 'tiny';\n");

  let mut options = options(root, "src/index.js");
  options.external.insert("left-pad".to_owned());
  let graph = ModuleGraph::build(&options).unwrap();

  assert_eq!(
    relative_ids(&graph),
    vec!["src/index.js", "left-pad", "node_modules/tiny/lib/main.js"]
  );
  let left_pad = graph.get_module("left-pad").unwrap();
  assert!(left_pad.is_ext());
  assert!(graph
    .ordered_modules()
    .all(|m| !m.id.contains("left-pad")));
}

#[test]
fn browser_field_substitutes_and_stubs() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "package.json",
    r#"{
  "name": "app",
  "browser": {
    "./src/platform.js": "./src/platform-browser.js",
    "fs": false
  }
}"#,
  );
  write(
    root,
    "src/index.js",
    "import { platform } from './platform';\nimport fs from 'fs';\nexport { platform, fs };\n",
  );
  write(root, "src/platform.js", "export const platform = 'node';\n");
  write(root, "src/platform-browser.js", "export const platform = 'browser';\n");

  let graph = ModuleGraph::build(&options(root, "src/index.js")).unwrap();
  let ids = relative_ids(&graph);
  assert!(ids.contains(&"src/platform-browser.js".to_owned()));
  assert!(!ids.contains(&"src/platform.js".to_owned()));

  let stub = graph
    .modules
    .values()
    .find(|m| m.id().starts_with(EMPTY_MODULE_PREFIX))
    .unwrap();
  let stub = stub.as_mod().unwrap();
  assert_eq!(stub.export_names(), vec!["default"]);
  assert!(graph.externals().is_empty());
}

#[test]
fn builtins_without_a_browser_mapping_are_external() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(
    root,
    "src/index.js",
    "import { join } from 'path';\nexport const file = join('a', 'b');\n",
  );

  let graph = ModuleGraph::build(&options(root, "src/index.js")).unwrap();
  let externals = graph
    .externals()
    .iter()
    .map(|ext| ext.id.clone())
    .collect::<Vec<_>>();
  assert_eq!(externals, vec!["path"]);
}

#[test]
fn unresolved_imports_report_the_importer_chain() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "src/index.ts", "import { a } from './a';\nexport default a;\n");
  write(root, "src/a.ts", "import { b } from './b';\nexport const a = b;\n");
  write(root, "src/b.ts", "import 'not-installed';\nexport const b = 1;\n");

  match ModuleGraph::build(&options(root, "src/index.ts")).unwrap_err() {
    BuildError::Resolution {
      specifier,
      importer_chain,
    } => {
      assert_eq!(specifier, "not-installed");
      assert_eq!(importer_chain, vec!["src/index.ts", "src/a.ts", "src/b.ts"]);
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn compile_errors_carry_the_failing_file() {
  let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/broken");
  match ModuleGraph::build(&options(&root, "src/index.ts")).unwrap_err() {
    BuildError::Compile {
      file, line, column, ..
    } => {
      assert!(file.ends_with("src/helper.ts"), "{}", file);
      assert_eq!(line, 5);
      assert!(column > 1);
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn circular_imports_warn_and_still_build() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write(root, "src/index.js", "import { a } from './a';\nexport { a };\n");
  write(root, "src/a.js", "import { b } from './b';\nexport const a = () => b;\n");
  write(root, "src/b.js", "import { a } from './a';\nexport const b = () => a;\n");

  let graph = ModuleGraph::build(&options(root, "src/index.js")).unwrap();
  assert_eq!(graph.warnings.len(), 1);
  assert_eq!(
    graph.warnings[0].to_string(),
    "Circular dependency: src/a.js -> src/b.js -> src/a.js"
  );
  assert_eq!(
    graph.execution_order_relative(),
    vec!["src/b.js", "src/a.js", "src/index.js"]
  );
}
