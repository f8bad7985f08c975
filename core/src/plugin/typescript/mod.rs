use std::path::Path;

use deno_ast::{
  EmitOptions, MediaType, ModuleSpecifier, ParseParams, SourceMapOption, TranspileModuleOptions,
  TranspileOptions,
};
use sourcemap::SourceMap;

use crate::plugin_driver::{Plugin, TransformMap, TransformOutput};
use crate::utils::ast;
use crate::BuildError;

pub(crate) fn is_typescript(id: &str) -> bool {
  let ext = Path::new(id).extension().and_then(|ext| ext.to_str());
  matches!(ext, Some("ts" | "tsx" | "mts" | "cts"))
}

/// Strips TypeScript syntax down to JavaScript.
///
/// Only syntax is checked. Type errors such as `const n: number = "x"` pass
/// through unreported; run `tsc --noEmit` next to the build to catch them.
pub struct TypeScriptPlugin;

impl TypeScriptPlugin {
  fn compile_error(id: &str, message: impl ToString) -> BuildError {
    BuildError::Compile {
      file: id.to_owned(),
      line: 1,
      column: 1,
      message: message.to_string(),
    }
  }
}

impl Plugin for TypeScriptPlugin {
  fn get_name(&self) -> &'static str {
    "typescript"
  }

  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, BuildError> {
    if !is_typescript(id) {
      return Ok(None);
    }
    if id.ends_with(".d.ts") {
      return Ok(Some(TransformOutput::new(String::new(), TransformMap::Identity)));
    }

    // parse with swc first so syntax errors carry exact positions
    ast::with_globals(|| ast::parse(code, id, ast::syntax_for(id))).map_err(|failure| {
      BuildError::Compile {
        file: id.to_owned(),
        line: failure.line,
        column: failure.column,
        message: failure.message,
      }
    })?;

    let path = Path::new(id);
    let specifier = ModuleSpecifier::from_file_path(path)
      .map_err(|_| Self::compile_error(id, "not an absolute module path"))?;
    let parsed = deno_ast::parse_module(ParseParams {
      specifier,
      text: code.into(),
      media_type: MediaType::from_path(path),
      capture_tokens: false,
      scope_analysis: false,
      maybe_syntax: None,
    })
    .map_err(|diagnostic| Self::compile_error(id, diagnostic))?;

    let emitted = parsed
      .transpile(
        &TranspileOptions::default(),
        &TranspileModuleOptions::default(),
        &EmitOptions {
          source_map: SourceMapOption::Separate,
          ..Default::default()
        },
      )
      .map_err(|err| Self::compile_error(id, err))?
      .into_source();

    let map = match &emitted.source_map {
      Some(map) => SourceMap::from_slice(map.as_ref()).map_err(|err| BuildError::SourceMap {
        file: id.to_owned(),
        message: err.to_string(),
      })?,
      None => return Err(Self::compile_error(id, "compiler produced no source map")),
    };
    log::debug!("[typescript] compiled {}", id);

    Ok(Some(TransformOutput::new(
      emitted.text,
      TransformMap::Generated(map),
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source_map::{chain, identity, original_position};

  #[test]
  fn strips_types_and_maps_lines() {
    let code = "interface Shape {\n  area(): number;\n}\n\nexport function double(n: number): number {\n  return n * 2;\n}\n";
    let output = TypeScriptPlugin
      .transform(code, "/p/src/double.ts")
      .unwrap()
      .unwrap();
    assert!(output.code.contains("export function double(n)"));
    assert!(!output.code.contains("interface"));
    assert!(!output.code.contains(": number"));

    let map = match output.map {
      TransformMap::Generated(map) => chain(&map, &identity("/p/src/double.ts", code)),
      _ => panic!("expected a generated map"),
    };
    let line = output
      .code
      .lines()
      .position(|l| l.contains("return n * 2"))
      .unwrap() as u32;
    let col = output.code.lines().nth(line as usize).unwrap().find("return").unwrap() as u32;
    let pos = original_position(&map, line, col).unwrap();
    assert_eq!(pos.source, "/p/src/double.ts");
    assert_eq!(pos.line, 5);
  }

  #[test]
  fn syntax_errors_are_compile_errors_with_positions() {
    let err = TypeScriptPlugin
      .transform("const ok = 1;\nconst broken: = 2;\n", "/p/src/bad.ts")
      .err()
      .unwrap();
    match err {
      BuildError::Compile { file, line, .. } => {
        assert_eq!(file, "/p/src/bad.ts");
        assert_eq!(line, 2);
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn type_errors_are_not_checked() {
    let output = TypeScriptPlugin
      .transform("export const n: number = \"x\";\n", "/p/src/n.ts")
      .unwrap()
      .unwrap();
    assert!(output.code.contains("export const n = \"x\";"));
  }

  #[test]
  fn leaves_javascript_alone() {
    assert!(TypeScriptPlugin
      .transform("export const a = 1;", "/p/a.js")
      .unwrap()
      .is_none());
  }
}
