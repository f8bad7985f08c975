use std::collections::HashMap;
use std::ops::Range;

use deno_ast::swc::ast::{CallExpr, Callee, Expr, Ident, Lit};
use deno_ast::swc::common::SyntaxContext;
use deno_ast::swc::ecma_visit::{Visit, VisitWith};

use crate::plugin_driver::{Plugin, TransformMap, TransformOutput};
use crate::scanner::{scan_parsed, str_value};
use crate::utils::ast::{self, ParsedModule};
use crate::utils::magic_string::MagicString;
use crate::BuildError;

const MODULE_PRELUDE: &str = "var module = { exports: {} }, exports = module.exports;\n";

struct RequireCall {
  range: Range<usize>,
  source: String,
}

/// Finds `require("x")` calls and `module`/`exports` uses that are not bound
/// by the module itself.
struct CommonJsUsage<'a> {
  parsed: &'a ParsedModule,
  code: &'a str,
  unresolved: SyntaxContext,
  requires: Vec<RequireCall>,
  uses_module: bool,
}

impl<'a> CommonJsUsage<'a> {
  fn is_free(&self, ident: &Ident, name: &str) -> bool {
    ident.ctxt == self.unresolved && self.parsed.text(self.code, ident.span) == name
  }
}

impl<'a> Visit for CommonJsUsage<'a> {
  fn visit_call_expr(&mut self, call: &CallExpr) {
    if let Callee::Expr(callee) = &call.callee {
      if let Expr::Ident(ident) = &**callee {
        if self.is_free(ident, "require") {
          match call.args.first().map(|arg| &*arg.expr) {
            Some(Expr::Lit(Lit::Str(s))) if call.args.len() == 1 => {
              self.requires.push(RequireCall {
                range: self.parsed.range(call.span),
                source: str_value(self.parsed, self.code, s),
              });
              return;
            }
            _ => log::warn!("[commonjs] require with a non-literal argument is left as is"),
          }
        }
      }
    }
    call.visit_children_with(self);
  }

  fn visit_ident(&mut self, ident: &Ident) {
    if self.is_free(ident, "module") || self.is_free(ident, "exports") {
      self.uses_module = true;
    }
  }
}

/// Turns CommonJS modules into ES modules whose default export is
/// `module.exports`. Static `require` calls become namespace imports.
pub struct CommonJsPlugin;

impl CommonJsPlugin {
  fn might_be_commonjs(code: &str) -> bool {
    code.contains("require") || code.contains("module") || code.contains("exports")
  }
}

impl Plugin for CommonJsPlugin {
  fn get_name(&self) -> &'static str {
    "commonjs"
  }

  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, BuildError> {
    if !Self::might_be_commonjs(code) || id.ends_with(".json") {
      return Ok(None);
    }

    ast::with_globals(|| {
      let parsed = ast::parse(code, id, ast::js_syntax_for(id)).map_err(|failure| {
        BuildError::Parse {
          file: id.to_owned(),
          line: failure.line,
          column: failure.column,
          message: failure.message,
        }
      })?;
      if scan_parsed(&parsed, code).has_module_syntax() {
        return Ok(None);
      }

      let mut usage = CommonJsUsage {
        parsed: &parsed,
        code,
        unresolved: parsed.unresolved_ctxt,
        requires: vec![],
        uses_module: false,
      };
      parsed.module.visit_with(&mut usage);
      if usage.requires.is_empty() && !usage.uses_module {
        return Ok(None);
      }

      let mut s = MagicString::new(code);
      let mut locals: HashMap<&str, String> = HashMap::default();
      let mut imports = String::new();
      for call in &usage.requires {
        let next = locals.len();
        let local = locals.entry(call.source.as_str()).or_insert_with(|| {
          let local = format!("__cjs_require{}", next);
          imports.push_str(&format!(
            "import * as {} from {};\n",
            local,
            ast::quote(&call.source)
          ));
          local
        });
        s.overwrite(call.range.start, call.range.end, local.clone());
      }
      s.prepend(MODULE_PRELUDE);
      s.prepend(&imports);
      s.append("\nexport default module.exports;\n");

      log::debug!(
        "[commonjs] {} is CommonJS with {} require calls",
        id,
        usage.requires.len()
      );
      let (code, map) = s.generate(id);
      let mut output = TransformOutput::new(code, TransformMap::Generated(map));
      output.commonjs = true;
      Ok(Some(output))
    })
  }
}
