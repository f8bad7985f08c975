use rayon::prelude::*;

use crate::error::BuildError;
use crate::graph::ModuleGraph;
use crate::linker::{member, Binding, LinkPlan, LinkedModule, Linker};
use crate::scanner::Imported;
use crate::source_map::RenderedPosition;
use crate::types::{NormalizedOutputOptions, OutputFormat};
use crate::utils::ast::{is_identifier_name, quote};

const RUNTIME: &str = r#"function __export(target, name, getter) {
  Object.defineProperty(target, name, { enumerable: true, get: getter });
}
function __reexport(target, source) {
  Object.keys(source).forEach(function (key) {
    if (key !== "default" && !Object.prototype.hasOwnProperty.call(target, key)) {
      __export(target, key, function () { return source[key]; });
    }
  });
}
function __interopNamespace(e) {
  if (e && e.__esModule) return e;
  var n = Object.create(null);
  if (e) {
    Object.keys(e).forEach(function (k) {
      if (k !== "default") __export(n, k, function () { return e[k]; });
    });
  }
  n.default = e;
  return n;
}
"#;

/// Text of one artifact plus where each module landed in it.
pub struct RenderedChunk {
  pub code: String,
  pub rendered_positions: Vec<RenderedPosition>,
}

#[derive(Default)]
struct Output {
  code: String,
  line: u32,
  rendered_positions: Vec<RenderedPosition>,
}

impl Output {
  fn push(&mut self, text: &str) {
    self.line += text.matches('\n').count() as u32;
    self.code.push_str(text);
  }

  fn push_module(&mut self, linked: LinkedModule) {
    self.rendered_positions.push(RenderedPosition {
      id: linked.id,
      line: self.line,
      map: linked.map,
    });
    self.push(&linked.code);
  }
}

/// Everything of the graph that goes into one output file.
pub struct Chunk<'g> {
  graph: &'g ModuleGraph,
  plan: LinkPlan<'g>,
  pub order_modules: Vec<String>,
}

impl<'g> Chunk<'g> {
  pub fn new(graph: &'g ModuleGraph) -> Self {
    Self {
      graph,
      plan: LinkPlan::new(graph),
      order_modules: graph.execution_order.clone(),
    }
  }

  fn link_modules(&self) -> Vec<LinkedModule> {
    self
      .order_modules
      .par_iter()
      .filter_map(|id| self.graph.get_module(id).and_then(|m| m.as_mod()))
      .map(|module| Linker::new(&self.plan, module).link())
      .collect()
  }

  fn external_local(&self, id: &str) -> String {
    self
      .plan
      .externals
      .get(id)
      .cloned()
      .unwrap_or_else(|| String::from("undefined"))
  }

  /// Getter definitions that fill `target` with `exports`.
  fn define_exports(
    &self,
    out: &mut Output,
    target: &str,
    exports: &[(String, Binding)],
    external_stars: &[String],
  ) {
    for (name, binding) in exports {
      out.push(&format!(
        "__export({}, {}, function () {{ return {}; }});\n",
        target,
        quote(name),
        self.plan.expression(binding)
      ));
    }
    for star in external_stars {
      out.push(&format!("__reexport({}, {});\n", target, self.external_local(star)));
    }
  }

  /// Objects standing in for `import * as ns` and `import()` of bundled modules.
  fn push_namespaces(&self, out: &mut Output) {
    for (id, local) in self.plan.namespaces.iter() {
      out.push(&format!("var {} = {{}};\n", local));
      let (exports, external_stars) = self.plan.exports_of(id);
      self.define_exports(out, local, &exports, &external_stars);
    }
  }

  pub fn render(&self, target: &NormalizedOutputOptions) -> Result<RenderedChunk, BuildError> {
    let output = match target.format {
      OutputFormat::Umd => self.render_umd(target)?,
      OutputFormat::Es => self.render_es(),
    };
    log::debug!(
      "[chunk] rendered {} modules for {}",
      output.rendered_positions.len(),
      target.file.display()
    );
    Ok(RenderedChunk {
      code: output.code,
      rendered_positions: output.rendered_positions,
    })
  }

  fn render_umd(&self, target: &NormalizedOutputOptions) -> Result<Output, BuildError> {
    let externals = self.graph.externals();
    let (exports, external_stars) = self.plan.exports_of(&self.graph.entry);
    let has_exports = !exports.is_empty() || !external_stars.is_empty();
    let name = match (&target.name, has_exports) {
      (Some(name), _) => Some(name.as_str()),
      (None, false) => None,
      (None, true) => return Err(BuildError::MissingName(target.file.display().to_string())),
    };

    let external_params = externals
      .iter()
      .map(|ext| self.external_local(&ext.id))
      .collect::<Vec<_>>();
    let required = externals
      .iter()
      .map(|ext| format!("require({})", quote(&ext.id)))
      .collect::<Vec<_>>();
    let amd_deps = externals.iter().map(|ext| quote(&ext.id)).collect::<Vec<_>>();
    let globals = externals
      .iter()
      .map(|ext| {
        let global = target.globals.get(&ext.id).unwrap_or(&ext.id);
        member("global", global)
      })
      .collect::<Vec<_>>();

    let mut cjs_args = vec![];
    let mut amd_args = vec![];
    let mut global_args = vec![];
    let mut params = vec![];
    if has_exports {
      cjs_args.push(String::from("exports"));
      amd_args.push(quote("exports"));
      global_args.push(format!("{} = {{}}", member("global", name.unwrap_or_default())));
      params.push(String::from("exports"));
    }
    cjs_args.extend(required);
    amd_args.extend(amd_deps);
    global_args.extend(globals);
    params.extend(external_params.iter().cloned());

    let mut out = Output::default();
    out.push(&format!(
      "(function (global, factory) {{\n  typeof exports === 'object' && typeof module !== 'undefined' ? factory({}) :\n  typeof define === 'function' && define.amd ? define([{}], factory) :\n  (global = typeof globalThis !== 'undefined' ? globalThis : global || self, factory({}));\n}})(this, (function ({}) {{ 'use strict';\n\n",
      cjs_args.join(", "),
      amd_args.join(", "),
      global_args.join(", "),
      params.join(", ")
    ));
    out.push(RUNTIME);
    for param in &external_params {
      out.push(&format!("{} = __interopNamespace({});\n", param, param));
    }
    self.push_namespaces(&mut out);

    for linked in self.link_modules() {
      out.push_module(linked);
    }

    self.define_exports(&mut out, "exports", &exports, &external_stars);
    if has_exports {
      out.push("Object.defineProperty(exports, '__esModule', { value: true });\n");
    }
    out.push("\n}));\n");
    Ok(out)
  }

  fn render_es(&self) -> Output {
    let externals = self.graph.externals();
    let (exports, external_stars) = self.plan.exports_of(&self.graph.entry);

    let mut out = Output::default();
    for ext in &externals {
      out.push(&format!(
        "import * as {} from {};\n",
        self.external_local(&ext.id),
        quote(&ext.id)
      ));
    }
    if !self.plan.namespaces.is_empty() {
      out.push(RUNTIME);
      self.push_namespaces(&mut out);
    }

    for linked in self.link_modules() {
      out.push_module(linked);
    }

    let exported_name = |name: &str| {
      if is_identifier_name(name) {
        name.to_owned()
      } else {
        quote(name)
      }
    };
    let mut specifiers = vec![];
    let mut snapshots = vec![];
    let mut passthrough = vec![];
    for (name, binding) in &exports {
      let exported = exported_name(name);
      match binding {
        Binding::Local(local) if *local == exported => specifiers.push(exported),
        Binding::Local(local) => specifiers.push(format!("{} as {}", local, exported)),
        // CommonJS exports are properties, read once the bundle has run
        Binding::Member(expression) => {
          let local = format!("__export_{}", snapshots.len());
          snapshots.push(format!("{} = {}", local, expression));
          specifiers.push(format!("{} as {}", local, exported));
        }
        Binding::External { id, imported } => {
          let line = match imported {
            Imported::Namespace => format!("export * as {} from {};\n", exported, quote(id)),
            Imported::Default => {
              format!("export {{ default as {} }} from {};\n", exported, quote(id))
            }
            Imported::Named(imported) => format!(
              "export {{ {} as {} }} from {};\n",
              exported_name(imported),
              exported,
              quote(id)
            ),
          };
          passthrough.push(line);
        }
      }
    }
    if !snapshots.is_empty() {
      out.push(&format!("var {};\n", snapshots.join(", ")));
    }
    if !specifiers.is_empty() {
      out.push(&format!("export {{ {} }};\n", specifiers.join(", ")));
    }
    for line in passthrough {
      out.push(&line);
    }
    for star in &external_stars {
      out.push(&format!("export * from {};\n", quote(star)));
    }
    out
  }
}
