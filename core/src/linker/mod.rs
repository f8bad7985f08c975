use std::collections::{HashMap, HashSet};
use std::path::Path;

use linked_hash_map::LinkedHashMap;
use sourcemap::SourceMap;

use crate::graph::ModuleGraph;
use crate::module::ModuleNode;
use crate::scanner::{ExportRecord, Imported};
use crate::types::ModOrExt;
use crate::utils::ast::{is_identifier_name, quote};
use crate::utils::magic_string::MagicString;

/// Names the emitted code defines or relies on around the module bodies.
const RESERVED_NAMES: [&str; 13] = [
  "__export",
  "__reexport",
  "__interopNamespace",
  "__esModule",
  "exports",
  "module",
  "require",
  "define",
  "global",
  "globalThis",
  "factory",
  "self",
  "undefined",
];

/// `object.name`, or `object["name"]` when `name` is not an identifier.
pub fn member(object: &str, name: &str) -> String {
  if is_identifier_name(name) {
    format!("{}.{}", object, name)
  } else {
    format!("{}[{}]", object, quote(name))
  }
}

/// What an imported or exported name stands for in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
  /// A top-level variable of the bundle.
  Local(String),
  /// A property of a CommonJS module's exports object.
  Member(String),
  External { id: String, imported: Imported },
}

/// Top-level names of the whole bundle, chosen once per graph.
pub struct LinkPlan<'g> {
  graph: &'g ModuleGraph,
  // module id -> declared name -> name in the bundle
  names: HashMap<String, HashMap<String, String>>,
  // variables holding `export default <expr>`
  defaults: HashMap<String, String>,
  /// Namespace objects to materialize, by module id.
  pub namespaces: LinkedHashMap<String, String>,
  /// Variable holding each external's namespace.
  pub externals: LinkedHashMap<String, String>,
}

fn deconflict(used: &mut HashSet<String>, original_name: &str) -> String {
  let mut name = original_name.to_owned();
  let mut count = 0;
  while used.contains(&name) {
    name = format!("{}${}", original_name, count);
    count += 1;
  }
  used.insert(name.clone());
  name
}

/// Identifier-safe stem of a module's file name.
fn stem(id: &str) -> String {
  let stem = Path::new(id)
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  let mut stem = stem
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '$' { c } else { '_' })
    .collect::<String>();
  if stem.is_empty() || stem.starts_with(|c: char| c.is_ascii_digit()) {
    stem.insert(0, '_');
  }
  stem
}

impl<'g> LinkPlan<'g> {
  pub fn new(graph: &'g ModuleGraph) -> Self {
    let mut used = RESERVED_NAMES
      .iter()
      .map(|name| name.to_string())
      .collect::<HashSet<_>>();
    graph
      .ordered_modules()
      .for_each(|module| used.extend(module.scan.globals.iter().cloned()));

    let externals = graph
      .externals()
      .iter()
      .enumerate()
      .map(|(i, ext)| {
        let local = deconflict(&mut used, &format!("__ext{}", i));
        (ext.id.clone(), local)
      })
      .collect::<LinkedHashMap<_, _>>();

    // the entry keeps its names, the rest yield in execution order
    let mut modules = graph.ordered_modules().collect::<Vec<_>>();
    modules.sort_by_key(|module| !module.is_entry);

    let mut names = HashMap::new();
    for module in &modules {
      let renamed = module
        .scan
        .declared_names()
        .into_iter()
        .map(|name| {
          let final_name = deconflict(&mut used, &name);
          (name, final_name)
        })
        .collect::<HashMap<_, _>>();
      names.insert(module.id.clone(), renamed);
    }

    let mut defaults = HashMap::new();
    for module in &modules {
      let has_default_expr = module
        .scan
        .exports
        .iter()
        .any(|export| matches!(export, ExportRecord::DefaultExpr { .. }));
      if has_default_expr {
        let local = deconflict(&mut used, &format!("{}_default", stem(&module.id)));
        defaults.insert(module.id.clone(), local);
      }
    }

    let mut namespaces = LinkedHashMap::new();
    for module in graph.ordered_modules() {
      for target in namespace_targets(module) {
        let eligible = matches!(graph.get_module(&target), Some(ModOrExt::Mod(node)) if !node.is_commonjs);
        if eligible && !namespaces.contains_key(&target) {
          let local = deconflict(&mut used, &format!("{}_ns", stem(&target)));
          namespaces.insert(target, local);
        }
      }
    }

    log::debug!(
      "[linker] planned {} modules, {} namespaces, {} externals",
      names.len(),
      namespaces.len(),
      externals.len()
    );
    Self {
      graph,
      names,
      defaults,
      namespaces,
      externals,
    }
  }

  fn local_name(&self, id: &str, name: &str) -> String {
    self
      .names
      .get(id)
      .and_then(|names| names.get(name))
      .cloned()
      .unwrap_or_else(|| name.to_owned())
  }

  /// Expression that reads `binding`. The same text works in every format
  /// since externals are always held as namespace objects.
  pub fn expression(&self, binding: &Binding) -> String {
    match binding {
      Binding::Local(name) | Binding::Member(name) => name.clone(),
      Binding::External { id, imported } => {
        let local = self
          .externals
          .get(id)
          .cloned()
          .unwrap_or_else(|| String::from("undefined"));
        match imported {
          Imported::Namespace => local,
          Imported::Default => member(&local, "default"),
          Imported::Named(name) => member(&local, name),
        }
      }
    }
  }

  /// What `name`, exported by the module `id`, stands for.
  pub fn resolve_export(&self, id: &str, name: &str) -> Option<Binding> {
    self.resolve_export_inner(id, name, &mut HashSet::new())
  }

  fn resolve_export_inner(
    &self,
    id: &str,
    name: &str,
    visited: &mut HashSet<(String, String)>,
  ) -> Option<Binding> {
    let module = match self.graph.get_module(id)? {
      ModOrExt::Ext(ext) => {
        return Some(Binding::External {
          id: ext.id.clone(),
          imported: Imported::from_name(name.to_owned()),
        })
      }
      ModOrExt::Mod(module) => module,
    };
    if !visited.insert((id.to_owned(), name.to_owned())) {
      return None;
    }
    if module.is_commonjs && name != "default" {
      let exports = self.resolve_export_inner(id, "default", visited)?;
      return Some(Binding::Member(member(&self.expression(&exports), name)));
    }

    for export in &module.scan.exports {
      match export {
        ExportRecord::Decl { names, .. } if names.iter().any(|n| n == name) => {
          return Some(Binding::Local(self.local_name(id, name)));
        }
        ExportRecord::DefaultDecl { local, .. } if name == "default" => {
          return Some(Binding::Local(self.local_name(id, local)));
        }
        ExportRecord::DefaultExpr { .. } if name == "default" => {
          return self.defaults.get(id).cloned().map(Binding::Local);
        }
        ExportRecord::Named { specifiers, .. } => {
          if let Some((_, local)) = specifiers.iter().find(|(exported, _)| exported == name) {
            return match module.scan.import_binding(local) {
              Some((import, binding)) => {
                self.resolve_import(module, &import.source, &binding.imported, visited)
              }
              None => Some(Binding::Local(self.local_name(id, local))),
            };
          }
        }
        ExportRecord::ReExport {
          source, specifiers, ..
        } => {
          if let Some((_, imported)) = specifiers.iter().find(|(exported, _)| exported == name) {
            return self.resolve_import(module, source, imported, visited);
          }
        }
        _ => {}
      }
    }

    if name == "default" {
      return None;
    }
    let mut external_star = None;
    for export in &module.scan.exports {
      if let ExportRecord::Star { source, .. } = export {
        let resolved = match module.resolved(source) {
          Some(resolved) => resolved,
          None => continue,
        };
        if resolved.external {
          external_star.get_or_insert_with(|| resolved.id.clone());
        } else if let Some(binding) = self.resolve_export_inner(&resolved.id, name, visited) {
          return Some(binding);
        }
      }
    }
    external_star.map(|id| Binding::External {
      id,
      imported: Imported::Named(name.to_owned()),
    })
  }

  fn resolve_import(
    &self,
    module: &ModuleNode,
    source: &str,
    imported: &Imported,
    visited: &mut HashSet<(String, String)>,
  ) -> Option<Binding> {
    let target = &module.resolved(source)?.id;
    match imported {
      Imported::Namespace => self.namespace_binding(target),
      Imported::Default => self.resolve_export_inner(target, "default", visited),
      Imported::Named(name) => self.resolve_export_inner(target, name, visited),
    }
  }

  /// The namespace object of the module `id`.
  pub fn namespace_binding(&self, id: &str) -> Option<Binding> {
    match self.graph.get_module(id)? {
      ModOrExt::Ext(ext) => Some(Binding::External {
        id: ext.id.clone(),
        imported: Imported::Namespace,
      }),
      ModOrExt::Mod(module) if module.is_commonjs => self.resolve_export(id, "default"),
      ModOrExt::Mod(_) => self.namespaces.get(id).cloned().map(Binding::Local),
    }
  }

  /// Exports of the module `id` that resolve to a binding, with `export *`
  /// from bundled modules expanded, plus the externals whose exports pass
  /// through unexpanded. Names that resolve to nothing are dropped.
  pub fn exports_of(&self, id: &str) -> (Vec<(String, Binding)>, Vec<String>) {
    let (names, external_stars) = resolve_exports(self.graph, id);
    let bindings = names
      .into_iter()
      .filter_map(|name| match self.resolve_export(id, &name) {
        Some(binding) => Some((name, binding)),
        None => {
          log::warn!(
            "[linker] {} exports {:?} but nothing provides it at runtime, dropping it",
            self.graph.relative_id(id),
            name
          );
          None
        }
      })
      .collect();
    (bindings, external_stars)
  }
}

/// Modules whose namespace object `module` needs.
fn namespace_targets(module: &ModuleNode) -> Vec<String> {
  let imported = module
    .scan
    .imports
    .iter()
    .filter(|import| {
      import
        .bindings
        .iter()
        .any(|binding| binding.imported == Imported::Namespace)
    })
    .map(|import| import.source.as_str());
  let re_exported = module.scan.exports.iter().filter_map(|export| match export {
    ExportRecord::ReExport {
      source, specifiers, ..
    } if specifiers
      .iter()
      .any(|(_, imported)| *imported == Imported::Namespace) =>
    {
      Some(source.as_str())
    }
    _ => None,
  });
  let dynamic = module
    .scan
    .dynamic_imports
    .iter()
    .map(|dynamic| dynamic.source.as_str());
  imported
    .chain(re_exported)
    .chain(dynamic)
    .filter_map(|source| module.resolved(source))
    .map(|resolved| resolved.id.clone())
    .collect()
}

/// A module body rewritten to live in the bundle's shared top-level scope.
pub struct LinkedModule {
  pub id: String,
  pub code: String,
  /// Maps `code` back to the module's transformed source.
  pub map: SourceMap,
}

pub struct Linker<'p, 'g> {
  plan: &'p LinkPlan<'g>,
  module: &'g ModuleNode,
}

impl<'p, 'g> Linker<'p, 'g> {
  pub fn new(plan: &'p LinkPlan<'g>, module: &'g ModuleNode) -> Self {
    Self { plan, module }
  }

  fn imported_expression(&self, local: &str) -> Option<String> {
    let (import, binding) = self.module.scan.import_binding(local)?;
    let resolved = self.plan.resolve_import(
      self.module,
      &import.source,
      &binding.imported,
      &mut HashSet::new(),
    );
    Some(match resolved {
      Some(resolved) => self.plan.expression(&resolved),
      None => {
        log::warn!(
          "[linker] {} imports {:?} from {:?}, which does not provide it",
          self.plan.graph.relative_id(&self.module.id),
          local,
          import.source
        );
        String::from("(void 0)")
      }
    })
  }

  pub fn link(self) -> LinkedModule {
    let module = self.module;
    let code = module.transformed_source.as_str();
    let mut s = MagicString::new(code);

    for import in &module.scan.imports {
      s.remove(import.range.start, import.range.end);
    }

    for export in &module.scan.exports {
      match export {
        ExportRecord::Decl { keyword, .. } | ExportRecord::DefaultDecl { keyword, .. } => {
          s.remove(keyword.start, keyword.end);
        }
        ExportRecord::DefaultExpr { keyword, end } => {
          let local = self
            .plan
            .defaults
            .get(&module.id)
            .cloned()
            .unwrap_or_else(|| String::from("__default"));
          s.overwrite(keyword.start, keyword.end, format!("var {} = ", local));
          if !code[..*end].trim_end().ends_with(';') {
            s.insert(*end, ";");
          }
        }
        ExportRecord::Named { range, .. }
        | ExportRecord::ReExport { range, .. }
        | ExportRecord::Star { range, .. } => {
          s.remove(range.start, range.end);
        }
      }
    }

    // imports resolve once per local name
    let mut imported: HashMap<&str, Option<String>> = HashMap::new();
    for reference in &module.scan.references {
      let local = reference.local.as_str();
      let replacement = imported
        .entry(local)
        .or_insert_with(|| self.imported_expression(local))
        .clone()
        .unwrap_or_else(|| self.plan.local_name(&module.id, local));
      if replacement == local {
        continue;
      }
      let replacement = if reference.shorthand {
        format!("{}: {}", local, replacement)
      } else {
        replacement
      };
      s.overwrite(reference.range.start, reference.range.end, replacement);
    }

    for dynamic in &module.scan.dynamic_imports {
      let namespace = module
        .resolved(&dynamic.source)
        .and_then(|resolved| self.plan.namespace_binding(&resolved.id));
      if let Some(namespace) = namespace {
        s.overwrite(
          dynamic.range.start,
          dynamic.range.end,
          format!(
            "Promise.resolve().then(function () {{ return {}; }})",
            self.plan.expression(&namespace)
          ),
        );
      }
    }

    s.prepend(&format!("// {}\n", self.plan.graph.relative_id(&module.id)));
    if !code.ends_with('\n') {
      s.append("\n");
    }

    log::debug!("[linker] linked {}", module.id);
    let (code, map) = s.generate(&module.id);
    LinkedModule {
      id: module.id.clone(),
      code,
      map,
    }
  }
}

/// Names the module with `id` exports once `export *` from bundled modules is
/// expanded, plus the external sources whose exports pass through unexpanded.
pub fn resolve_exports(graph: &ModuleGraph, id: &str) -> (Vec<String>, Vec<String>) {
  let mut names = vec![];
  let mut external_stars = vec![];
  let mut visited = HashSet::new();
  collect_exports(graph, id, &mut visited, &mut names, &mut external_stars, true);
  (names, external_stars)
}

fn collect_exports(
  graph: &ModuleGraph,
  id: &str,
  visited: &mut HashSet<String>,
  names: &mut Vec<String>,
  external_stars: &mut Vec<String>,
  include_default: bool,
) {
  if !visited.insert(id.to_owned()) {
    return;
  }
  let module = match graph.get_module(id).and_then(|m| m.as_mod()) {
    Some(module) => module,
    None => return,
  };
  for name in module.export_names() {
    if (include_default || name != "default") && !names.contains(&name) {
      names.push(name);
    }
  }
  for export in &module.scan.exports {
    if let ExportRecord::Star { source, .. } = export {
      let resolved = match module.resolved(source) {
        Some(resolved) => resolved,
        None => continue,
      };
      if resolved.external {
        if !external_stars.contains(&resolved.id) {
          external_stars.push(resolved.id.clone());
        }
      } else {
        collect_exports(graph, &resolved.id, visited, names, external_stars, false);
      }
    }
  }
}
