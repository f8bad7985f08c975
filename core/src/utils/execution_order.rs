use std::collections::{HashMap, HashSet};
use std::path::Path;

use linked_hash_map::LinkedHashMap;

use crate::types::ModOrExt;
use crate::utils::nodejs::relative_id;

struct Analysis<'a> {
  modules: &'a LinkedHashMap<String, ModOrExt>,
  cwd: &'a Path,
  cycle_paths: Vec<Vec<String>>,
  analysed_modules: HashSet<&'a str>,
  dynamic_imports: Vec<&'a str>,
  parents: HashMap<&'a str, Option<&'a str>>,
  ordered_modules: Vec<String>,
}

impl<'a> Analysis<'a> {
  fn analyse_module(&mut self, id: &'a str) {
    let modules = self.modules;
    if let Some(ModOrExt::Mod(module)) = modules.get(id) {
      for dependency in &module.dependencies {
        let dependency = dependency.as_str();
        if modules.get(dependency).map_or(true, |m| m.is_ext()) {
          continue;
        }
        if self.parents.contains_key(dependency) {
          if !self.analysed_modules.contains(dependency) {
            let path = self.get_cycle_path(dependency, id);
            self.cycle_paths.push(path);
          }
          continue;
        }
        self.parents.insert(dependency, Some(id));
        self.analyse_module(dependency);
      }

      for dynamic in &module.dynamic_dependencies {
        if !self.dynamic_imports.contains(&dynamic.as_str()) {
          self.dynamic_imports.push(dynamic.as_str());
        }
      }
      self.ordered_modules.push(module.id.clone());
    }
    self.analysed_modules.insert(id);
  }

  fn get_cycle_path(&self, module: &str, parent: &'a str) -> Vec<String> {
    let mut path = vec![relative_id(module, self.cwd)];
    let mut maybe_next_module = Some(parent);
    while let Some(next_module) = maybe_next_module {
      if next_module == module {
        break;
      }
      path.push(relative_id(next_module, self.cwd));
      maybe_next_module = self.parents.get(next_module).copied().flatten();
    }
    path.push(relative_id(module, self.cwd));
    path.reverse();
    path
  }
}

/// Orders the bundled modules so every module comes after its static
/// dependencies, starting from `entry`. Modules reached only through dynamic
/// imports follow. Returns the cycle paths found on the way and the order.
pub fn analyse_module_execution(
  entry: &str,
  modules: &LinkedHashMap<String, ModOrExt>,
  cwd: &Path,
) -> (Vec<Vec<String>>, Vec<String>) {
  let mut analysis = Analysis {
    modules,
    cwd,
    cycle_paths: vec![],
    analysed_modules: HashSet::default(),
    dynamic_imports: vec![],
    parents: HashMap::default(),
    ordered_modules: vec![],
  };

  let entry = match modules.get(entry) {
    Some(module) => module.id(),
    None => return (vec![], vec![]),
  };
  analysis.parents.insert(entry, None);
  analysis.analyse_module(entry);

  let mut next = 0;
  while next < analysis.dynamic_imports.len() {
    let dynamic = analysis.dynamic_imports[next];
    next += 1;
    if !analysis.parents.contains_key(dynamic) {
      analysis.parents.insert(dynamic, None);
      analysis.analyse_module(dynamic);
    }
  }

  (analysis.cycle_paths, analysis.ordered_modules)
}
