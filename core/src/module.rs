use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use sourcemap::SourceMap;

use crate::scanner::{ExportRecord, ModuleScan};
use crate::types::ResolvedId;

/// A bundled module after the transform chain, frozen once its pass is done.
#[derive(Debug, Clone)]
pub struct ModuleNode {
  pub id: String,
  pub raw_source: String,
  pub transformed_source: String,
  /// Maps `transformed_source` back to the original sources.
  pub map_fragment: SourceMap,
  // static dependency ids, in import order
  pub dependencies: Vec<String>,
  pub dynamic_dependencies: Vec<String>,
  pub resolved_ids: HashMap<String, ResolvedId>,
  pub scan: ModuleScan,
  pub is_commonjs: bool,
  pub is_entry: bool,
  pub importers: BTreeSet<String>,
}

impl ModuleNode {
  /// Id that `source`, as written in this module, was resolved to.
  pub fn resolved(&self, source: &str) -> Option<&ResolvedId> {
    self.resolved_ids.get(source)
  }

  /// Names the module exports, in declaration order. `export *` is not
  /// expanded here.
  pub fn export_names(&self) -> Vec<String> {
    let mut names = vec![];
    for export in &self.scan.exports {
      match export {
        ExportRecord::Decl { names: declared, .. } => names.extend(declared.iter().cloned()),
        ExportRecord::DefaultDecl { .. } | ExportRecord::DefaultExpr { .. } => {
          names.push(String::from("default"))
        }
        ExportRecord::Named { specifiers, .. } => {
          names.extend(specifiers.iter().map(|(exported, _)| exported.clone()))
        }
        ExportRecord::ReExport { specifiers, .. } => {
          names.extend(specifiers.iter().map(|(exported, _)| exported.clone()))
        }
        ExportRecord::Star { .. } => {}
      }
    }
    names
  }
}

impl PartialEq for ModuleNode {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ModuleNode {}

impl Hash for ModuleNode {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    state.write(self.id.as_bytes());
  }
}
