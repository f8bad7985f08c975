use std::path::PathBuf;

use linked_hash_map::LinkedHashMap;

use crate::error::{BuildError, Warning};
use crate::external_module::ExternalModule;
use crate::module::ModuleNode;
use crate::module_loader::ModuleLoader;
use crate::plugin_driver::PluginDriver;
use crate::types::{ModOrExt, NormalizedInputOptions};
use crate::utils::nodejs::relative_id;

/// The closed dependency graph of one build pass. Renderers only ever see it
/// through a shared reference.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ModuleGraph {
  pub entry: String,
  pub cwd: PathBuf,
  /// Every module by id. Bundled modules appear in load order, externals as
  /// soon as they are first imported.
  pub modules: LinkedHashMap<String, ModOrExt>,
  /// Bundled module ids, dependencies before dependents.
  pub execution_order: Vec<String>,
  pub warnings: Vec<Warning>,
}

impl ModuleGraph {
  /// Runs one build pass with the fixed transform chain.
  pub fn build(options: &NormalizedInputOptions) -> Result<Self, BuildError> {
    let plugin_driver = PluginDriver::new();
    ModuleLoader::new(options, &plugin_driver).build()
  }

  #[inline]
  pub fn get_module(&self, id: &str) -> Option<&ModOrExt> {
    self.modules.get(id)
  }

  pub fn entry_module(&self) -> Option<&ModuleNode> {
    self.get_module(&self.entry).and_then(|m| m.as_mod())
  }

  /// External modules in first-import order.
  pub fn externals(&self) -> Vec<&ExternalModule> {
    self.modules.values().filter_map(|m| m.as_ext()).collect()
  }

  /// Bundled modules in execution order.
  pub fn ordered_modules(&self) -> impl Iterator<Item = &ModuleNode> {
    self
      .execution_order
      .iter()
      .filter_map(move |id| self.get_module(id).and_then(|m| m.as_mod()))
  }

  pub fn relative_id(&self, id: &str) -> String {
    relative_id(id, &self.cwd)
  }

  pub fn execution_order_relative(&self) -> Vec<String> {
    self
      .execution_order
      .iter()
      .map(|id| self.relative_id(id))
      .collect()
  }
}
