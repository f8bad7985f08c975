use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use ahash::RandomState;
use linked_hash_map::LinkedHashMap;
use log::debug;

use crate::error::{BuildError, Warning};
use crate::external_module::ExternalModule;
use crate::graph::ModuleGraph;
use crate::module::ModuleNode;
use crate::plugin_driver::PluginDriver;
use crate::scanner;
use crate::types::{is_virtual_id, ModOrExt, NormalizedInputOptions, ResolvedId};
use crate::utils::execution_order::analyse_module_execution;
use crate::utils::nodejs::relative_id;
use crate::utils::resolve_id::{is_path_like, Resolver};

const EMPTY_MODULE_SOURCE: &str = "export default {};\n";

/// State of one build pass. Every pass starts from a fresh loader.
pub struct ModuleLoader<'a> {
  options: &'a NormalizedInputOptions,
  resolver: Resolver<'a>,
  plugin_driver: &'a PluginDriver,
  modules_by_id: LinkedHashMap<String, ModOrExt>,
  seen: HashSet<String, RandomState>,
  first_importer: HashMap<String, String, RandomState>,
  queue: VecDeque<String>,
}

impl<'a> ModuleLoader<'a> {
  pub fn new(options: &'a NormalizedInputOptions, plugin_driver: &'a PluginDriver) -> Self {
    Self {
      options,
      resolver: Resolver::new(options),
      plugin_driver,
      modules_by_id: LinkedHashMap::new(),
      seen: HashSet::default(),
      first_importer: HashMap::default(),
      queue: VecDeque::default(),
    }
  }

  /// Loads everything reachable from the configured entry.
  pub fn build(mut self) -> Result<ModuleGraph, BuildError> {
    let options = self.options;
    let input = &options.input;
    debug!("[graph] start build for entry {}", input);
    let specifier = if is_path_like(input) {
      input.clone()
    } else {
      format!("./{}", input)
    };
    let entry = self
      .resolver
      .resolve(&specifier, None)?
      .filter(|resolved| !resolved.external)
      .ok_or_else(|| BuildError::Resolution {
        specifier: input.clone(),
        importer_chain: vec![],
      })?;
    let entry_id = entry.id.clone();
    self.enqueue(entry, None);

    while let Some(id) = self.queue.pop_front() {
      let mut module = self.load_module(&id)?;
      module.is_entry = id == entry_id;

      let edges = module
        .dependencies
        .iter()
        .chain(module.dynamic_dependencies.iter())
        .filter_map(|dep| module.resolved_ids.values().find(|r| &r.id == dep))
        .cloned()
        .collect::<Vec<_>>();
      self.modules_by_id.insert(id.clone(), module.into());
      for resolved in edges {
        self.enqueue(resolved, Some(&id));
      }
    }

    self.link_importers();
    let (cycle_paths, execution_order) =
      analyse_module_execution(&entry_id, &self.modules_by_id, &self.options.cwd);
    let warnings = cycle_paths
      .into_iter()
      .map(|cycle| {
        let warning = Warning::CircularDependency { cycle };
        log::warn!("[graph] {}", warning);
        warning
      })
      .collect();

    debug!(
      "[graph] built {} modules from {}",
      self.modules_by_id.len(),
      entry_id
    );
    Ok(ModuleGraph {
      entry: entry_id,
      cwd: self.options.cwd.clone(),
      modules: self.modules_by_id,
      execution_order,
      warnings,
    })
  }

  /// The single place where ids are deduplicated.
  fn enqueue(&mut self, resolved: ResolvedId, importer: Option<&str>) {
    if !self.seen.insert(resolved.id.clone()) {
      return;
    }
    if let Some(importer) = importer {
      self
        .first_importer
        .insert(resolved.id.clone(), importer.to_owned());
    }
    if resolved.external {
      debug!("[graph] external {}", resolved.id);
      self.modules_by_id.insert(
        resolved.id.clone(),
        ExternalModule::new(resolved.id).into(),
      );
    } else {
      self.queue.push_back(resolved.id);
    }
  }

  fn load_module(&self, id: &str) -> Result<ModuleNode, BuildError> {
    debug!("[graph] load {}", id);
    let raw_source = if is_virtual_id(id) {
      EMPTY_MODULE_SOURCE.to_owned()
    } else {
      fs::read_to_string(id).map_err(|err| BuildError::io(id, err))?
    };

    let transformed = self.plugin_driver.transform(&raw_source, id)?;
    let scan = scanner::scan(&transformed.code, id)?;

    let static_sources = scan.static_sources();
    let mut resolved_ids = HashMap::default();
    let mut dependencies: Vec<String> = vec![];
    let mut dynamic_dependencies: Vec<String> = vec![];

    for source in scan.sources() {
      let resolved = self
        .resolver
        .resolve(&source, Some(id))?
        .ok_or_else(|| BuildError::Resolution {
          specifier: source.clone(),
          importer_chain: self.importer_chain(id),
        })?;
      debug!("[graph] {} -> {} in {}", source, resolved.id, id);

      let target = if static_sources.contains(&source) {
        &mut dependencies
      } else {
        &mut dynamic_dependencies
      };
      if !target.contains(&resolved.id) {
        target.push(resolved.id.clone());
      }
      resolved_ids.insert(source, resolved);
    }
    dynamic_dependencies.retain(|id| !dependencies.contains(id));

    Ok(ModuleNode {
      id: id.to_owned(),
      raw_source,
      transformed_source: transformed.code,
      map_fragment: transformed.map,
      dependencies,
      dynamic_dependencies,
      resolved_ids,
      scan,
      is_commonjs: transformed.commonjs,
      is_entry: false,
      importers: Default::default(),
    })
  }

  /// Ids from the entry down to `id`, following first importers.
  fn importer_chain(&self, id: &str) -> Vec<String> {
    let cwd: &Path = &self.options.cwd;
    let mut chain = vec![relative_id(id, cwd)];
    let mut current = id;
    while let Some(importer) = self.first_importer.get(current) {
      chain.push(relative_id(importer, cwd));
      current = importer;
    }
    chain.reverse();
    chain
  }

  fn link_importers(&mut self) {
    let edges = self
      .modules_by_id
      .values()
      .filter_map(|m| m.as_mod())
      .flat_map(|m| {
        m.dependencies
          .iter()
          .chain(m.dynamic_dependencies.iter())
          .map(move |dep| (dep.clone(), m.id.clone()))
      })
      .collect::<Vec<_>>();
    for (dependency, importer) in edges {
      if let Some(module) = self.modules_by_id.get_mut(&dependency) {
        module.add_importer(importer);
      }
    }
  }
}
