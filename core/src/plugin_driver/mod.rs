use sourcemap::SourceMap;

use crate::plugin::{CommonJsPlugin, JsonPlugin, SourceMapsPlugin, TypeScriptPlugin};
use crate::source_map;
use crate::BuildError;

/// How the text a plugin returns relates to the text it was given.
pub enum TransformMap {
  /// Positions are unchanged.
  Identity,
  /// Maps the returned text back to the text the plugin received.
  Generated(SourceMap),
  /// Maps the module's raw source further back to the sources it was built
  /// from. The returned text keeps the positions of the text it received.
  Upstream(SourceMap),
}

pub struct TransformOutput {
  pub code: String,
  pub map: TransformMap,
  pub commonjs: bool,
}

impl TransformOutput {
  pub fn new(code: String, map: TransformMap) -> Self {
    Self {
      code,
      map,
      commonjs: false,
    }
  }
}

pub trait Plugin: Send + Sync {
  fn get_name(&self) -> &'static str;

  /// Returns `None` when the plugin has nothing to do for `id`.
  fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>, BuildError>;
}

pub struct TransformResult {
  pub code: String,
  /// Maps `code` back to the module's original sources.
  pub map: SourceMap,
  pub commonjs: bool,
}

pub struct PluginDriver {
  plugins: Vec<Box<dyn Plugin>>,
}

impl Default for PluginDriver {
  fn default() -> Self {
    Self::new()
  }
}

impl PluginDriver {
  /// The fixed chain: JSON, TypeScript, CommonJS, then upstream source maps.
  pub fn new() -> Self {
    Self::from_plugins(vec![
      Box::new(JsonPlugin),
      Box::new(TypeScriptPlugin),
      Box::new(CommonJsPlugin),
      Box::new(SourceMapsPlugin),
    ])
  }

  pub fn from_plugins(plugins: Vec<Box<dyn Plugin>>) -> Self {
    Self { plugins }
  }

  pub fn plugin_names(&self) -> Vec<&'static str> {
    self.plugins.iter().map(|plugin| plugin.get_name()).collect()
  }

  pub fn transform(&self, raw: &str, id: &str) -> Result<TransformResult, BuildError> {
    let mut result = TransformResult {
      code: raw.to_owned(),
      map: source_map::identity(id, raw),
      commonjs: false,
    };

    for plugin in &self.plugins {
      let output = match plugin.transform(&result.code, id)? {
        Some(output) => output,
        None => continue,
      };
      log::debug!("[transform] {} rewrote {}", plugin.get_name(), id);
      result.map = match output.map {
        TransformMap::Identity => result.map,
        TransformMap::Generated(outer) => source_map::chain(&outer, &result.map),
        TransformMap::Upstream(upstream) => source_map::chain(&result.map, &upstream),
      };
      result.code = output.code;
      result.commonjs |= output.commonjs;
    }

    Ok(result)
  }
}
