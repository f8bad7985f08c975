mod normalized_input_options;
pub use normalized_input_options::*;
mod normalized_output_options;
pub use normalized_output_options::*;
mod bundle_config;
pub use bundle_config::*;
mod mod_or_ext;
pub use mod_or_ext::*;

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct ResolvedId {
  pub id: String,
  pub external: bool,
}

impl ResolvedId {
  pub fn new(id: impl Into<String>, external: bool) -> Self {
    Self {
      id: id.into(),
      external,
    }
  }

  /// Ids of generated modules that have no file behind them.
  pub fn is_virtual(&self) -> bool {
    is_virtual_id(&self.id)
  }
}

pub const EMPTY_MODULE_PREFIX: &str = "\0empty:";

pub fn is_virtual_id(id: &str) -> bool {
  id.starts_with('\0')
}
