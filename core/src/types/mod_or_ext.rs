use crate::{external_module::ExternalModule, module::ModuleNode};

#[derive(Debug, Clone)]
pub enum ModOrExt {
  Mod(ModuleNode),
  Ext(ExternalModule),
}

impl std::convert::From<ExternalModule> for ModOrExt {
  fn from(ext: ExternalModule) -> Self {
    ModOrExt::Ext(ext)
  }
}

impl std::convert::From<ModuleNode> for ModOrExt {
  fn from(m: ModuleNode) -> Self {
    ModOrExt::Mod(m)
  }
}

impl ModOrExt {
  #[inline]
  pub fn is_mod(&self) -> bool {
    matches!(self, ModOrExt::Mod(_))
  }

  #[inline]
  pub fn is_ext(&self) -> bool {
    !self.is_mod()
  }

  pub fn id(&self) -> &str {
    match self {
      ModOrExt::Mod(m) => &m.id,
      ModOrExt::Ext(m) => &m.id,
    }
  }

  pub fn as_mod(&self) -> Option<&ModuleNode> {
    if let ModOrExt::Mod(m) = self {
      Some(m)
    } else {
      None
    }
  }

  pub fn as_ext(&self) -> Option<&ExternalModule> {
    if let ModOrExt::Ext(m) = self {
      Some(m)
    } else {
      None
    }
  }

  pub fn add_importer(&mut self, id: String) {
    match self {
      ModOrExt::Mod(m) => {
        m.importers.insert(id);
      }
      ModOrExt::Ext(m) => {
        m.importers.insert(id);
      }
    }
  }
}
