use std::{collections::BTreeSet, hash::Hash};

/// A module left to the host module system. It is a leaf of the graph.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ExternalModule {
  pub id: String,
  pub importers: BTreeSet<String>,
}

impl ExternalModule {
  pub fn new(id: String) -> Self {
    ExternalModule {
      id,
      importers: BTreeSet::default(),
    }
  }
}

impl Hash for ExternalModule {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    state.write(self.id.as_bytes());
  }
}
