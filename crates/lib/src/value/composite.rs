use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Value;

/// The closed set of composite types the engine ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompositeKind {
  Directory,
  PortSpec,
}

impl CompositeKind {
  pub const ALL: [CompositeKind; 2] = [CompositeKind::Directory, CompositeKind::PortSpec];

  /// Name of the type as written in scripts.
  pub fn name(self) -> &'static str {
    match self {
      CompositeKind::Directory => "Directory",
      CompositeKind::PortSpec => "PortSpec",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.name() == name)
  }
}

/// An instance of a composite type: a kind tag and the attributes that were set.
///
/// Attributes that were not passed to the constructor are absent from the map;
/// typed accessors on the concrete types decide what absence means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeValue {
  kind: CompositeKind,
  attributes: BTreeMap<String, Value>,
}

impl CompositeValue {
  pub fn new(kind: CompositeKind, attributes: BTreeMap<String, Value>) -> Self {
    Self { kind, attributes }
  }

  pub fn kind(&self) -> CompositeKind {
    self.kind
  }

  pub fn attributes(&self) -> &BTreeMap<String, Value> {
    &self.attributes
  }

  pub fn attribute(&self, name: &str) -> Option<&Value> {
    self.attributes.get(name)
  }

  /// Set an attribute, returning the previous value.
  pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
    self.attributes.insert(name.into(), value)
  }

  pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
    self.attributes.remove(name)
  }

  /// Deep copy into a new instance of the same kind.
  pub fn copy(&self) -> Self {
    Self {
      kind: self.kind,
      attributes: self.attributes.iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect(),
    }
  }
}

impl fmt::Display for CompositeValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}(", self.kind.name())?;
    for (i, (name, value)) in self.attributes.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}={}", name, value)?;
    }
    write!(f, ")")
  }
}
