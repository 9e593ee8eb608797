//! Script documents.
//!
//! A script is a JSON document of call nodes. It carries no grammar of its own:
//! it is the serialized form of what a script front end hands to the engine.
//!
//! ```json
//! {
//!   "statements": [
//!     { "let": "site", "value": { "call": "upload_files", "args": ["./site"] } },
//!     { "call": "add_service", "args": ["web", "nginx:1.27"],
//!       "kwargs": { "files": { "dict": { "/usr/share/nginx/html": { "$ref": "site" } } } } },
//!     { "for_each": "port", "in": [8080, 8081], "body": [ ... ] }
//!   ]
//! }
//! ```

mod interpret;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use interpret::interpret;

/// A whole script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
  pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Statement {
  ForEach(ForEach),
  Let(Let),
  Call(CallNode),
}

/// Run `body` once per element of `items`, binding the element to `var`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForEach {
  #[serde(rename = "for_each")]
  pub var: String,
  #[serde(rename = "in")]
  pub items: Expr,
  pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Let {
  #[serde(rename = "let")]
  pub name: String,
  pub value: Expr,
}

/// A call of an action or a composite type constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallNode {
  pub call: String,
  /// `null` leaves a position unset.
  #[serde(default)]
  pub args: Vec<Option<Expr>>,
  #[serde(default)]
  pub kwargs: BTreeMap<String, Expr>,
}

/// Read a bound name, optionally selecting one field of a dict value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
  #[serde(rename = "$ref")]
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictLiteral {
  pub dict: BTreeMap<String, Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
  Bool(bool),
  Int(i64),
  String(String),
  List(Vec<Expr>),
  Ref(Reference),
  Dict(DictLiteral),
  Call(CallNode),
}

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("failed to read script {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse script: {0}")]
  Parse(#[from] serde_json::Error),
}

impl Script {
  pub fn from_json(content: &str) -> Result<Self, ScriptError> {
    Ok(serde_json::from_str(content)?)
  }
}

pub fn load_script(path: &Path) -> Result<Script, ScriptError> {
  let content = fs::read_to_string(path).map_err(|source| ScriptError::Read {
    path: path.display().to_string(),
    source,
  })?;
  Script::from_json(&content)
}
