//! The backend adapter interface.
//!
//! A backend turns executed instructions into effects on a runtime environment.
//! The engine only relies on the contract below; how bundles are stored and how
//! components run is up to the implementation, as is any retry policy.
//!
//! Besides the three operations, a backend records instruction results under
//! their idempotency keys so that a re-applied plan can adopt previous results
//! instead of repeating the operation. A record is only adopted while the
//! resource it names is still live, which the engine checks through
//! [`Backend::resource_uuid`].

mod state;

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TransportProtocol;
use crate::util::hash::ObjectHash;
use crate::value::Value;

pub use state::{BackendState, BundleRecord, ComponentRecord, StateBackend, StateError};

/// Request to store a file bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSpec {
  /// Path of the files on the machine running the plan.
  pub source: String,
  /// Requested artifact name; the backend picks one when absent.
  pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleHandle {
  pub name: String,
  pub uuid: String,
}

/// One exposed port of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
  pub number: u16,
  pub transport_protocol: TransportProtocol,
  pub application_protocol: Option<String>,
}

/// One directory mounted into a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMount {
  /// Artifacts copied into the directory, empty for a persistent volume.
  pub artifact_names: Vec<String>,
  pub persistent_key: Option<String>,
  pub size_bytes: i64,
}

/// Request to start a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
  pub name: String,
  pub image: String,
  pub ports: BTreeMap<String, PortBinding>,
  /// Mount path → directory.
  pub files: BTreeMap<String, DirectoryMount>,
  pub env_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHandle {
  pub name: String,
  pub uuid: String,
  pub hostname: String,
  pub ip_address: String,
}

/// The two kinds of resources a backend manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  Bundle,
  Component,
}

/// What a backend keeps for one executed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
  pub result: Value,
  /// Hash of the arguments the operation ran with, futures resolved.
  pub inputs: ObjectHash,
}

/// Errors returned by backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("{operation} failed: {message}")]
  OperationFailed { operation: String, message: String },

  #[error("bundle '{0}' already exists")]
  BundleExists(String),

  #[error("component '{0}' already exists")]
  ComponentExists(String),

  #[error("component '{0}' not found")]
  ComponentNotFound(String),
}

/// Operations the engine needs from a runtime environment.
pub trait Backend: Send + Sync {
  fn create_bundle(&self, spec: BundleSpec) -> impl Future<Output = Result<BundleHandle, BackendError>> + Send;

  fn run_component(&self, spec: ComponentSpec) -> impl Future<Output = Result<ComponentHandle, BackendError>> + Send;

  fn remove_component(&self, name: &str) -> impl Future<Output = Result<ComponentHandle, BackendError>> + Send;

  /// Uuid of the bundle or component currently known as `name`.
  fn resource_uuid(
    &self,
    kind: ResourceKind,
    name: &str,
  ) -> impl Future<Output = Result<Option<String>, BackendError>> + Send;

  /// Record previously stored under an idempotency key.
  fn recorded_result(
    &self,
    key: &ObjectHash,
  ) -> impl Future<Output = Result<Option<ExecutionRecord>, BackendError>> + Send;

  fn record_result(
    &self,
    key: &ObjectHash,
    record: &ExecutionRecord,
  ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
