//! In-process state backend.
//!
//! Records bundles, components and idempotency records without performing any
//! physical work. Names, uuids and IP addresses are derived from a counter so
//! runs are reproducible. The state can be persisted as JSON between runs.
//!
//! Every operation call is logged as `<operation>:<target>`, and failures can be
//! injected for a given call label.
//!
//! # Example State File
//!
//! ```json
//! {
//!   "bundles": { "site": { "uuid": "3fa9…", "source": "./site" } },
//!   "components": { "web": { "uuid": "9c1e…", "image": "nginx", "ip_address": "10.0.0.2", … } },
//!   "records": { "a1b2c3d4e5f6789012ab": { "result": { "dict": { … } }, "inputs": "5e0c…" } },
//!   "next_id": 3
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::instruction::ActionKind;
use crate::instruction::actions::{result_name, result_uuid};
use crate::plan::{InstructionPlan, ValidationEnvironment};
use crate::util::hash::ObjectHash;

use super::{
  Backend, BackendError, BundleHandle, BundleSpec, ComponentHandle, ComponentSpec, ExecutionRecord, ResourceKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
  pub uuid: String,
  pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
  pub uuid: String,
  pub hostname: String,
  pub ip_address: String,
  pub spec: ComponentSpec,
}

/// Everything the backend knows about the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendState {
  pub bundles: BTreeMap<String, BundleRecord>,
  pub components: BTreeMap<String, ComponentRecord>,
  /// Idempotency key → recorded instruction result.
  pub records: BTreeMap<String, ExecutionRecord>,
  next_id: u64,
}

impl BackendState {
  fn allocate(&mut self) -> (u64, String) {
    self.next_id += 1;
    let digest = Sha256::digest(format!("{}:{}", crate::consts::APP_NAME, self.next_id).as_bytes());
    (self.next_id, hex::encode(&digest[..16]))
  }

  fn resource_uuid(&self, kind: ResourceKind, name: &str) -> Option<&str> {
    match kind {
      ResourceKind::Bundle => self.bundles.get(name).map(|bundle| bundle.uuid.as_str()),
      ResourceKind::Component => self.components.get(name).map(|component| component.uuid.as_str()),
    }
  }
}

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read backend state: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write backend state: {0}")]
  Write(#[source] io::Error),

  #[error("failed to create backend state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to parse backend state: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize backend state: {0}")]
  Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct StateBackend {
  state: Mutex<BackendState>,
  calls: Mutex<Vec<String>>,
  failures: Mutex<BTreeSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StateBackend {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_state(state: BackendState) -> Self {
    Self {
      state: Mutex::new(state),
      ..Default::default()
    }
  }

  /// Load state from `path`. A missing file yields an empty backend.
  pub fn load(path: &Path) -> Result<Self, StateError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no backend state file, starting empty");
        return Ok(Self::new());
      }
      Err(e) => return Err(StateError::Read(e)),
    };
    let state: BackendState = serde_json::from_str(&content).map_err(StateError::Parse)?;
    info!(
      path = %path.display(),
      bundles = state.bundles.len(),
      components = state.components.len(),
      records = state.records.len(),
      "backend state loaded"
    );
    Ok(Self::from_state(state))
  }

  /// Persist state to `path` atomically.
  pub fn save(&self, path: &Path) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(StateError::CreateDir)?;
    }
    let content = serde_json::to_string_pretty(&*lock(&self.state)).map_err(StateError::Serialize)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content).map_err(StateError::Write)?;
    fs::rename(&temp_path, path).map_err(StateError::Write)?;
    info!(path = %path.display(), "backend state saved");
    Ok(())
  }

  pub fn snapshot(&self) -> BackendState {
    lock(&self.state).clone()
  }

  /// What currently exists, as seen by validation.
  pub fn environment(&self) -> ValidationEnvironment {
    let state = lock(&self.state);
    ValidationEnvironment {
      artifacts: state.bundles.keys().cloned().collect(),
      services: state.components.keys().cloned().collect(),
    }
  }

  /// The environment as it was before `plan` started applying.
  ///
  /// The recorded effects of `plan` are undone in reverse order: resources its
  /// instructions created are left out and services they removed are put back,
  /// so a partially or fully applied plan validates again on re-apply. Records
  /// whose effect no longer holds, because something outside the plan changed the
  /// resource since, are ignored.
  pub fn environment_for(&self, plan: &InstructionPlan) -> ValidationEnvironment {
    let mut env = self.environment();
    let state = lock(&self.state);
    for instruction in plan.instructions().iter().rev() {
      let Some(record) = state.records.get(&instruction.idempotency_key().0) else {
        continue;
      };
      let Some(name) = result_name(&record.result) else {
        continue;
      };
      let kind = instruction.kind();
      let live = state.resource_uuid(kind.resource(), name);
      let recreated = plan
        .recreated_after(instruction.position(), kind.resource(), name)
        .and_then(|later| state.records.get(&later.idempotency_key().0))
        .and_then(|later| result_uuid(&later.result));
      if !kind.record_holds(&record.result, live, recreated) {
        debug!(instruction = %instruction.id(), resource = name, "recorded effect no longer holds");
        continue;
      }
      match kind {
        ActionKind::UploadFiles => {
          env.artifacts.remove(name);
        }
        ActionKind::AddService => {
          env.services.remove(name);
        }
        ActionKind::RemoveService => {
          env.services.insert(name.to_string());
        }
      }
    }
    env
  }

  /// Operation calls made so far, as `<operation>:<target>` labels.
  pub fn call_log(&self) -> Vec<String> {
    lock(&self.calls).clone()
  }

  pub fn operation_calls(&self) -> usize {
    lock(&self.calls).len()
  }

  pub fn reset_call_log(&self) {
    lock(&self.calls).clear();
  }

  /// Make the call labelled `label` fail until [`StateBackend::clear_failures`].
  pub fn fail_on(&self, label: impl Into<String>) {
    lock(&self.failures).insert(label.into());
  }

  pub fn clear_failures(&self) {
    lock(&self.failures).clear();
  }

  /// Drop every recorded result, as if the backend lost track of past runs.
  pub fn forget_records(&self) {
    lock(&self.state).records.clear();
  }

  fn enter(&self, operation: &str, target: &str) -> Result<(), BackendError> {
    let label = format!("{}:{}", operation, target);
    debug!(call = %label, "backend operation");
    lock(&self.calls).push(label.clone());
    if lock(&self.failures).contains(&label) {
      return Err(BackendError::OperationFailed {
        operation: operation.to_string(),
        message: format!("injected failure for {}", target),
      });
    }
    Ok(())
  }
}

impl Backend for StateBackend {
  async fn create_bundle(&self, spec: BundleSpec) -> Result<BundleHandle, BackendError> {
    let target = spec.name.clone().unwrap_or_else(|| spec.source.clone());
    self.enter("create_bundle", &target)?;

    let mut state = lock(&self.state);
    let (_, uuid) = state.allocate();
    let name = spec.name.unwrap_or_else(|| format!("artifact-{}", &uuid[..8]));
    if state.bundles.contains_key(&name) {
      return Err(BackendError::BundleExists(name));
    }
    state.bundles.insert(
      name.clone(),
      BundleRecord {
        uuid: uuid.clone(),
        source: spec.source,
      },
    );
    Ok(BundleHandle { name, uuid })
  }

  async fn run_component(&self, spec: ComponentSpec) -> Result<ComponentHandle, BackendError> {
    self.enter("run_component", &spec.name)?;

    let mut state = lock(&self.state);
    if state.components.contains_key(&spec.name) {
      return Err(BackendError::ComponentExists(spec.name));
    }
    let (id, uuid) = state.allocate();
    let ip_address = format!("10.0.{}.{}", (id / 254) % 256, id % 254 + 1);
    let handle = ComponentHandle {
      name: spec.name.clone(),
      uuid: uuid.clone(),
      hostname: spec.name.clone(),
      ip_address: ip_address.clone(),
    };
    state.components.insert(
      spec.name.clone(),
      ComponentRecord {
        uuid,
        hostname: spec.name.clone(),
        ip_address,
        spec,
      },
    );
    Ok(handle)
  }

  async fn remove_component(&self, name: &str) -> Result<ComponentHandle, BackendError> {
    self.enter("remove_component", name)?;

    let record = lock(&self.state)
      .components
      .remove(name)
      .ok_or_else(|| BackendError::ComponentNotFound(name.to_string()))?;
    Ok(ComponentHandle {
      name: name.to_string(),
      uuid: record.uuid,
      hostname: record.hostname,
      ip_address: record.ip_address,
    })
  }

  async fn resource_uuid(&self, kind: ResourceKind, name: &str) -> Result<Option<String>, BackendError> {
    Ok(lock(&self.state).resource_uuid(kind, name).map(str::to_string))
  }

  async fn recorded_result(&self, key: &ObjectHash) -> Result<Option<ExecutionRecord>, BackendError> {
    Ok(lock(&self.state).records.get(&key.0).cloned())
  }

  async fn record_result(&self, key: &ObjectHash, record: &ExecutionRecord) -> Result<(), BackendError> {
    lock(&self.state).records.insert(key.0.clone(), record.clone());
    Ok(())
  }
}
