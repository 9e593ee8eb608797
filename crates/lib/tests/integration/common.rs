//! Shared test helpers for library integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use enclave_lib::backend::{
  Backend, BackendError, BundleHandle, BundleSpec, ComponentHandle, ComponentSpec, ExecutionRecord, ResourceKind,
  StateBackend,
};
use enclave_lib::plan::{self, CancelHandle, CancelToken, ExecutionReport, InstructionPlan, PipelineError};
use enclave_lib::script::{self, Script};
use enclave_lib::util::hash::ObjectHash;

pub fn parse(json: &str) -> Script {
  Script::from_json(json).unwrap_or_else(|e| panic!("invalid test script: {}", e))
}

/// Interpret a script that is expected to be valid.
pub fn interpret(json: &str) -> InstructionPlan {
  script::interpret(&parse(json)).unwrap_or_else(|errors| panic!("interpretation failed: {:?}", errors))
}

/// Validate against what the backend holds, then execute.
pub async fn apply<B: Backend>(
  plan: &mut InstructionPlan,
  state: &StateBackend,
  backend: &B,
  cancel: &CancelToken,
) -> Result<ExecutionReport, PipelineError> {
  let env = state.environment_for(plan);
  plan::apply(plan, &env, backend, cancel).await
}

/// Five services; `svc-d` reads the address of `svc-c`.
pub const FIVE_SERVICES: &str = r#"{ "statements": [
  { "call": "add_service", "args": ["svc-a", "busybox"] },
  { "call": "add_service", "args": ["svc-b", "busybox"] },
  { "let": "c", "value": { "call": "add_service", "args": ["svc-c", "busybox"] } },
  { "call": "add_service", "args": ["svc-d", "busybox"], "kwargs": {
    "env_vars": { "dict": { "UPSTREAM": { "$ref": "c", "field": "ip_address" } } } } },
  { "call": "add_service", "args": ["svc-e", "busybox"] }
] }"#;

/// A site bundle served by nginx, with a database whose address the web tier reads.
pub const WEB_STACK: &str = r#"{ "statements": [
  { "let": "site", "value": { "call": "upload_files", "args": ["./site"] } },
  { "let": "db", "value": { "call": "add_service", "args": ["db", "postgres:16"], "kwargs": {
    "files": { "dict": { "/var/lib/postgresql/data": { "call": "Directory", "kwargs": { "persistent_key": "pgdata" } } } }
  } } },
  { "call": "add_service", "args": ["web", "nginx:1.27"], "kwargs": {
    "ports": { "dict": { "http": { "call": "PortSpec", "args": [80], "kwargs": { "application_protocol": "http" } } } },
    "files": { "dict": { "/usr/share/nginx/html": { "$ref": "site" } } },
    "env_vars": { "dict": { "DB_HOST": { "$ref": "db", "field": "ip_address" } } }
  } }
] }"#;

/// Wraps a [`StateBackend`] and requests cancellation once `after` components
/// have been started.
pub struct CancellingBackend<'a> {
  pub inner: &'a StateBackend,
  pub handle: CancelHandle,
  pub after: usize,
  started: AtomicUsize,
}

impl<'a> CancellingBackend<'a> {
  pub fn new(inner: &'a StateBackend, handle: CancelHandle, after: usize) -> Self {
    Self {
      inner,
      handle,
      after,
      started: AtomicUsize::new(0),
    }
  }
}

impl Backend for CancellingBackend<'_> {
  async fn create_bundle(&self, spec: BundleSpec) -> Result<BundleHandle, BackendError> {
    self.inner.create_bundle(spec).await
  }

  async fn run_component(&self, spec: ComponentSpec) -> Result<ComponentHandle, BackendError> {
    let result = self.inner.run_component(spec).await;
    if self.started.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
      self.handle.cancel();
    }
    result
  }

  async fn remove_component(&self, name: &str) -> Result<ComponentHandle, BackendError> {
    self.inner.remove_component(name).await
  }

  async fn resource_uuid(&self, kind: ResourceKind, name: &str) -> Result<Option<String>, BackendError> {
    self.inner.resource_uuid(kind, name).await
  }

  async fn recorded_result(&self, key: &ObjectHash) -> Result<Option<ExecutionRecord>, BackendError> {
    self.inner.recorded_result(key).await
  }

  async fn record_result(&self, key: &ObjectHash, record: &ExecutionRecord) -> Result<(), BackendError> {
    self.inner.record_result(key, record).await
  }
}
