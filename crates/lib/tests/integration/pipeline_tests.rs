//! Whole-pipeline behavior: idempotence, partial failure and resume, cancellation.

use enclave_lib::backend::StateBackend;
use enclave_lib::error::{ExecutionReason, InstructionRef, ValidationReason};
use enclave_lib::plan::{
  CancelToken, InstructionPlan, PipelineError, cancellation, load_plan, plan_file_name, save_plan,
};
use tempfile::TempDir;

use crate::common::{CancellingBackend, FIVE_SERVICES, WEB_STACK, apply, interpret};

fn positions(ids: impl Iterator<Item = InstructionRef>) -> Vec<usize> {
  ids.map(|id| id.position).collect()
}

#[tokio::test]
async fn second_apply_performs_no_backend_operations() {
  let backend = StateBackend::new();
  let mut first = interpret(WEB_STACK);
  let report = apply(&mut first, &backend, &backend, &CancelToken::never()).await.unwrap();
  assert!(report.is_complete());
  assert_eq!(backend.operation_calls(), 3);

  backend.reset_call_log();
  let mut second = interpret(WEB_STACK);
  let report = apply(&mut second, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert!(report.is_complete());
  assert_eq!(report.applied.len(), 3);
  assert_eq!(report.executed().count(), 0);
  assert_eq!(backend.operation_calls(), 0);
  assert_eq!(second.applied_count(), 3);
  let results = |plan: &InstructionPlan| -> Vec<_> { plan.instructions().iter().map(|i| i.result().cloned()).collect() };
  assert_eq!(results(&first), results(&second));
}

#[tokio::test]
async fn failure_stops_execution_and_resume_runs_only_the_rest() {
  let backend = StateBackend::new();
  backend.fail_on("run_component:svc-c");
  let mut plan = interpret(FIVE_SERVICES);

  let report = apply(&mut plan, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert_eq!(positions(report.applied.iter().map(|a| a.id.clone())), vec![0, 1]);
  let failed = report.failed.as_ref().unwrap();
  assert_eq!(failed.id, InstructionRef::new(2, "add_service"));
  assert!(matches!(failed.error.reason, ExecutionReason::Backend(_)));
  assert_eq!(positions(report.not_attempted.iter().map(|p| p.id.clone())), vec![3, 4]);
  assert!(report.not_attempted[0].blocked_by_failure);
  assert!(!report.not_attempted[1].blocked_by_failure);
  assert_eq!(plan.applied_count(), 2);

  backend.clear_failures();
  backend.reset_call_log();
  let report = apply(&mut plan, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert!(report.is_complete());
  assert_eq!(
    backend.call_log(),
    vec!["run_component:svc-c", "run_component:svc-d", "run_component:svc-e"]
  );
  assert_eq!(positions(report.executed().map(|a| a.id.clone())), vec![2, 3, 4]);
  assert_eq!(plan.applied_count(), 5);
}

#[tokio::test]
async fn resolved_address_reaches_the_consumer() {
  let backend = StateBackend::new();
  let mut plan = interpret(FIVE_SERVICES);
  apply(&mut plan, &backend, &backend, &CancelToken::never()).await.unwrap();

  let state = backend.snapshot();
  assert_eq!(
    state.components["svc-d"].spec.env_vars["UPSTREAM"],
    state.components["svc-c"].ip_address
  );
}

#[tokio::test]
async fn saved_plan_resumes_after_failure() {
  let temp = TempDir::new().unwrap();
  let backend = StateBackend::new();
  backend.fail_on("run_component:svc-c");
  let mut plan = interpret(FIVE_SERVICES);
  apply(&mut plan, &backend, &backend, &CancelToken::never()).await.unwrap();

  let path = temp.path().join(plan_file_name(&plan.compute_hash().unwrap()));
  save_plan(&plan, &path).unwrap();
  let state_path = temp.path().join("state.json");
  backend.save(&state_path).unwrap();

  let mut loaded = load_plan(&path).unwrap();
  assert_eq!(loaded, plan);
  assert_eq!(loaded.applied_count(), 2);

  let backend = StateBackend::load(&state_path).unwrap();
  let report = apply(&mut loaded, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert!(report.is_complete());
  assert_eq!(report.executed().count(), 3);
  assert_eq!(backend.operation_calls(), 3);
}

#[tokio::test]
async fn cancellation_lets_the_running_instruction_finish() {
  let backend = StateBackend::new();
  let (handle, token) = cancellation();
  let cancelling = CancellingBackend::new(&backend, handle, 2);
  let mut plan = interpret(FIVE_SERVICES);

  let report = apply(&mut plan, &backend, &cancelling, &token).await.unwrap();

  assert!(report.cancelled);
  assert!(report.failed.is_none());
  assert_eq!(positions(report.applied.iter().map(|a| a.id.clone())), vec![0, 1]);
  assert_eq!(positions(report.not_attempted.iter().map(|p| p.id.clone())), vec![2, 3, 4]);
  assert!(report.not_attempted.iter().all(|p| !p.blocked_by_failure));
  assert_eq!(plan.applied_count(), 2);
  assert_eq!(backend.snapshot().components.len(), 2);
}

#[tokio::test]
async fn reapplying_after_another_plan_removed_the_service_starts_it_again() {
  const ADD_WEB: &str = r#"{ "statements": [ { "call": "add_service", "args": ["web", "nginx:1.26"] } ] }"#;
  const REMOVE_WEB: &str = r#"{ "statements": [ { "call": "remove_service", "args": ["web"] } ] }"#;
  let backend = StateBackend::new();

  let mut add = interpret(ADD_WEB);
  apply(&mut add, &backend, &backend, &CancelToken::never()).await.unwrap();
  let mut remove = interpret(REMOVE_WEB);
  apply(&mut remove, &backend, &backend, &CancelToken::never()).await.unwrap();
  assert!(backend.snapshot().components.is_empty());
  backend.reset_call_log();

  let mut add_again = interpret(ADD_WEB);
  let report = apply(&mut add_again, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert!(report.is_complete());
  assert_eq!(report.executed().count(), 1);
  assert_eq!(backend.call_log(), vec!["run_component:web"]);
  assert_eq!(backend.snapshot().components["web"].spec.image, "nginx:1.26");

  backend.reset_call_log();
  let mut remove_again = interpret(REMOVE_WEB);
  let report = apply(&mut remove_again, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert!(report.is_complete());
  assert_eq!(backend.call_log(), vec!["remove_component:web"]);
  assert!(backend.snapshot().components.is_empty());
}

#[tokio::test]
async fn environment_conflicts_are_reported_before_execution() {
  let backend = StateBackend::new();
  let mut existing = interpret(r#"{ "statements": [ { "call": "add_service", "args": ["svc-a", "alpine"] } ] }"#);
  apply(&mut existing, &backend, &backend, &CancelToken::never()).await.unwrap();
  backend.reset_call_log();

  let mut plan = interpret(FIVE_SERVICES);
  let err = apply(&mut plan, &backend, &backend, &CancelToken::never()).await.unwrap_err();

  let PipelineError::Validation(errors) = err else {
    panic!("expected validation errors");
  };
  assert_eq!(errors.len(), 1);
  assert_eq!(
    errors[0].reason,
    ValidationReason::DuplicateService {
      name: "svc-a".to_string(),
      first: None,
    }
  );
  assert_eq!(backend.operation_calls(), 0);
  assert_eq!(plan.applied_count(), 0);
}

#[test]
fn plans_from_the_same_script_are_identical() {
  let first = interpret(WEB_STACK);
  let second = interpret(WEB_STACK);

  assert_eq!(first, second);
  assert_eq!(first.compute_hash().unwrap(), second.compute_hash().unwrap());
  assert_eq!(
    serde_json::to_string(&first).unwrap(),
    serde_json::to_string(&second).unwrap()
  );
  let keys = |plan: &InstructionPlan| -> Vec<_> {
    plan
      .instructions()
      .iter()
      .map(|i| i.idempotency_key().clone())
      .collect()
  };
  assert_eq!(keys(&first), keys(&second));
}
