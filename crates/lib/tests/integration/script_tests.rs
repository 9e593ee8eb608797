//! Script-level behavior: error batching, future misuse and constructor parity.

use enclave_lib::backend::StateBackend;
use enclave_lib::error::{InterpretationReason, ValidationReason, ValueError};
use enclave_lib::plan::{CancelToken, PipelineError, ValidationEnvironment, prepare, render_summary};
use enclave_lib::script;

use crate::common::{apply, interpret, parse};

#[test]
fn future_in_concrete_only_argument_names_reference_and_origin() {
  let errors = script::interpret(&parse(
    r#"{ "statements": [
      { "let": "db", "value": { "call": "add_service", "args": ["db", "postgres"] } },
      { "call": "PortSpec", "kwargs": { "number": { "$ref": "db", "field": "ip_address" } } }
    ] }"#,
  ))
  .unwrap_err();

  assert_eq!(errors.len(), 1);
  let InterpretationReason::Value(ValueError::UnresolvedFuture { reference, origin }) = &errors[0].reason else {
    panic!("unexpected reason: {}", errors[0].reason);
  };
  assert_eq!(reference, "{{future:0:ip_address}}");
  assert_eq!(origin.position, 0);
  assert_eq!(origin.action, "add_service");
  let message = errors[0].to_string();
  assert!(message.contains("{{future:0:ip_address}}"));
  assert!(message.contains("#0 add_service"));
}

#[test]
fn validation_errors_are_batched() {
  let script = parse(
    r#"{ "statements": [
      { "call": "remove_service", "args": ["ghost"] },
      { "call": "add_service", "args": ["web", "nginx"] },
      { "call": "add_service", "args": ["web", "nginx"] },
      { "call": "upload_files", "args": ["./a"], "kwargs": { "name": "shared" } },
      { "call": "add_service", "args": ["api", "api:1"], "kwargs": { "files": { "dict": {
        "/data": { "call": "Directory", "kwargs": { "persistent_key": "vol" } },
        "/more": { "call": "Directory", "kwargs": { "persistent_key": "vol" } }
      } } } }
    ] }"#,
  );
  let env = ValidationEnvironment {
    artifacts: ["shared".to_string()].into(),
    ..Default::default()
  };

  let Err(PipelineError::Validation(errors)) = prepare(&script, &env) else {
    panic!("expected validation errors");
  };

  let reasons: Vec<_> = errors.iter().map(|e| e.reason.clone()).collect();
  assert_eq!(reasons.len(), 4);
  assert!(reasons.contains(&ValidationReason::UnknownService("ghost".to_string())));
  assert!(reasons.iter().any(|r| matches!(r, ValidationReason::DuplicateService { name, first: Some(_) } if name == "web")));
  assert!(reasons.iter().any(|r| matches!(r, ValidationReason::DuplicateArtifact { name, first: None } if name == "shared")));
  assert!(reasons.iter().any(|r| matches!(r, ValidationReason::DuplicatePersistentKey { key, .. } if key == "vol")));
}

#[test]
fn artifact_name_shorthand_matches_directory_constructor() {
  let shorthand = interpret(
    r#"{ "statements": [
      { "call": "upload_files", "args": ["./site"], "kwargs": { "name": "site" } },
      { "call": "add_service", "args": ["web", "nginx"], "kwargs": { "files": { "dict": { "/srv": "site" } } } }
    ] }"#,
  );
  let explicit = interpret(
    r#"{ "statements": [
      { "call": "upload_files", "args": ["./site"], "kwargs": { "name": "site" } },
      { "call": "add_service", "args": ["web", "nginx"], "kwargs": { "files": { "dict": {
        "/srv": { "call": "Directory", "kwargs": { "artifact_names": "site" } }
      } } } }
    ] }"#,
  );

  assert_eq!(shorthand.instructions()[1].arguments(), explicit.instructions()[1].arguments());
  assert_eq!(
    shorthand.instructions()[1].idempotency_key(),
    explicit.instructions()[1].idempotency_key()
  );
}

#[test]
fn for_each_stages_one_service_per_item() {
  let plan = interpret(
    r#"{ "statements": [
      { "let": "data", "value": { "call": "Directory", "kwargs": { "persistent_key": "shared" } } },
      { "for_each": "name", "in": ["a", "b"], "body": [
        { "call": "add_service", "args": [{ "$ref": "name" }, "busybox"], "kwargs": {
          "files": { "dict": { "/data": { "call": "Directory", "kwargs": { "persistent_key": { "$ref": "name" } } } } } } }
      ] }
    ] }"#,
  );

  assert_eq!(plan.len(), 2);
  let summary = render_summary(&plan);
  assert!(summary.contains("persistent_key=\"a\""));
  assert!(summary.contains("persistent_key=\"b\""));
  assert_eq!(plan.value("data").unwrap().to_string(), "Directory(persistent_key=\"shared\")");
}

#[tokio::test]
async fn removed_service_can_be_added_again_later_in_the_plan() {
  let backend = StateBackend::new();
  let mut setup = interpret(r#"{ "statements": [ { "call": "add_service", "args": ["web", "nginx:1.26"] } ] }"#);
  apply(&mut setup, &backend, &backend, &CancelToken::never()).await.unwrap();

  let mut upgrade = interpret(
    r#"{ "statements": [
      { "call": "remove_service", "args": ["web"] },
      { "call": "add_service", "args": ["web", "nginx:1.27"] }
    ] }"#,
  );
  let report = apply(&mut upgrade, &backend, &backend, &CancelToken::never()).await.unwrap();

  assert!(report.is_complete());
  assert_eq!(backend.snapshot().components["web"].spec.image, "nginx:1.27");

  backend.reset_call_log();
  let mut again = interpret(
    r#"{ "statements": [
      { "call": "remove_service", "args": ["web"] },
      { "call": "add_service", "args": ["web", "nginx:1.27"] }
    ] }"#,
  );
  let report = apply(&mut again, &backend, &backend, &CancelToken::never()).await.unwrap();
  assert_eq!(report.executed().count(), 0);
  assert_eq!(backend.operation_calls(), 0);
}
