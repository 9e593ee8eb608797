//! Dry-run rendering of a plan.

use std::fmt::Write;

use super::InstructionPlan;

/// Render the ordered instruction list, one block per instruction:
///
/// ```text
/// #0 upload_files(src="./site") -> {{future:0:name}}
/// #1 add_service(name="web", image="nginx", files={"/srv": Directory(artifact_names={{future:0:name}})}) -> {...}
///    needs: #0
/// ```
pub fn render_summary(plan: &InstructionPlan) -> String {
  let mut out = String::new();
  for instruction in plan.instructions() {
    let arguments = instruction
      .arguments()
      .iter()
      .filter(|arg| arg.found)
      .map(|arg| format!("{}={}", arg.name, arg.value))
      .collect::<Vec<_>>()
      .join(", ");
    let marker = if instruction.is_applied() { " [applied]" } else { "" };
    let _ = writeln!(
      out,
      "{}({}) -> {}{}",
      instruction.id(),
      arguments,
      instruction.returns(),
      marker
    );

    let dependencies = instruction.dependencies();
    if !dependencies.is_empty() {
      let needs = dependencies
        .iter()
        .map(|position| format!("#{}", position))
        .collect::<Vec<_>>()
        .join(", ");
      let _ = writeln!(out, "   needs: {}", needs);
    }
  }
  out
}
