//! CLI output formatting utilities.
//!
//! Colored status lines, byte formatting and the rendering of execution reports.

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use enclave_lib::plan::ExecutionReport;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const REUSED: &str = "=";
  pub const BLOCKED: &str = "⊘";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_bytes(bytes: i64) -> String {
  const KB: i64 = 1024;
  const MB: i64 = KB * 1024;
  const GB: i64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Print the applied / failed / not-attempted partition of a run.
pub fn print_report(report: &ExecutionReport) {
  for applied in &report.applied {
    if applied.reused {
      println!(
        "  {} {} {}",
        symbols::REUSED.if_supports_color(Stream::Stdout, |s| s.dimmed()),
        applied.id,
        "(already applied)".if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    } else {
      println!(
        "  {} {}",
        symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
        applied.id
      );
    }
  }

  if let Some(failed) = &report.failed {
    println!(
      "  {} {}: {}",
      symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
      failed.id,
      failed.error
    );
  }

  for pending in &report.not_attempted {
    let (symbol, note) = if pending.blocked_by_failure {
      (symbols::BLOCKED, "(blocked by failure)")
    } else {
      (symbols::INFO, "(not attempted)")
    };
    println!(
      "  {} {} {}",
      symbol.if_supports_color(Stream::Stdout, |s| s.yellow()),
      pending.id,
      note.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
}
