//! Status command implementation.
//!
//! Displays the bundles and components recorded by the local state backend.

use anyhow::Result;

use super::load_backend;
use crate::output::{self, format_bytes, print_info, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_status(verbose: bool, json: bool) -> Result<()> {
  let state = load_backend()?.snapshot();

  if json {
    return print_json(&state);
  }

  if state.bundles.is_empty() && state.components.is_empty() {
    print_info("Nothing recorded yet. Run 'enclave apply' to create an environment.");
    return Ok(());
  }

  print_success("Environment");
  print_stat("Bundles", &state.bundles.len().to_string());
  print_stat("Components", &state.components.len().to_string());
  print_stat("Recorded results", &state.records.len().to_string());

  if !state.bundles.is_empty() {
    println!();
    println!("Bundles:");
    for (name, bundle) in &state.bundles {
      println!(
        "  {} {} ({}) from {}",
        output::symbols::INFO,
        name,
        truncate_hash(&bundle.uuid),
        bundle.source
      );
    }
  }

  if !state.components.is_empty() {
    println!();
    println!("Components:");
    for (name, component) in &state.components {
      println!(
        "  {} {} {} {} ({})",
        output::symbols::INFO,
        name,
        component.spec.image,
        component.ip_address,
        component.hostname
      );

      if verbose {
        for (port_name, port) in &component.spec.ports {
          println!("      port {}: {}/{}", port_name, port.number, port.transport_protocol);
        }
        for (mount, directory) in &component.spec.files {
          match &directory.persistent_key {
            Some(key) => println!(
              "      {}: persistent '{}' ({})",
              mount,
              key,
              format_bytes(directory.size_bytes)
            ),
            None => println!("      {}: {}", mount, directory.artifact_names.join(", ")),
          }
        }
      }
    }
  }

  Ok(())
}
