//! Status and events command implementations.

use colored::Colorize;
use comfy_table::{Cell, Table};
use remedy_core::{StatusProjection, StepStatus};

use super::{Context, engine_error};

/// Show an exception's progress through its playbook.
pub fn status(
    ctx: &Context,
    tenant_id: &str,
    exception_id: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    let status = ctx.engine.get_status(tenant_id, exception_id).map_err(engine_error)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        display_status(&status);
    }
    Ok(())
}

/// Render a status projection for humans.
pub fn display_status(status: &StatusProjection) {
    println!("{}", format!("Exception: {}", status.exception_id).bold().cyan());

    let Some(playbook_id) = status.playbook_id else {
        println!("  Playbook: {}", "none assigned".yellow());
        return;
    };

    match &status.playbook_name {
        Some(name) => println!(
            "  Playbook: {} '{}' v{}",
            playbook_id,
            name,
            status.playbook_version.unwrap_or_default()
        ),
        None => println!("  Playbook: {} {}", playbook_id, "(no longer available)".red()),
    }
    if let Some(conditions) = &status.conditions {
        println!("  Matches:  {} (priority {})", conditions, status.priority.unwrap_or_default());
    }

    let current = status.current();
    let progress = if status.is_completed {
        "completed".green().to_string()
    } else {
        match (current, status.current_step) {
            (Some(step), _) => {
                format!("step {} of {} ({})", step.step_order, status.total_steps, step.name)
            }
            (None, Some(step)) => format!("step {} of {}", step, status.total_steps),
            (None, None) => "unknown".yellow().to_string(),
        }
    };
    println!("  Progress: {}", progress);

    if status.steps.is_empty() {
        return;
    }

    println!();
    let mut table = Table::new();
    table.set_header(vec!["Step", "Name", "Action", "Status"]);
    for step in &status.steps {
        let is_current = current.is_some_and(|c| c.step_order == step.step_order);
        let marker = if is_current { "→ " } else { "" };
        let state = match step.status {
            StepStatus::Completed => "completed".green().to_string(),
            StepStatus::Pending => "pending".to_string(),
        };
        table.add_row(vec![
            Cell::new(format!("{}{}", marker, step.step_order)),
            Cell::new(&step.name),
            Cell::new(step.action_type.as_str()),
            Cell::new(state),
        ]);
    }
    println!("{}", table);
}

/// Show an exception's event log.
pub fn events(
    ctx: &Context,
    tenant_id: &str,
    exception_id: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    let events = ctx.engine.events(tenant_id, exception_id).map_err(engine_error)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("{}", format!("No events recorded for exception {}", exception_id).yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Event", "Actor", "Playbook", "Step", "At"]);
    for event in &events {
        table.add_row(vec![
            Cell::new(event.sequence),
            Cell::new(event.event_type.as_str()),
            Cell::new(format!("{}:{}", event.actor_type, event.actor_id)),
            Cell::new(event.playbook_id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::new(event.step_order.map(|s| s.to_string()).unwrap_or_default()),
            Cell::new(event.created_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{}", table);
    println!("{} event(s)", events.len());
    Ok(())
}
