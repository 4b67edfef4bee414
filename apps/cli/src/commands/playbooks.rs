//! Playbooks command implementation.

use colored::Colorize;
use comfy_table::{Cell, Table};
use remedy_core::{PlaybookStepStore, PlaybookStore};
use serde_json::json;

use super::{Context, PlaybooksCommand};

/// Execute the playbooks command.
pub fn execute(ctx: &Context, command: PlaybooksCommand) -> anyhow::Result<()> {
    match command {
        PlaybooksCommand::List { tenant, json } => list(ctx, &tenant, json),
        PlaybooksCommand::Show { tenant, playbook_id, json } => show(ctx, &tenant, playbook_id, json),
        PlaybooksCommand::Delete { tenant, playbook_id } => delete(ctx, &tenant, playbook_id),
    }
}

fn list(ctx: &Context, tenant_id: &str, json_output: bool) -> anyhow::Result<()> {
    let mut playbooks = ctx.store.list_active(tenant_id)?;
    playbooks.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.playbook_id.cmp(&b.playbook_id)));

    if json_output {
        println!("{}", serde_json::to_string_pretty(&playbooks)?);
        return Ok(());
    }

    if playbooks.is_empty() {
        println!("{}", format!("No active playbooks for tenant {}", tenant_id).yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Version", "Priority", "Matches"]);
    for playbook in &playbooks {
        table.add_row(vec![
            Cell::new(playbook.playbook_id),
            Cell::new(&playbook.name),
            Cell::new(playbook.version),
            Cell::new(playbook.priority),
            Cell::new(playbook.conditions.to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn show(ctx: &Context, tenant_id: &str, playbook_id: i64, json_output: bool) -> anyhow::Result<()> {
    let Some(playbook) = PlaybookStore::get(ctx.store.as_ref(), tenant_id, playbook_id)? else {
        anyhow::bail!("Playbook not found: {}", playbook_id);
    };
    let steps = ctx.store.list_ordered(playbook_id)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "playbook": playbook, "steps": steps }))?);
        return Ok(());
    }

    println!("{}", format!("Playbook {}: {}", playbook.playbook_id, playbook.name).bold().cyan());
    println!("  Version:  {}", playbook.version);
    println!("  Priority: {}", playbook.priority);
    println!("  Matches:  {}", playbook.conditions);
    println!("  Active:   {}", if playbook.is_active { "yes".green() } else { "no".red() });
    println!();

    let mut table = Table::new();
    table.set_header(vec!["Step", "Name", "Action", "Params"]);
    for step in &steps {
        table.add_row(vec![
            Cell::new(step.step_order),
            Cell::new(&step.name),
            Cell::new(step.action_type.as_str()),
            Cell::new(step.params.to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn delete(ctx: &Context, tenant_id: &str, playbook_id: i64) -> anyhow::Result<()> {
    if !ctx.store.delete_playbook(tenant_id, playbook_id)? {
        anyhow::bail!("Playbook not found: {}", playbook_id);
    }
    println!("{} Deleted playbook {}", "✓".green(), playbook_id.to_string().cyan());
    Ok(())
}
