//! Recalculate and complete command implementations.

use colored::Colorize;

use super::{Context, engine_error, status::display_status};

/// Re-run playbook matching for an exception.
pub fn recalculate(
    ctx: &Context,
    tenant_id: &str,
    exception_id: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    let result = ctx.engine.recalculate(tenant_id, exception_id).map_err(engine_error)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result.playbook_id {
        Some(playbook_id) => println!(
            "{} Assigned playbook {} to exception {} (step 1)",
            "✓".green(),
            playbook_id.to_string().cyan(),
            result.exception_id.cyan()
        ),
        None => println!(
            "{} No playbook matched exception {}",
            "•".yellow(),
            result.exception_id.cyan()
        ),
    }
    println!("  {}", result.reasoning.dimmed());
    Ok(())
}

/// Complete the current step of an exception's playbook.
#[allow(clippy::too_many_arguments)]
pub fn complete(
    ctx: &Context,
    tenant_id: &str,
    exception_id: &str,
    step_order: i64,
    actor_type: &str,
    actor_id: &str,
    notes: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let status = ctx
        .engine
        .complete_step(tenant_id, exception_id, step_order, actor_type, actor_id, notes)
        .map_err(engine_error)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} Step {} of exception {} completed by {} {}",
        "✓".green(),
        step_order,
        exception_id.cyan(),
        actor_type,
        actor_id
    );
    if status.is_completed {
        println!("{}", "Playbook completed".bold().green());
    }
    println!();
    display_status(&status);
    Ok(())
}
