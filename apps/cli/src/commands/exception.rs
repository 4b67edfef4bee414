//! Exception command implementation.

use colored::Colorize;
use remedy_core::{Classification, Exception, ExceptionStore};

use super::{Context, ExceptionCommand};

/// Execute the exception command.
pub fn execute(ctx: &Context, command: ExceptionCommand) -> anyhow::Result<()> {
    match command {
        ExceptionCommand::Create { tenant, id, domain, exception_type, severity } => {
            let classification = Classification { domain, exception_type, severity };
            create(ctx, &tenant, &id, classification)
        }
        ExceptionCommand::Classify { tenant, id, domain, exception_type, severity } => {
            let classification = Classification { domain, exception_type, severity };
            classify(ctx, &tenant, &id, &classification)
        }
    }
}

fn create(
    ctx: &Context,
    tenant_id: &str,
    exception_id: &str,
    classification: Classification,
) -> anyhow::Result<()> {
    let exception = Exception::new(tenant_id, exception_id, classification);
    ctx.store.insert_exception(&exception)?;

    println!(
        "{} Created exception {} for tenant {}",
        "✓".green(),
        exception.exception_id.cyan(),
        exception.tenant_id
    );
    println!("  Classification: {}", exception.classification);
    Ok(())
}

fn classify(
    ctx: &Context,
    tenant_id: &str,
    exception_id: &str,
    classification: &Classification,
) -> anyhow::Result<()> {
    let exception = ctx.store.update_classification(tenant_id, exception_id, classification)?;

    println!("{} Reclassified exception {}", "✓".green(), exception.exception_id.cyan());
    println!("  Classification: {}", exception.classification);
    println!("  Playbook:       {}", exception.pointer);
    println!();
    println!("Run {} to re-match playbooks.", format!("remedy recalculate --tenant {} {}", tenant_id, exception_id).bold());
    Ok(())
}
