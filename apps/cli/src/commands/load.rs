//! Load command implementation.
//!
//! Installs playbook definitions from a YAML file or directory.

use std::path::Path;

use colored::Colorize;
use remedy_core::DefinitionLoader;

use super::Context;

/// Execute the load command.
pub fn execute(ctx: &Context, path: &Path) -> anyhow::Result<()> {
    let definitions = DefinitionLoader::load_path(path)?;

    if definitions.is_empty() {
        println!("{}", format!("No playbook definitions found in {}", path.display()).yellow());
        return Ok(());
    }

    for definition in &definitions {
        let playbook = DefinitionLoader::install(definition, ctx.store.as_ref())?;
        println!(
            "{} Installed playbook {} '{}' v{} for tenant {} ({} steps)",
            "✓".green(),
            playbook.playbook_id.to_string().cyan(),
            playbook.name,
            playbook.version,
            playbook.tenant_id,
            definition.steps.len()
        );
    }

    println!();
    println!("{}", format!("Installed {} playbook(s)", definitions.len()).bold().green());
    Ok(())
}
