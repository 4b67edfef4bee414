//! Remedy CLI - operator interface for playbook-driven exception remediation
//!
//! Provides a `remedy` command for installing playbook definitions, creating
//! exceptions and driving them through their playbook steps.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{ExceptionCommand, PlaybooksCommand};

/// Remedy CLI - playbook-driven exception remediation
#[derive(Parser, Debug)]
#[command(
    name = "remedy",
    author,
    version,
    about = "Remedy - playbook-driven exception remediation",
    long_about = "Remedy matches business exceptions to remediation playbooks and tracks their step-by-step completion.\nEvery transition is recorded in an append-only event log."
)]
struct Args {
    /// Configuration file (defaults to ./remedy.toml over ~/.remedy/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install playbook definitions
    ///
    /// Accepts a single YAML file or a directory; every *.yaml and *.yml file
    /// in a directory is installed in path order.
    Load {
        /// Definition file or directory
        path: PathBuf,
    },

    /// Manage playbooks
    #[command(subcommand)]
    Playbooks(PlaybooksCommand),

    /// Manage exceptions
    #[command(subcommand)]
    Exception(ExceptionCommand),

    /// Re-run playbook matching for an exception
    ///
    /// Assigns the best matching playbook and restarts it at step 1, or
    /// clears the assignment when nothing matches.
    Recalculate {
        /// Tenant owning the exception
        #[arg(long)]
        tenant: String,

        /// Exception identifier
        exception: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an exception's progress through its playbook
    Status {
        /// Tenant owning the exception
        #[arg(long)]
        tenant: String,

        /// Exception identifier
        exception: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Complete the current step of an exception's playbook
    Complete {
        /// Tenant owning the exception
        #[arg(long)]
        tenant: String,

        /// Exception identifier
        exception: String,

        /// Step order being completed
        #[arg(allow_negative_numbers = true)]
        step: i64,

        /// Actor type (human, agent, system)
        #[arg(long)]
        actor_type: String,

        /// Actor identifier
        #[arg(long)]
        actor_id: String,

        /// Free-form notes recorded with the completion
        #[arg(long)]
        notes: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an exception's event log
    Events {
        /// Tenant owning the exception
        #[arg(long)]
        tenant: String,

        /// Exception identifier
        exception: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let cli_config = config::load_config(args.config.as_deref(), args.db)?;
    let level = args
        .log_level
        .or_else(|| cli_config.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    init_logging(&level)?;

    let ctx = commands::Context::open(cli_config)?;

    match args.command {
        Command::Load { path } => commands::load::execute(&ctx, &path),
        Command::Playbooks(command) => commands::playbooks::execute(&ctx, command),
        Command::Exception(command) => commands::exception::execute(&ctx, command),
        Command::Recalculate { tenant, exception, json } => {
            commands::step::recalculate(&ctx, &tenant, &exception, json)
        }
        Command::Status { tenant, exception, json } => {
            commands::status::status(&ctx, &tenant, &exception, json)
        }
        Command::Complete { tenant, exception, step, actor_type, actor_id, notes, json } => {
            commands::step::complete(
                &ctx,
                &tenant,
                &exception,
                step,
                &actor_type,
                &actor_id,
                notes.as_deref(),
                json,
            )
        }
        Command::Events { tenant, exception, json } => {
            commands::status::events(&ctx, &tenant, &exception, json)
        }
    }
}
