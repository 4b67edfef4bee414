//! Subcommand definitions.

use clap::Subcommand;

/// Playbook subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum PlaybooksCommand {
    /// List a tenant's active playbooks
    List {
        /// Tenant owning the playbooks
        #[arg(long)]
        tenant: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a playbook and its steps
    Show {
        /// Tenant owning the playbook
        #[arg(long)]
        tenant: String,

        /// Playbook identifier
        playbook_id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a playbook and its steps
    Delete {
        /// Tenant owning the playbook
        #[arg(long)]
        tenant: String,

        /// Playbook identifier
        playbook_id: i64,
    },
}

/// Exception subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ExceptionCommand {
    /// Create an unassigned exception
    Create {
        /// Tenant owning the exception
        #[arg(long)]
        tenant: String,

        /// Exception identifier
        #[arg(long)]
        id: String,

        /// Business domain
        #[arg(long)]
        domain: Option<String>,

        /// Exception type
        #[arg(long = "type")]
        exception_type: Option<String>,

        /// Severity label
        #[arg(long)]
        severity: Option<String>,
    },

    /// Replace an exception's classification
    ///
    /// The playbook assignment is left untouched; run `recalculate` to
    /// re-match against the new classification.
    Classify {
        /// Tenant owning the exception
        #[arg(long)]
        tenant: String,

        /// Exception identifier
        #[arg(long)]
        id: String,

        /// Business domain
        #[arg(long)]
        domain: Option<String>,

        /// Exception type
        #[arg(long = "type")]
        exception_type: Option<String>,

        /// Severity label
        #[arg(long)]
        severity: Option<String>,
    },
}
