//! Playbook selection.
//!
//! Selection is a pure function of the candidate playbooks and the
//! classification: among active playbooks of the tenant whose predicate
//! matches, the highest priority wins and ties go to the lowest id.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::models::{Classification, Playbook};
use crate::storage::{PlaybookStore, StorageResult};

/// Selects the playbook for a classification.
///
/// Playbooks of other tenants and inactive playbooks are ignored even when
/// present in `playbooks`. Returns `None` when nothing matches.
pub fn find_matching_playbook<'a>(
    playbooks: &'a [Playbook],
    tenant_id: &str,
    classification: &Classification,
) -> Option<&'a Playbook> {
    candidates(playbooks, tenant_id, classification).min_by(|a, b| selection_order(a, b))
}

fn candidates<'p>(
    playbooks: &'p [Playbook],
    tenant_id: &str,
    classification: &Classification,
) -> impl Iterator<Item = &'p Playbook> {
    playbooks.iter().filter(move |p| {
        p.tenant_id == tenant_id && p.is_active && p.conditions.matches(classification)
    })
}

/// Highest priority first, then lowest id.
fn selection_order(a: &Playbook, b: &Playbook) -> Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.playbook_id.cmp(&b.playbook_id))
}

/// Outcome of a matching attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// The selected playbook, if any.
    pub playbook: Option<Playbook>,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// Matcher backed by a playbook store.
pub struct PlaybookMatcher {
    playbooks: Arc<dyn PlaybookStore>,
}

impl PlaybookMatcher {
    /// Creates a matcher reading from `playbooks`.
    pub fn new(playbooks: Arc<dyn PlaybookStore>) -> Self {
        Self { playbooks }
    }

    /// Loads the tenant's active playbooks and selects one for `classification`.
    pub fn find_matching_playbook(
        &self,
        tenant_id: &str,
        classification: &Classification,
    ) -> StorageResult<MatchOutcome> {
        let active = self.playbooks.list_active(tenant_id)?;
        let matched = candidates(&active, tenant_id, classification).count();
        let selected = find_matching_playbook(&active, tenant_id, classification).cloned();

        let reasoning = match &selected {
            Some(playbook) => format!(
                "Matched playbook '{}' (id {}, version {}, priority {}) on [{}]; {} of {} active playbooks matched {}",
                playbook.name,
                playbook.playbook_id,
                playbook.version,
                playbook.priority,
                playbook.conditions,
                matched,
                active.len(),
                classification
            ),
            None => format!(
                "No active playbook matched {} ({} evaluated)",
                classification,
                active.len()
            ),
        };

        debug!(
            tenant_id,
            evaluated = active.len(),
            matched,
            playbook_id = selected.as_ref().map(|p| p.playbook_id),
            "Playbook matching finished"
        );

        Ok(MatchOutcome { playbook: selected, reasoning })
    }
}
