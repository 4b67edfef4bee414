//! Property tests for playbook selection.

use proptest::prelude::*;
use remedy_core::{Classification, MatchConditions, Playbook, find_matching_playbook};

const DOMAINS: &[&str] = &["Finance", "Trading", "Ops"];
const TYPES: &[&str] = &["PaymentFailure", "DataQualityFailure", "SettlementBreak"];
const SEVERITIES: &[&str] = &["LOW", "MEDIUM", "HIGH", "CRITICAL"];
const TENANTS: &[&str] = &["tenant-a", "tenant-b"];

fn pick(values: &'static [&'static str]) -> impl Strategy<Value = String> {
    proptest::sample::select(values).prop_map(String::from)
}

fn conditions() -> impl Strategy<Value = MatchConditions> {
    (
        proptest::option::of(pick(DOMAINS)),
        proptest::option::of(pick(TYPES)),
        proptest::option::of(proptest::collection::btree_set(pick(SEVERITIES), 0..3)),
    )
        .prop_map(|(domain, exception_type, severity_in)| MatchConditions {
            domain,
            exception_type,
            severity_in,
        })
}

fn playbooks() -> impl Strategy<Value = Vec<Playbook>> {
    proptest::collection::vec((pick(TENANTS), conditions(), -3i64..3, any::<bool>()), 0..12)
        .prop_map(|specs| {
            specs
                .into_iter()
                .zip(1i64..)
                .map(|((tenant, conditions, priority, active), id)| {
                    let playbook = Playbook::new(tenant, id, format!("Playbook {}", id), 1)
                        .with_conditions(conditions)
                        .with_priority(priority);
                    if active { playbook } else { playbook.inactive() }
                })
                .collect()
        })
}

fn classification() -> impl Strategy<Value = Classification> {
    (
        proptest::option::of(pick(DOMAINS)),
        proptest::option::of(pick(TYPES)),
        proptest::option::of(pick(SEVERITIES)),
    )
        .prop_map(|(domain, exception_type, severity)| Classification {
            domain,
            exception_type,
            severity,
        })
}

fn eligible(playbook: &Playbook, tenant_id: &str, classification: &Classification) -> bool {
    playbook.tenant_id == tenant_id && playbook.is_active && playbook.conditions.matches(classification)
}

proptest! {
    #[test]
    fn prop_matching_is_deterministic(
        playbooks in playbooks(),
        tenant in pick(TENANTS),
        classification in classification()
    ) {
        let first = find_matching_playbook(&playbooks, &tenant, &classification).map(|p| p.playbook_id);
        let second = find_matching_playbook(&playbooks, &tenant, &classification).map(|p| p.playbook_id);
        prop_assert_eq!(first, second);

        // Independent of the order the store returns playbooks in.
        let mut reversed = playbooks.clone();
        reversed.reverse();
        let third = find_matching_playbook(&reversed, &tenant, &classification).map(|p| p.playbook_id);
        prop_assert_eq!(first, third);
    }

    #[test]
    fn prop_selected_playbook_outranks_every_other_match(
        playbooks in playbooks(),
        tenant in pick(TENANTS),
        classification in classification()
    ) {
        match find_matching_playbook(&playbooks, &tenant, &classification) {
            Some(selected) => {
                prop_assert!(eligible(selected, &tenant, &classification));
                for other in playbooks.iter().filter(|p| eligible(p, &tenant, &classification)) {
                    prop_assert!(
                        other.priority < selected.priority
                            || (other.priority == selected.priority
                                && other.playbook_id >= selected.playbook_id)
                    );
                }
            }
            None => {
                prop_assert!(!playbooks.iter().any(|p| eligible(p, &tenant, &classification)));
            }
        }
    }
}

#[test]
fn test_severity_outside_set_never_matches() {
    let playbooks = vec![
        Playbook::new("tenant-a", 1, "High only", 1)
            .with_conditions(MatchConditions::any().with_severities(["HIGH"]))
            .with_priority(10),
    ];
    let low = Classification { severity: Some("LOW".to_string()), ..Classification::default() };
    assert!(find_matching_playbook(&playbooks, "tenant-a", &low).is_none());
}
