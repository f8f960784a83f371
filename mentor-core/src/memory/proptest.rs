//! Property-based tests for retrieval ordering and consolidation.

use proptest::prelude::*;

use crate::concept::ConceptId;
use crate::memory::{CancelFlag, MemoryQuery, MemoryStore, NewMemory, RetrievalStrategy};
use chrono::{Duration, Utc};

const CONCEPTS: [&str; 4] = ["caching", "threads", "locks", "iterators"];

// (concept index, importance, minutes ago)
fn record_spec() -> impl Strategy<Value = (usize, f64, i64)> {
    (0..CONCEPTS.len(), 0.0f64..0.69, 0i64..600)
}

fn populated(specs: &[(usize, f64, i64)]) -> MemoryStore {
    let mut store = MemoryStore::default();
    let now = Utc::now();
    for (i, (concept, importance, minutes)) in specs.iter().enumerate() {
        let concept = ConceptId::parse(CONCEPTS[*concept]).unwrap();
        store
            .store(
                NewMemory::new(format!("note {}", i), vec![concept])
                    .with_importance(*importance)
                    .with_timestamp(now - Duration::minutes(*minutes)),
            )
            .unwrap();
    }
    store
}

proptest! {
    /// Recency results are non-increasing by timestamp.
    #[test]
    fn recency_is_non_increasing(specs in prop::collection::vec(record_spec(), 1..20)) {
        let mut store = populated(&specs);
        let results = store
            .retrieve(&MemoryQuery::new("").with_strategy(RetrievalStrategy::Recency).with_max_results(50))
            .unwrap();

        for pair in results.windows(2) {
            prop_assert!(pair[0].record.created_at >= pair[1].record.created_at);
        }
    }

    /// Relevance results are non-increasing by score; equal scores fall back to importance.
    #[test]
    fn relevance_is_non_increasing(
        specs in prop::collection::vec(record_spec(), 1..20),
        pick in 0..CONCEPTS.len(),
    ) {
        let mut store = populated(&specs);
        let query = MemoryQuery::new(CONCEPTS[pick])
            .with_strategy(RetrievalStrategy::Relevance)
            .with_max_results(50);
        let results = store.retrieve(&query).unwrap();

        for pair in results.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].record.importance >= pair[1].record.importance);
            }
        }
    }

    /// A second consolidation without new data promotes and prunes nothing.
    #[test]
    fn consolidation_is_idempotent(
        specs in prop::collection::vec(record_spec(), 0..25),
        idle_ticks in 0u64..80,
    ) {
        let mut store = populated(&specs);
        for _ in 0..idle_ticks {
            store.advance_tick();
        }

        store.consolidate(&CancelFlag::new()).unwrap();
        let second = store.consolidate(&CancelFlag::new()).unwrap();

        prop_assert!(second.promoted.is_empty());
        prop_assert!(second.pruned.is_empty());
        prop_assert!(second.merged.is_empty());
    }
}
