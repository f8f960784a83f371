//! Tiered learner memory.
//!
//! The memory module keeps everything a session has learned in a single
//! [`MemoryStore`] with three tiers:
//!
//! - **Working tier**: session-scoped scratch records, capacity limited
//! - **Short-term tier**: records awaiting a consolidation decision
//! - **Long-term tier**: promoted records plus per-concept concept/skill entries
//!
//! ## Example
//!
//! ```rust,ignore
//! use mentor_core::memory::{CancelFlag, MemoryQuery, MemoryStore, NewMemory};
//! use mentor_core::ConceptId;
//!
//! let mut store = MemoryStore::default();
//! let caching = ConceptId::parse("caching")?;
//!
//! // Important notes skip straight to long-term memory
//! store.store(NewMemory::new("LRU keeps hot keys", vec![caching.clone()]).with_importance(0.9))?;
//!
//! let hits = store.retrieve(&MemoryQuery::new("how does caching work"))?;
//!
//! // Merge duplicates, promote and prune
//! let report = store.consolidate(&CancelFlag::new())?;
//! ```

mod policy;
mod store;
mod types;

#[cfg(test)]
mod proptest;

pub use policy::RetentionPolicy;
pub use store::{CancelFlag, MemoryStore};
pub use types::{
    ConsolidationReport, Lifespan, LongTermEntry, LongTermKind, MemoryDistribution, MemoryQuery,
    MemoryRecord, MemoryType, MergeSummary, NewMemory, PromotionSummary, RetrievalStrategy,
    ScoredRecord, Tier, Urgency,
};
