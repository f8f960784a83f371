//! In-memory tiered record store.

use crate::concept::{ConceptId, MentionText};
use crate::error::{Error, Result};
use crate::ids::MemoryId;
use crate::memory::policy::RetentionPolicy;
use crate::memory::types::*;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info};

/// Cooperative cancellation flag checked between consolidation decisions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

/// Tiered memory for a single session.
///
/// Records live in one ordered collection tagged with their [`Tier`];
/// long-term concept and skill entries are indexed by concept. All tier
/// transitions go through this type so the promotion and eviction rules of
/// [`RetentionPolicy`] hold everywhere.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    policy: RetentionPolicy,
    records: Vec<MemoryRecord>,
    concepts: BTreeMap<ConceptId, LongTermEntry>,
    skills: BTreeMap<ConceptId, LongTermEntry>,
    next_sequence: u64,
    tick: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl MemoryStore {
    /// Create an empty store with the given policy.
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            records: Vec::new(),
            concepts: BTreeMap::new(),
            skills: BTreeMap::new(),
            next_sequence: 0,
            tick: 0,
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Current logical tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the logical clock without storing anything.
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    // ==================== Store ====================

    /// Validate and store a record, returning its id.
    pub fn store(&mut self, new: NewMemory) -> Result<MemoryId> {
        validate_new(&new)?;

        self.tick += 1;
        let now = Utc::now();
        let created_at = new.timestamp.unwrap_or(now);

        let tier = if new.importance >= self.policy.direct_long_term_importance
            || new.lifespan == Lifespan::Long
        {
            Tier::LongTerm
        } else if new.lifespan == Lifespan::Session {
            Tier::Working
        } else {
            Tier::ShortTerm
        };

        let mut concepts = Vec::with_capacity(new.concepts.len());
        for concept in new.concepts {
            if !concepts.contains(&concept) {
                concepts.push(concept);
            }
        }

        let record = MemoryRecord {
            id: MemoryId::new(),
            content: new.content,
            memory_type: new.memory_type,
            importance: new.importance,
            urgency: new.urgency,
            lifespan: new.lifespan,
            concepts,
            tier,
            created_at,
            updated_at: now,
            reinforcement_count: 1,
            sequence: self.next_sequence,
            last_touched_tick: self.tick,
        };
        self.next_sequence += 1;

        let id = record.id;
        debug!(memory_id = %id, tier = %tier, importance = record.importance, "Stored memory record");

        if tier == Tier::LongTerm {
            let kind = self.long_term_kind(&record);
            self.upsert_long_term(&record, kind);
        }
        self.records.push(record);

        if tier == Tier::Working {
            self.enforce_working_capacity();
        }

        Ok(id)
    }

    fn enforce_working_capacity(&mut self) {
        while self.count_tier(Tier::Working) > self.policy.working_capacity {
            let victim = self
                .records
                .iter_mut()
                .filter(|r| r.tier == Tier::Working)
                .min_by(|a, b| {
                    a.retention_score()
                        .partial_cmp(&b.retention_score())
                        .unwrap_or(Ordering::Equal)
                        .then(a.sequence.cmp(&b.sequence))
                });
            match victim {
                Some(record) => {
                    debug!(memory_id = %record.id, "Working memory full, demoting to short-term");
                    record.tier = Tier::ShortTerm;
                }
                None => break,
            }
        }
    }

    // ==================== Retrieve ====================

    /// Rank records against a query.
    ///
    /// The query names a concept when it lists it explicitly or when its
    /// text mentions a concept some stored record carries. When it names
    /// any, only records sharing at least one named concept are returned;
    /// otherwise every record is ranked. Returned records count as
    /// referenced.
    pub fn retrieve(&mut self, query: &MemoryQuery) -> Result<Vec<ScoredRecord>> {
        if query.max_results == 0 {
            return Err(Error::validation("max_results", "must be at least 1"));
        }

        let text = MentionText::new(&query.text);
        let mut wanted: BTreeSet<ConceptId> = self
            .records
            .iter()
            .flat_map(|r| r.concepts.iter())
            .filter(|c| text.mentions(c))
            .cloned()
            .collect();
        wanted.extend(query.concepts.iter().cloned());

        let candidates: Vec<(usize, f64)> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                let relevance = relevance_score(record, &wanted);
                if wanted.is_empty() || relevance > 0.0 {
                    Some((idx, relevance))
                } else {
                    None
                }
            })
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let (oldest, newest) = candidates.iter().fold(
            (i64::MAX, i64::MIN),
            |(lo, hi), (idx, _)| {
                let ts = self.records[*idx].created_at.timestamp_millis();
                (lo.min(ts), hi.max(ts))
            },
        );
        let max_relevance = candidates.iter().map(|(_, r)| *r).fold(0.0, f64::max);

        let mut scored: Vec<(usize, f64, f64)> = candidates
            .into_iter()
            .map(|(idx, relevance)| {
                let record = &self.records[idx];
                let score = match query.strategy {
                    RetrievalStrategy::Recency => recency_norm(record.created_at, oldest, newest),
                    RetrievalStrategy::Relevance => relevance,
                    RetrievalStrategy::Comprehensive => {
                        let rel = if max_relevance > 0.0 {
                            relevance / max_relevance
                        } else {
                            0.0
                        };
                        0.6 * rel + 0.4 * recency_norm(record.created_at, oldest, newest)
                    }
                };
                (idx, relevance, score)
            })
            .collect();

        let records = &self.records;
        scored.sort_by(|a, b| {
            let (ra, rb) = (&records[a.0], &records[b.0]);
            let primary = match query.strategy {
                RetrievalStrategy::Recency => rb.created_at.cmp(&ra.created_at),
                _ => b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal),
            };
            primary
                .then_with(|| rb.importance.partial_cmp(&ra.importance).unwrap_or(Ordering::Equal))
                .then_with(|| ra.sequence.cmp(&rb.sequence))
        });
        scored.truncate(query.max_results);

        let tick = self.tick;
        let results = scored
            .into_iter()
            .map(|(idx, relevance, score)| {
                let record = &mut self.records[idx];
                record.reinforcement_count = record.reinforcement_count.saturating_add(1);
                record.last_touched_tick = tick;
                ScoredRecord {
                    record: record.clone(),
                    relevance,
                    score,
                }
            })
            .collect::<Vec<_>>();

        debug!(results = results.len(), strategy = ?query.strategy, "Retrieved memories");
        Ok(results)
    }

    // ==================== Consolidate ====================

    /// Merge duplicates, promote qualifying short-term records and prune
    /// stale ones.
    ///
    /// Duplicates are grouped by primary concept (the first one listed), so
    /// records that only share a secondary concept are kept apart.
    ///
    /// Each merge, promotion and prune is applied as a unit; when `cancel`
    /// fires the pass stops before the next decision and reports what was
    /// done. Running the pass twice without new data is a no-op.
    pub fn consolidate(&mut self, cancel: &CancelFlag) -> Result<ConsolidationReport> {
        let limit = (self.records.len() + 1) * self.policy.max_iterations_per_record;
        let mut report = ConsolidationReport::default();

        if !self.merge_duplicates(cancel, limit, &mut report)? {
            return Ok(report);
        }
        if !self.promote_qualifying(cancel, limit, &mut report)? {
            return Ok(report);
        }
        self.prune_stale(cancel, limit, &mut report)?;

        info!(
            promoted = report.promoted.len(),
            pruned = report.pruned.len(),
            merged = report.merged.len(),
            "Consolidation complete"
        );
        Ok(report)
    }

    /// Count one decision; false means the pass was cancelled.
    fn step(cancel: &CancelFlag, limit: usize, report: &mut ConsolidationReport) -> Result<bool> {
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(false);
        }
        report.iterations += 1;
        if report.iterations > limit {
            return Err(Error::exhausted("consolidation", limit));
        }
        Ok(true)
    }

    fn is_consolidation_candidate(record: &MemoryRecord) -> bool {
        record.tier == Tier::ShortTerm && record.lifespan != Lifespan::Session
    }

    fn merge_duplicates(
        &mut self,
        cancel: &CancelFlag,
        limit: usize,
        report: &mut ConsolidationReport,
    ) -> Result<bool> {
        let mut groups: BTreeMap<ConceptId, Vec<MemoryId>> = BTreeMap::new();
        for record in self.records.iter().filter(|r| Self::is_consolidation_candidate(r)) {
            if let Some(concept) = record.primary_concept() {
                groups.entry(concept.clone()).or_default().push(record.id);
            }
        }

        for (concept, ids) in groups.into_iter().filter(|(_, ids)| ids.len() > 1) {
            let survivor = ids[0];
            let mut summary = MergeSummary {
                concept,
                survivor,
                absorbed: Vec::new(),
            };
            let mut completed = true;

            for duplicate in &ids[1..] {
                if !Self::step(cancel, limit, report)? {
                    completed = false;
                    break;
                }
                self.absorb(survivor, *duplicate);
                summary.absorbed.push(*duplicate);
            }

            if !summary.absorbed.is_empty() {
                debug!(survivor = %survivor, absorbed = summary.absorbed.len(), "Merged duplicate memories");
                report.merged.push(summary);
            }
            if !completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn absorb(&mut self, survivor: MemoryId, duplicate: MemoryId) {
        let Some(pos) = self.records.iter().position(|r| r.id == duplicate) else {
            return;
        };
        let absorbed = self.records.remove(pos);
        let cap = self.policy.merged_content_cap;

        if let Some(target) = self.records.iter_mut().find(|r| r.id == survivor) {
            target.importance = target.importance.max(absorbed.importance);
            target.urgency = target.urgency.max(absorbed.urgency);
            target.reinforcement_count = target
                .reinforcement_count
                .saturating_add(absorbed.reinforcement_count);
            target.last_touched_tick = target.last_touched_tick.max(absorbed.last_touched_tick);
            target.updated_at = Utc::now();
            for concept in absorbed.concepts {
                if !target.concepts.contains(&concept) {
                    target.concepts.push(concept);
                }
            }
            if target.content.chars().count() < cap && !target.content.contains(&absorbed.content) {
                let joined = format!("{}\n{}", target.content, absorbed.content);
                target.content = joined.chars().take(cap).collect();
            }
        }
    }

    fn promote_qualifying(
        &mut self,
        cancel: &CancelFlag,
        limit: usize,
        report: &mut ConsolidationReport,
    ) -> Result<bool> {
        let qualifying: Vec<MemoryId> = self
            .records
            .iter()
            .filter(|r| Self::is_consolidation_candidate(r))
            .filter(|r| {
                r.reinforcement_count >= self.policy.promote_reference_count
                    || r.importance >= self.policy.promote_importance
            })
            .map(|r| r.id)
            .collect();

        for id in qualifying {
            if !Self::step(cancel, limit, report)? {
                return Ok(false);
            }
            let Some(idx) = self.records.iter().position(|r| r.id == id) else {
                continue;
            };
            self.records[idx].tier = Tier::LongTerm;
            self.records[idx].updated_at = Utc::now();
            let record = self.records[idx].clone();
            let kind = self.long_term_kind(&record);
            self.upsert_long_term(&record, kind);

            debug!(memory_id = %id, kind = ?kind, "Promoted memory to long-term");
            report.promoted.push(PromotionSummary {
                memory_id: id,
                concepts: record.concepts.clone(),
                kind,
                importance: record.importance,
                reinforcement_count: record.reinforcement_count,
            });
        }
        Ok(true)
    }

    fn prune_stale(
        &mut self,
        cancel: &CancelFlag,
        limit: usize,
        report: &mut ConsolidationReport,
    ) -> Result<bool> {
        let window = self.policy.retention_window_ticks;
        let tick = self.tick;
        let stale: Vec<MemoryId> = self
            .records
            .iter()
            .filter(|r| r.tier == Tier::ShortTerm)
            .filter(|r| tick.saturating_sub(r.last_touched_tick) > window)
            .map(|r| r.id)
            .collect();

        for id in stale {
            if !Self::step(cancel, limit, report)? {
                return Ok(false);
            }
            self.records.retain(|r| r.id != id);
            debug!(memory_id = %id, "Pruned stale short-term memory");
            report.pruned.push(id);
        }
        Ok(true)
    }

    /// Procedural knowledge and anything reinforced up to the promotion
    /// count is a skill; everything else is concept knowledge.
    fn long_term_kind(&self, record: &MemoryRecord) -> LongTermKind {
        if record.memory_type == MemoryType::Procedural
            || record.reinforcement_count >= self.policy.promote_reference_count
        {
            LongTermKind::Skill
        } else {
            LongTermKind::Concept
        }
    }

    fn upsert_long_term(&mut self, record: &MemoryRecord, kind: LongTermKind) {
        let index = match kind {
            LongTermKind::Concept => &mut self.concepts,
            LongTermKind::Skill => &mut self.skills,
        };
        let now = Utc::now();
        for concept in &record.concepts {
            let entry = index.entry(concept.clone()).or_insert_with(|| LongTermEntry {
                concept: concept.clone(),
                kind,
                mastery: 0.0,
                importance: record.importance,
                reinforcement_count: 0,
                last_reinforced: now,
                source_memories: Vec::new(),
            });
            entry.importance = entry.importance.max(record.importance);
            entry.reinforcement_count = entry
                .reinforcement_count
                .saturating_add(record.reinforcement_count);
            entry.mastery = LongTermEntry::mastery_from_evidence(entry.reinforcement_count);
            entry.last_reinforced = now;
            if !entry.source_memories.contains(&record.id) {
                entry.source_memories.push(record.id);
            }
        }
    }

    // ==================== Maintenance ====================

    /// Raise importance of every record and long-term entry tagged with one
    /// of `concepts`. Returns the touched record ids.
    pub fn boost_concepts(&mut self, concepts: &[ConceptId], delta: f64) -> Vec<MemoryId> {
        let tick = self.tick;
        let mut touched = Vec::new();
        for record in self
            .records
            .iter_mut()
            .filter(|r| concepts.iter().any(|c| r.has_concept(c)))
        {
            record.importance = (record.importance + delta).clamp(0.0, 1.0);
            record.last_touched_tick = tick;
            touched.push(record.id);
        }
        for entry in self
            .concepts
            .values_mut()
            .chain(self.skills.values_mut())
            .filter(|e| concepts.contains(&e.concept))
        {
            entry.importance = (entry.importance + delta).clamp(0.0, 1.0);
        }
        touched
    }

    /// Drop all session-scoped records. Called at session teardown.
    pub fn purge_session_scoped(&mut self) -> Vec<MemoryId> {
        let purged: Vec<MemoryId> = self
            .records
            .iter()
            .filter(|r| r.lifespan == Lifespan::Session)
            .map(|r| r.id)
            .collect();
        self.records.retain(|r| r.lifespan != Lifespan::Session);
        if !purged.is_empty() {
            info!(count = purged.len(), "Purged session-scoped memories");
        }
        purged
    }

    // ==================== Accessors ====================

    pub fn get(&self, id: &MemoryId) -> Option<&MemoryRecord> {
        self.records.iter().find(|r| r.id == *id)
    }

    pub fn contains(&self, id: &MemoryId) -> bool {
        self.get(id).is_some()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn records_in(&self, tier: Tier) -> impl Iterator<Item = &MemoryRecord> {
        self.records.iter().filter(move |r| r.tier == tier)
    }

    fn count_tier(&self, tier: Tier) -> usize {
        self.records_in(tier).count()
    }

    pub fn long_term_concepts(&self) -> impl Iterator<Item = &LongTermEntry> {
        self.concepts.values()
    }

    pub fn long_term_skills(&self) -> impl Iterator<Item = &LongTermEntry> {
        self.skills.values()
    }

    /// Long-term entry of the given kind for a concept.
    pub fn long_term_entry(&self, kind: LongTermKind, concept: &ConceptId) -> Option<&LongTermEntry> {
        match kind {
            LongTermKind::Concept => self.concepts.get(concept),
            LongTermKind::Skill => self.skills.get(concept),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn distribution(&self) -> MemoryDistribution {
        MemoryDistribution {
            working: self.count_tier(Tier::Working),
            short_term: self.count_tier(Tier::ShortTerm),
            long_term: self.count_tier(Tier::LongTerm),
            concepts: self.concepts.len(),
            skills: self.skills.len(),
        }
    }
}

fn validate_new(new: &NewMemory) -> Result<()> {
    if new.content.trim().is_empty() {
        return Err(Error::validation("content", "must not be empty"));
    }
    if new.concepts.is_empty() {
        return Err(Error::validation("concepts", "at least one concept is required"));
    }
    if !new.importance.is_finite() || !(0.0..=1.0).contains(&new.importance) {
        return Err(Error::validation(
            "importance",
            format!("must be within [0,1], got {}", new.importance),
        ));
    }
    Ok(())
}

/// Fraction of the record's concepts named by the query, weighted by
/// importance (x0.5..x1.0) and reinforcement (logarithmic bonus).
fn relevance_score(record: &MemoryRecord, wanted: &BTreeSet<ConceptId>) -> f64 {
    if wanted.is_empty() || record.concepts.is_empty() {
        return 0.0;
    }
    let matched = record.concepts.iter().filter(|c| wanted.contains(*c)).count();
    if matched == 0 {
        return 0.0;
    }
    let overlap = matched as f64 / record.concepts.len() as f64;
    let importance_weight = 0.5 + 0.5 * record.importance;
    let reinforcement_weight = 1.0 + 0.25 * (record.reinforcement_count.max(1) as f64).ln();
    overlap * importance_weight * reinforcement_weight
}

fn recency_norm(ts: DateTime<Utc>, oldest: i64, newest: i64) -> f64 {
    if newest <= oldest {
        return 1.0;
    }
    (ts.timestamp_millis() - oldest) as f64 / (newest - oldest) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn concept(name: &str) -> ConceptId {
        ConceptId::parse(name).unwrap()
    }

    fn memory(content: &str, concepts: &[&str]) -> NewMemory {
        NewMemory::new(content, concepts.iter().map(|c| concept(c)).collect())
    }

    #[test]
    fn test_store_rejects_empty_content_and_concepts() {
        let mut store = MemoryStore::default();

        let err = store.store(memory("  ", &["caching"])).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "content"));

        let err = store.store(NewMemory::new("text", Vec::new())).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "concepts"));

        let err = store
            .store(memory("text", &["caching"]).with_importance(1.2))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "importance"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_tier_placement() {
        let mut store = MemoryStore::default();
        let important = store
            .store(memory("a", &["caching"]).with_importance(0.7))
            .unwrap();
        let long = store
            .store(memory("b", &["caching"]).with_lifespan(Lifespan::Long))
            .unwrap();
        let session = store
            .store(memory("c", &["caching"]).with_lifespan(Lifespan::Session))
            .unwrap();
        let short = store.store(memory("d", &["caching"])).unwrap();

        assert_eq!(store.get(&important).unwrap().tier, Tier::LongTerm);
        assert_eq!(store.get(&long).unwrap().tier, Tier::LongTerm);
        assert_eq!(store.get(&session).unwrap().tier, Tier::Working);
        assert_eq!(store.get(&short).unwrap().tier, Tier::ShortTerm);
    }

    #[test]
    fn test_high_importance_is_immediately_retrievable() {
        let mut store = MemoryStore::default();
        let id = store
            .store(memory("LRU eviction keeps hot keys", &["caching"]).with_importance(0.9))
            .unwrap();

        assert_eq!(store.get(&id).unwrap().tier, Tier::LongTerm);
        assert!(store
            .long_term_entry(LongTermKind::Concept, &concept("caching"))
            .is_some());

        let results = store
            .retrieve(&MemoryQuery::new("when should I use caching?"))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, id);
    }

    #[test]
    fn test_retrieve_excludes_unrelated_records() {
        let mut store = MemoryStore::default();
        store.store(memory("threads", &["concurrency"])).unwrap();
        store.store(memory("lru", &["caching"])).unwrap();

        let results = store.retrieve(&MemoryQuery::new("caching")).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].record.has_concept(&concept("caching")));
    }

    #[test]
    fn test_retrieve_matches_multiword_concept() {
        let mut store = MemoryStore::default();
        let id = store
            .store(memory("use ? to propagate", &["error handling"]).with_importance(0.9))
            .unwrap();
        store.store(memory("lru", &["caching"])).unwrap();

        let results = store
            .retrieve(&MemoryQuery::new("how does error handling work"))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, id);
    }

    #[test]
    fn test_retrieve_matches_hyphenated_text() {
        let mut store = MemoryStore::default();
        let id = store
            .store(memory("LRU evicts cold keys", &["caching"]).with_importance(0.9))
            .unwrap();
        store.store(memory("threads", &["concurrency"])).unwrap();

        let results = store.retrieve(&MemoryQuery::new("explain LRU-caching")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, id);
    }

    #[test]
    fn test_recency_query_without_known_concepts_ranks_everything() {
        let mut store = MemoryStore::default();
        let base = Utc::now();
        store
            .store(memory("older", &["caching"]).with_timestamp(base - Duration::minutes(10)))
            .unwrap();
        store
            .store(memory("newer", &["concurrency"]).with_timestamp(base))
            .unwrap();

        let results = store
            .retrieve(&MemoryQuery::new("show my recent notes").with_strategy(RetrievalStrategy::Recency))
            .unwrap();
        let contents: Vec<&str> = results.iter().map(|r| r.record.content.as_str()).collect();
        assert_eq!(contents, vec!["newer", "older"]);
    }

    #[test]
    fn test_explicit_unknown_concept_filters_everything() {
        let mut store = MemoryStore::default();
        store.store(memory("lru", &["caching"])).unwrap();

        let results = store
            .retrieve(&MemoryQuery::new("anything").with_concepts(vec![concept("lifetimes")]))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_retrieve_recency_order() {
        let mut store = MemoryStore::default();
        let base = Utc::now();
        for (i, minutes) in [30, 10, 20].iter().enumerate() {
            store
                .store(
                    memory(&format!("note {}", i), &["caching"])
                        .with_timestamp(base - Duration::minutes(*minutes)),
                )
                .unwrap();
        }

        let results = store
            .retrieve(&MemoryQuery::new("caching").with_strategy(RetrievalStrategy::Recency))
            .unwrap();
        let contents: Vec<&str> = results.iter().map(|r| r.record.content.as_str()).collect();
        assert_eq!(contents, vec!["note 1", "note 2", "note 0"]);
    }

    #[test]
    fn test_retrieve_ties_break_by_importance_then_insertion() {
        let mut store = MemoryStore::default();
        let ts = Utc::now();
        let first = store
            .store(memory("first", &["caching"]).with_importance(0.3).with_timestamp(ts))
            .unwrap();
        let second = store
            .store(memory("second", &["caching"]).with_importance(0.3).with_timestamp(ts))
            .unwrap();
        let third = store
            .store(memory("third", &["caching"]).with_importance(0.5).with_timestamp(ts))
            .unwrap();

        let results = store
            .retrieve(&MemoryQuery::new("caching").with_strategy(RetrievalStrategy::Recency))
            .unwrap();
        let ids: Vec<MemoryId> = results.iter().map(|r| r.record.id).collect();
        assert_eq!(ids, vec![third, first, second]);
    }

    #[test]
    fn test_retrieve_rejects_zero_max_results() {
        let mut store = MemoryStore::default();
        let err = store
            .retrieve(&MemoryQuery::new("x").with_max_results(0))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_consolidate_merges_duplicates_into_one_skill() {
        let mut store = MemoryStore::default();
        for text in ["cache reads", "cache writes", "cache invalidation"] {
            store
                .store(memory(text, &["caching"]).with_importance(0.4))
                .unwrap();
        }

        let report = store.consolidate(&CancelFlag::new()).unwrap();

        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.merged[0].absorbed.len(), 2);
        assert_eq!(report.promoted.len(), 1);
        assert_eq!(store.len(), 1);

        let skill = store
            .long_term_entry(LongTermKind::Skill, &concept("caching"))
            .unwrap();
        assert_eq!(skill.importance, 0.4);
        assert_eq!(skill.reinforcement_count, 3);
        assert_eq!(store.long_term_skills().count(), 1);
        assert!(store.records()[0].content.contains("cache invalidation"));
    }

    #[test]
    fn test_consolidate_keeps_records_sharing_only_a_secondary_concept() {
        let mut store = MemoryStore::default();
        store.store(memory("cache per thread", &["caching", "threads"])).unwrap();
        store.store(memory("lock per thread", &["locking", "threads"])).unwrap();

        let report = store.consolidate(&CancelFlag::new()).unwrap();

        assert!(report.merged.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_consolidate_is_idempotent() {
        let mut store = MemoryStore::new(RetentionPolicy::aggressive());
        store.store(memory("a", &["caching"]).with_importance(0.65)).unwrap();
        store.store(memory("b", &["caching"])).unwrap();
        store.store(memory("c", &["threads"])).unwrap();
        for _ in 0..10 {
            store.advance_tick();
        }

        let first = store.consolidate(&CancelFlag::new()).unwrap();
        assert!(!first.is_noop());

        let second = store.consolidate(&CancelFlag::new()).unwrap();
        assert!(second.is_noop(), "second pass changed state: {:?}", second);
    }

    #[test]
    fn test_prune_respects_retention_window() {
        let mut store = MemoryStore::new(RetentionPolicy::aggressive());
        let stale = store.store(memory("old", &["threads"])).unwrap();
        for _ in 0..6 {
            store.advance_tick();
        }
        let fresh = store.store(memory("new", &["locks"])).unwrap();

        let report = store.consolidate(&CancelFlag::new()).unwrap();
        assert_eq!(report.pruned, vec![stale]);
        assert!(store.contains(&fresh));
    }

    #[test]
    fn test_cancelled_consolidation_leaves_consistent_state() {
        let mut store = MemoryStore::default();
        for text in ["a", "b", "c"] {
            store.store(memory(text, &["caching"])).unwrap();
        }
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = store.consolidate(&cancel).unwrap();
        assert!(report.cancelled);
        assert!(report.is_noop());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_working_overflow_demotes() {
        let mut store = MemoryStore::new(RetentionPolicy::aggressive());
        for i in 0..4 {
            store
                .store(
                    memory(&format!("w{}", i), &["scratch"])
                        .with_lifespan(Lifespan::Session)
                        .with_importance(0.1 * (i + 1) as f64),
                )
                .unwrap();
        }
        let dist = store.distribution();
        assert_eq!(dist.working, 3);
        assert_eq!(dist.short_term, 1);
        assert_eq!(store.records()[0].tier, Tier::ShortTerm);
    }

    #[test]
    fn test_purge_session_scoped() {
        let mut store = MemoryStore::default();
        store
            .store(memory("tmp", &["scratch"]).with_lifespan(Lifespan::Session))
            .unwrap();
        let kept = store.store(memory("keep", &["caching"])).unwrap();

        let purged = store.purge_session_scoped();
        assert_eq!(purged.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&kept));
    }

    #[test]
    fn test_boost_concepts_caps_at_one() {
        let mut store = MemoryStore::default();
        let id = store
            .store(memory("x", &["caching"]).with_importance(0.5))
            .unwrap();
        store.boost_concepts(&[concept("caching")], 0.2);
        assert!((store.get(&id).unwrap().importance - 0.7).abs() < 1e-9);
        store.boost_concepts(&[concept("caching")], 0.5);
        assert_eq!(store.get(&id).unwrap().importance, 1.0);
    }
}
