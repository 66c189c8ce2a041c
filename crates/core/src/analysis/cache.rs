use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::conversation::{ConversationAnalysis, ConversationId};

/// An analysis is a pure function of the message and the customer history, so the
/// conversation id, message text and history length identify it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub conversation_id: ConversationId,
    pub message: String,
    pub history_len: usize,
}

impl CacheKey {
    pub fn new(conversation_id: &ConversationId, message: &str, history_len: usize) -> Self {
        Self { conversation_id: conversation_id.clone(), message: message.to_string(), history_len }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, ConversationAnalysis>,
    order: VecDeque<CacheKey>,
}

/// Bounded first-in-first-out memo of recent analyses.
#[derive(Debug)]
pub struct AnalysisCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, state: Mutex::new(CacheState::default()) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &CacheKey) -> Option<ConversationAnalysis> {
        self.lock().entries.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, analysis: ConversationAnalysis) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        if state.entries.insert(key.clone(), analysis).is_some() {
            return;
        }
        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.entries.remove(&evicted);
            }
        }
    }

    /// Returns the cached analysis or computes, stores and returns a fresh one.
    pub fn get_or_insert_with(
        &self,
        key: CacheKey,
        analyze: impl FnOnce() -> ConversationAnalysis,
    ) -> ConversationAnalysis {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let analysis = analyze();
        self.insert(key, analysis.clone());
        analysis
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisCache, CacheKey};
    use crate::analysis::{AnalysisRequest, ConversationAnalyzer};
    use crate::domain::conversation::ConversationId;

    #[test]
    fn repeated_lookups_reuse_the_first_analysis() {
        let analyzer = ConversationAnalyzer::default();
        let cache = AnalysisCache::new(4);
        let id = ConversationId("conv-1".to_string());
        let key = CacheKey::new(&id, "how much is it?", 0);

        let first = cache.get_or_insert_with(key.clone(), || {
            analyzer.analyze(&AnalysisRequest::new(&id, "how much is it?"))
        });
        let second = cache.get_or_insert_with(key, || panic!("should hit the cache"));

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let analyzer = ConversationAnalyzer::default();
        let cache = AnalysisCache::new(2);
        let id = ConversationId("conv-1".to_string());

        for message in ["first", "second", "third"] {
            let analysis = analyzer.analyze(&AnalysisRequest::new(&id, message));
            cache.insert(CacheKey::new(&id, message, 0), analysis);
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&CacheKey::new(&id, "first", 0)).is_none());
        assert!(cache.get(&CacheKey::new(&id, "third", 0)).is_some());
    }
}
