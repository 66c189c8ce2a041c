//! Read-only collaborators the pipeline consults: conversation persistence and lead scoring.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use closer_core::domain::conversation::{
    Conversation, ConversationId, ConversationMessage, Lead, LeadId, LeadScore, PriorityTier,
};
use closer_core::errors::ApplicationError;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn conversation(&self, id: &ConversationId) -> Result<Option<Conversation>, ApplicationError>;

    /// Messages in arrival order.
    async fn messages(&self, id: &ConversationId) -> Result<Vec<ConversationMessage>, ApplicationError>;

    async fn lead(&self, id: &LeadId) -> Result<Option<Lead>, ApplicationError>;
}

#[async_trait]
pub trait LeadScorer: Send + Sync {
    async fn score(&self, lead_id: &LeadId) -> Result<LeadScore, ApplicationError>;
}

/// Maps a 0-100 lead score onto the hot/warm/cold tiers.
pub fn priority_tier_for(total_score: u8) -> PriorityTier {
    match total_score {
        70..=u8::MAX => PriorityTier::Hot,
        40..=69 => PriorityTier::Warm,
        _ => PriorityTier::Cold,
    }
}

#[derive(Default)]
struct StoreState {
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<ConversationMessage>>,
    leads: HashMap<LeadId, Lead>,
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    state: RwLock<StoreState>,
}

impl InMemoryConversationStore {
    pub fn insert_lead(&self, lead: Lead) {
        self.write().leads.insert(lead.id.clone(), lead);
    }

    pub fn insert_conversation(&self, conversation: Conversation) {
        self.write().conversations.insert(conversation.id.clone(), conversation);
    }

    pub fn append_message(&self, conversation_id: &ConversationId, message: ConversationMessage) {
        self.write().messages.entry(conversation_id.clone()).or_default().push(message);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn conversation(&self, id: &ConversationId) -> Result<Option<Conversation>, ApplicationError> {
        Ok(self.read().conversations.get(id).cloned())
    }

    async fn messages(&self, id: &ConversationId) -> Result<Vec<ConversationMessage>, ApplicationError> {
        let mut messages = self.read().messages.get(id).cloned().unwrap_or_default();
        messages.sort_by_key(|message| message.timestamp);
        Ok(messages)
    }

    async fn lead(&self, id: &LeadId) -> Result<Option<Lead>, ApplicationError> {
        Ok(self.read().leads.get(id).cloned())
    }
}

/// Fixed scores per lead, with a fallback score for unknown leads.
pub struct StaticLeadScorer {
    scores: RwLock<HashMap<LeadId, u8>>,
    fallback_score: u8,
}

impl StaticLeadScorer {
    pub fn new(fallback_score: u8) -> Self {
        Self { scores: RwLock::new(HashMap::new()), fallback_score: fallback_score.min(100) }
    }

    pub fn set_score(&self, lead_id: LeadId, total_score: u8) {
        match self.scores.write() {
            Ok(mut scores) => scores.insert(lead_id, total_score.min(100)),
            Err(poisoned) => poisoned.into_inner().insert(lead_id, total_score.min(100)),
        };
    }
}

impl Default for StaticLeadScorer {
    fn default() -> Self {
        Self::new(30)
    }
}

#[async_trait]
impl LeadScorer for StaticLeadScorer {
    async fn score(&self, lead_id: &LeadId) -> Result<LeadScore, ApplicationError> {
        let total_score = match self.scores.read() {
            Ok(scores) => scores.get(lead_id).copied(),
            Err(poisoned) => poisoned.into_inner().get(lead_id).copied(),
        }
        .unwrap_or(self.fallback_score);
        Ok(LeadScore::new(total_score, priority_tier_for(total_score)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use closer_core::domain::conversation::{
        ConversationId, ConversationMessage, LeadId, PriorityTier,
    };

    use super::{
        priority_tier_for, ConversationStore, InMemoryConversationStore, LeadScorer,
        StaticLeadScorer,
    };

    #[test]
    fn tiers_follow_score_bands() {
        assert_eq!(priority_tier_for(85), PriorityTier::Hot);
        assert_eq!(priority_tier_for(70), PriorityTier::Hot);
        assert_eq!(priority_tier_for(55), PriorityTier::Warm);
        assert_eq!(priority_tier_for(10), PriorityTier::Cold);
    }

    #[tokio::test]
    async fn messages_come_back_in_arrival_order() {
        let store = InMemoryConversationStore::default();
        let id = ConversationId("conv-1".to_string());
        let now = Utc::now();
        store.append_message(&id, ConversationMessage::customer("second", now));
        store.append_message(&id, ConversationMessage::customer("first", now - Duration::minutes(5)));

        let messages = store.messages(&id).await.expect("messages");

        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert!(store.conversation(&id).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn unknown_leads_get_the_fallback_score() {
        let scorer = StaticLeadScorer::new(35);
        scorer.set_score(LeadId("lead-hot".to_string()), 92);

        let hot = scorer.score(&LeadId("lead-hot".to_string())).await.expect("score");
        let unknown = scorer.score(&LeadId("lead-new".to_string())).await.expect("score");

        assert_eq!(hot.priority_tier, PriorityTier::Hot);
        assert_eq!(unknown.total_score, 35);
        assert_eq!(unknown.priority_tier, PriorityTier::Cold);
    }
}
