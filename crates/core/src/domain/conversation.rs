use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Paused,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub lead_id: LeadId,
    pub status: ConversationStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub content: String,
    pub is_from_agent: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn customer(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { content: content.into(), is_from_agent: false, timestamp }
    }

    pub fn agent(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { content: content.into(), is_from_agent: true, timestamp }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: Option<String>,
    pub vehicle_interest: Option<String>,
    pub source: Option<String>,
}

/// Optional lead profile fields the analyzer and matcher can use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadContext {
    pub name: Option<String>,
    pub vehicle_interest: Option<String>,
    pub source: Option<String>,
}

impl From<&Lead> for LeadContext {
    fn from(lead: &Lead) -> Self {
        Self {
            name: lead.name.clone(),
            vehicle_interest: lead.vehicle_interest.clone(),
            source: lead.source.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Hot,
    Warm,
    Cold,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

/// Output of the external lead-scoring collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadScore {
    pub total_score: u8,
    pub priority_tier: PriorityTier,
}

impl LeadScore {
    pub fn new(total_score: u8, priority_tier: PriorityTier) -> Self {
        Self { total_score: total_score.min(100), priority_tier }
    }
}

impl Default for LeadScore {
    fn default() -> Self {
        Self { total_score: 0, priority_tier: PriorityTier::Cold }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    Frustrated,
    Excited,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryPositive => "very_positive",
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
            Self::Frustrated => "frustrated",
            Self::Excited => "excited",
        }
    }

    /// Signed sentiment used for the before/after delta of a response.
    pub fn sentiment(&self) -> i8 {
        match self {
            Self::VeryPositive | Self::Excited => 2,
            Self::Positive => 1,
            Self::Neutral => 0,
            Self::Negative => -1,
            Self::Frustrated => -2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Research,
    Comparison,
    ReadyToBuy,
    PriceFocused,
    Undecided,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Comparison => "comparison",
            Self::ReadyToBuy => "ready_to_buy",
            Self::PriceFocused => "price_focused",
            Self::Undecided => "undecided",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Escalate,
    UrgentFollowup,
    ScheduleCall,
    SendOffer,
    Continue,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalate => "escalate",
            Self::UrgentFollowup => "urgent_followup",
            Self::ScheduleCall => "schedule_call",
            Self::SendOffer => "send_offer",
            Self::Continue => "continue",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    Greeting,
    Discovery,
    Qualification,
    Negotiation,
    Closing,
}

impl ConversationStage {
    pub fn from_analysis(analysis: &ConversationAnalysis, history_len: usize) -> Self {
        match analysis.intent {
            Intent::ReadyToBuy => Self::Closing,
            Intent::PriceFocused => Self::Negotiation,
            Intent::Comparison => Self::Qualification,
            Intent::Research | Intent::Undecided if history_len == 0 => Self::Greeting,
            Intent::Research | Intent::Undecided => Self::Discovery,
        }
    }
}

/// Structured read of one inbound message in the context of its conversation.
///
/// Analyses are never mutated; a newer message produces a new analysis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    pub conversation_id: ConversationId,
    pub lead_id: Option<LeadId>,
    pub mood: Mood,
    pub urgency: Urgency,
    pub intent: Intent,
    pub buying_signals: Vec<String>,
    pub risk_factors: Vec<String>,
    pub recommended_action: RecommendedAction,
    pub reasoning: String,
    pub confidence: u8,
    pub next_steps: Vec<String>,
}

impl ConversationAnalysis {
    pub fn has_signal(&self, phrase: &str) -> bool {
        self.buying_signals.iter().any(|signal| signal == phrase)
    }
}
