use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    BuyingSignal,
    Complaint,
    ComplexRequest,
    HighValue,
    UrgentTimeline,
    CompetitorMention,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyingSignal => "buying_signal",
            Self::Complaint => "complaint",
            Self::ComplexRequest => "complex_request",
            Self::HighValue => "high_value",
            Self::UrgentTimeline => "urgent_timeline",
            Self::CompetitorMention => "competitor_mention",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    Immediate,
    Scheduled,
    Queue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTrigger {
    pub id: String,
    pub trigger_type: TriggerType,
    pub threshold: u8,
    pub action: EscalationAction,
    pub notification_required: bool,
    /// Lower values are evaluated first.
    pub priority: u8,
    pub cooldown_secs: i64,
    pub reason: String,
}

/// Static trigger definitions, kept sorted by priority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCatalog {
    triggers: Vec<EscalationTrigger>,
}

impl TriggerCatalog {
    pub fn new(mut triggers: Vec<EscalationTrigger>) -> Self {
        triggers.sort_by_key(|trigger| trigger.priority);
        Self { triggers }
    }

    /// The stock catalog with every cooldown set to `cooldown_secs`.
    pub fn with_cooldown(cooldown_secs: i64) -> Self {
        let trigger = |id: &str,
                       trigger_type: TriggerType,
                       threshold: u8,
                       action: EscalationAction,
                       notification_required: bool,
                       priority: u8,
                       reason: &str| EscalationTrigger {
            id: id.to_string(),
            trigger_type,
            threshold,
            action,
            notification_required,
            priority,
            cooldown_secs,
            reason: reason.to_string(),
        };

        Self::new(vec![
            trigger(
                "strong_buying_signal",
                TriggerType::BuyingSignal,
                80,
                EscalationAction::Immediate,
                true,
                1,
                "Customer is showing strong buying signals",
            ),
            trigger(
                "customer_complaint",
                TriggerType::Complaint,
                75,
                EscalationAction::Immediate,
                true,
                2,
                "Customer is frustrated or raising a complaint",
            ),
            trigger(
                "urgent_timeline",
                TriggerType::UrgentTimeline,
                80,
                EscalationAction::Immediate,
                true,
                3,
                "Customer needs an answer on a critical timeline",
            ),
            trigger(
                "high_value_lead",
                TriggerType::HighValue,
                80,
                EscalationAction::Scheduled,
                true,
                4,
                "High-value lead with purchase intent",
            ),
            trigger(
                "complex_request",
                TriggerType::ComplexRequest,
                65,
                EscalationAction::Queue,
                false,
                5,
                "Request needs specialist handling",
            ),
            trigger(
                "competitor_mention",
                TriggerType::CompetitorMention,
                70,
                EscalationAction::Queue,
                false,
                6,
                "Customer is weighing a competitor offer",
            ),
        ])
    }

    pub fn triggers(&self) -> &[EscalationTrigger] {
        &self.triggers
    }

    pub fn get(&self, id: &str) -> Option<&EscalationTrigger> {
        self.triggers.iter().find(|trigger| trigger.id == id)
    }
}

impl Default for TriggerCatalog {
    fn default() -> Self {
        Self::with_cooldown(30 * 60)
    }
}
