use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingType {
    AiGenerated,
    TemplateBased,
    HumanEscalation,
    AutomatedAction,
}

impl RoutingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiGenerated => "ai_generated",
            Self::TemplateBased => "template_based",
            Self::HumanEscalation => "human_escalation",
            Self::AutomatedAction => "automated_action",
        }
    }
}

/// Ordered from most to least pressing, so `min` picks the stronger priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPriority {
    Immediate,
    Urgent,
    Normal,
    Low,
}

impl RoutingPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Urgent => "urgent",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub routing_type: RoutingType,
    pub confidence: u8,
    pub reasoning: String,
    pub template_id: Option<String>,
    pub escalation_reason: Option<String>,
    pub required_actions: Vec<String>,
    pub priority: RoutingPriority,
}

impl RoutingDecision {
    pub fn is_escalation(&self) -> bool {
        self.routing_type == RoutingType::HumanEscalation
    }
}
