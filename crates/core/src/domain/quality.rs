use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{ConversationAnalysis, ConversationId, ConversationStage};
use crate::domain::experiment::Tone;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDimensions {
    pub relevance: u8,
    pub clarity: u8,
    pub engagement: u8,
    pub personalization: u8,
    pub actionability: u8,
    pub professionalism: u8,
}

impl QualityDimensions {
    pub fn uniform(value: u8) -> Self {
        Self {
            relevance: value,
            clarity: value,
            engagement: value,
            personalization: value,
            actionability: value,
            professionalism: value,
        }
    }

    pub fn average(&self) -> f64 {
        self.named().iter().map(|(_, value)| f64::from(*value)).sum::<f64>() / 6.0
    }

    pub fn named(&self) -> [(&'static str, u8); 6] {
        [
            ("relevance", self.relevance),
            ("clarity", self.clarity),
            ("engagement", self.engagement),
            ("personalization", self.personalization),
            ("actionability", self.actionability),
            ("professionalism", self.professionalism),
        ]
    }
}

/// What happened in the conversation after a response was sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseImpact {
    pub customer_replied: bool,
    pub sentiment_delta: i8,
    pub stage_advanced: bool,
    pub new_buying_signal: bool,
}

impl ResponseImpact {
    /// Compares the analysis of the message a response answered with the analysis of the
    /// customer's follow-up, if there was one.
    pub fn between(
        before: &ConversationAnalysis,
        before_history_len: usize,
        after: Option<&ConversationAnalysis>,
    ) -> Self {
        let Some(after) = after else {
            return Self::default();
        };

        let stage_before = ConversationStage::from_analysis(before, before_history_len);
        let stage_after = ConversationStage::from_analysis(after, before_history_len + 1);

        Self {
            customer_replied: true,
            sentiment_delta: after.mood.sentiment() - before.mood.sentiment(),
            stage_advanced: stage_after > stage_before,
            new_buying_signal: after.buying_signals.iter().any(|signal| !before.has_signal(signal)),
        }
    }

    pub fn bonus(&self) -> f64 {
        let mut bonus = 0.0;
        if self.customer_replied {
            bonus += 10.0;
        }
        bonus += 2.0 * f64::from(self.sentiment_delta);
        if self.stage_advanced {
            bonus += 8.0;
        }
        if self.new_buying_signal {
            bonus += 15.0;
        }
        bonus
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkTier {
    BelowAverage,
    Average,
    AboveAverage,
    TopPerformer,
}

impl BenchmarkTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelowAverage => "below_average",
            Self::Average => "average",
            Self::AboveAverage => "above_average",
            Self::TopPerformer => "top_performer",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseEffectivenessScore {
    pub response_id: String,
    pub conversation_id: ConversationId,
    pub overall: u8,
    pub dimensions: QualityDimensions,
    pub impact: ResponseImpact,
    pub benchmark: BenchmarkTier,
    pub recommendations: Vec<String>,
    pub degraded: bool,
    pub scored_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSegment {
    Luxury,
    Truck,
    Family,
    Electric,
    General,
}

impl LeadSegment {
    pub const ALL: [LeadSegment; 5] =
        [Self::Luxury, Self::Truck, Self::Family, Self::Electric, Self::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Luxury => "luxury",
            Self::Truck => "truck",
            Self::Family => "family",
            Self::Electric => "electric",
            Self::General => "general",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationProfile {
    pub segment: LeadSegment,
    pub name_usage_rate: f64,
    pub vehicle_reference_rate: f64,
    pub preferred_tone: Tone,
    pub preferred_topics: Vec<String>,
    pub effectiveness: f64,
    pub sample_count: usize,
    pub last_updated: DateTime<Utc>,
}
