use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbTestId(pub String);

impl std::fmt::Display for AbTestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbTestStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl AbTestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Friendly,
    Enthusiastic,
    Consultative,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Enthusiastic => "enthusiastic",
            Self::Consultative => "consultative",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalizationLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLength {
    Short,
    Medium,
    Long,
}

impl ResponseLength {
    /// Upper bound on generated characters for this length class.
    pub fn max_chars(&self) -> usize {
        match self {
            Self::Short => 160,
            Self::Medium => 400,
            Self::Long => 800,
        }
    }
}

/// How a variant instructs the generator to answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStrategy {
    pub tone: Tone,
    pub personalization_level: PersonalizationLevel,
    pub response_length: ResponseLength,
    pub include_offers: bool,
    pub include_urgency: bool,
}

impl Default for ResponseStrategy {
    fn default() -> Self {
        Self {
            tone: Tone::Friendly,
            personalization_level: PersonalizationLevel::Medium,
            response_length: ResponseLength::Medium,
            include_offers: false,
            include_urgency: false,
        }
    }
}

/// Which leads an experiment applies to. Empty lists match every lead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segmentation {
    pub lead_sources: Vec<String>,
    pub vehicle_interests: Vec<String>,
    pub score_range: Option<(u8, u8)>,
}

/// Lead attributes evaluated against a segmentation predicate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadProfile {
    pub source: Option<String>,
    pub vehicle_interest: Option<String>,
    pub score: u8,
}

impl Segmentation {
    pub fn matches(&self, lead: &LeadProfile) -> bool {
        let source_ok = self.lead_sources.is_empty()
            || lead.source.as_deref().is_some_and(|source| {
                self.lead_sources.iter().any(|allowed| allowed.eq_ignore_ascii_case(source))
            });

        let interest_ok = self.vehicle_interests.is_empty()
            || lead.vehicle_interest.as_deref().is_some_and(|interest| {
                let interest = interest.to_ascii_lowercase();
                self.vehicle_interests
                    .iter()
                    .any(|wanted| interest.contains(&wanted.to_ascii_lowercase()))
            });

        let score_ok = self
            .score_range
            .map(|(min, max)| lead.score >= min && lead.score <= max)
            .unwrap_or(true);

        source_ok && interest_ok && score_ok
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPerformance {
    pub impressions: u64,
    pub responses: u64,
    pub conversions: u64,
    pub escalations: u64,
    pub total_response_time_ms: u64,
    pub timed_responses: u64,
}

impl VariantPerformance {
    pub fn response_rate(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.responses as f64 / self.impressions as f64
        }
    }

    pub fn average_response_time_ms(&self) -> Option<u64> {
        (self.timed_responses > 0).then(|| self.total_response_time_ms / self.timed_responses)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbTestVariant {
    pub id: String,
    pub name: String,
    pub weight: u8,
    pub strategy: ResponseStrategy,
    pub performance: VariantPerformance,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbTestConfiguration {
    pub id: AbTestId,
    pub name: String,
    pub status: AbTestStatus,
    pub segmentation: Segmentation,
    pub variants: Vec<AbTestVariant>,
    pub required_sample_size: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub winner_variant_id: Option<String>,
}

impl AbTestConfiguration {
    pub fn total_impressions(&self) -> u64 {
        self.variants.iter().map(|variant| variant.performance.impressions).sum()
    }

    pub fn variant(&self, variant_id: &str) -> Option<&AbTestVariant> {
        self.variants.iter().find(|variant| variant.id == variant_id)
    }
}

/// One observed interaction outcome for a variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOutcome {
    pub impression: bool,
    pub responded: bool,
    pub converted: bool,
    pub escalated: bool,
    pub response_time_ms: Option<u64>,
}

impl VariantOutcome {
    pub fn impression() -> Self {
        Self { impression: true, ..Self::default() }
    }

    pub fn responded(response_time_ms: Option<u64>) -> Self {
        Self { responded: true, response_time_ms, ..Self::default() }
    }
}

/// The variant handed to one lead for one response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAssignment {
    pub test_id: AbTestId,
    pub variant_id: String,
    pub strategy: ResponseStrategy,
}
