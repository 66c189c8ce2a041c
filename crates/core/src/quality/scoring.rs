//! Rule-based response effectiveness scoring.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::vocabulary;
use crate::domain::conversation::{ConversationId, LeadContext};
use crate::domain::quality::{
    BenchmarkTier, QualityDimensions, ResponseEffectivenessScore, ResponseImpact,
};

/// Substituted whenever scoring fails.
pub const NEUTRAL_SCORE: u8 = 70;
/// Below this a response sits in the lowest benchmark tier.
pub const AVERAGE_FLOOR: u8 = 60;
/// Dimensions below this get a recommendation.
pub const RECOMMENDATION_THRESHOLD: u8 = 70;

const MAX_RESPONSE_CHARS: usize = 5_000;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "could", "does", "from", "have", "just", "like", "more",
    "that", "them", "then", "there", "they", "this", "what", "when", "where", "which", "will",
    "with", "would", "your",
];

const CALL_TO_ACTION_TERMS: &[&str] = &[
    "schedule",
    "book",
    "call",
    "visit",
    "stop by",
    "come in",
    "test drive",
    "reply",
    "let me know",
    "reserve",
];

const UNPROFESSIONAL_TERMS: &[&str] = &["lol", "omg", "wtf", "gonna", "wanna", "dude", "u", "ur"];

const POLITE_TERMS: &[&str] = &["thank", "thanks", "please", "happy to", "appreciate", "glad to"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QualityError {
    #[error("response text is empty")]
    EmptyResponse,
    #[error("response is {chars} characters, above the scoring limit of {max}")]
    ResponseTooLong { chars: usize, max: usize },
}

/// What a sent response is scored against.
#[derive(Clone, Copy, Debug)]
pub struct ScoringInput<'a> {
    pub response_id: Option<&'a str>,
    pub conversation_id: &'a ConversationId,
    pub response: &'a str,
    pub original_message: &'a str,
    pub lead: &'a LeadContext,
    pub impact: ResponseImpact,
}

#[derive(Clone, Copy, Debug)]
pub struct EffectivenessScorer {
    industry_average: u8,
    top_performer: u8,
}

impl Default for EffectivenessScorer {
    fn default() -> Self {
        Self { industry_average: 72, top_performer: 88 }
    }
}

impl EffectivenessScorer {
    pub fn new(industry_average: u8, top_performer: u8) -> Self {
        Self { industry_average, top_performer }
    }

    pub fn score(
        &self,
        input: &ScoringInput<'_>,
        now: DateTime<Utc>,
    ) -> Result<ResponseEffectivenessScore, QualityError> {
        let chars = input.response.chars().count();
        if input.response.trim().is_empty() {
            return Err(QualityError::EmptyResponse);
        }
        if chars > MAX_RESPONSE_CHARS {
            return Err(QualityError::ResponseTooLong { chars, max: MAX_RESPONSE_CHARS });
        }

        let padded = vocabulary::word_padded(input.response);
        let dimensions = QualityDimensions {
            relevance: relevance(input.original_message, &padded),
            clarity: clarity(&padded),
            engagement: engagement(input.response, &padded),
            personalization: personalization(&padded, input.lead),
            actionability: actionability(input.response, &padded),
            professionalism: professionalism(&padded),
        };

        let overall =
            (dimensions.average() + input.impact.bonus()).round().clamp(0.0, 100.0) as u8;

        Ok(ResponseEffectivenessScore {
            response_id: response_id(input.response_id),
            conversation_id: input.conversation_id.clone(),
            overall,
            dimensions,
            impact: input.impact,
            benchmark: self.benchmark(overall),
            recommendations: self.recommendations(overall, &dimensions),
            degraded: false,
            scored_at: now,
        })
    }

    /// Placeholder score used when real scoring failed.
    pub fn neutral(&self, input: &ScoringInput<'_>, now: DateTime<Utc>) -> ResponseEffectivenessScore {
        ResponseEffectivenessScore {
            response_id: response_id(input.response_id),
            conversation_id: input.conversation_id.clone(),
            overall: NEUTRAL_SCORE,
            dimensions: QualityDimensions::uniform(NEUTRAL_SCORE),
            impact: input.impact,
            benchmark: self.benchmark(NEUTRAL_SCORE),
            recommendations: Vec::new(),
            degraded: true,
            scored_at: now,
        }
    }

    pub fn benchmark(&self, overall: u8) -> BenchmarkTier {
        if overall >= self.top_performer {
            BenchmarkTier::TopPerformer
        } else if overall >= self.industry_average {
            BenchmarkTier::AboveAverage
        } else if overall >= AVERAGE_FLOOR {
            BenchmarkTier::Average
        } else {
            BenchmarkTier::BelowAverage
        }
    }

    fn recommendations(&self, overall: u8, dimensions: &QualityDimensions) -> Vec<String> {
        let mut recommendations: Vec<String> = dimensions
            .named()
            .iter()
            .filter(|(_, value)| *value < RECOMMENDATION_THRESHOLD)
            .map(|(name, _)| dimension_advice(name).to_string())
            .collect();

        if overall < self.industry_average {
            recommendations.push(format!(
                "Overall score {overall} is below the industry average of {}",
                self.industry_average
            ));
        }
        recommendations
    }
}

fn response_id(supplied: Option<&str>) -> String {
    supplied.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn dimension_advice(dimension: &str) -> &'static str {
    match dimension {
        "relevance" => "Address the customer's question directly and reuse their wording",
        "clarity" => "Keep replies between 20 and 150 words",
        "engagement" => "Ask the customer a question to keep the conversation going",
        "personalization" => "Use the customer's name and mention the vehicle they asked about",
        "actionability" => "End with a clear next step such as booking a test drive",
        "professionalism" => "Keep the tone courteous and avoid slang",
        _ => "Review this dimension",
    }
}

fn significant_words(text: &str) -> Vec<String> {
    let padded = vocabulary::word_padded(text);
    let mut words: Vec<String> = Vec::new();
    for word in padded.split_whitespace() {
        if word.chars().count() >= 4 && !STOPWORDS.contains(&word) && !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

fn relevance(original_message: &str, padded_response: &str) -> u8 {
    let words = significant_words(original_message);
    if words.is_empty() {
        return NEUTRAL_SCORE;
    }
    let overlap =
        words.iter().filter(|word| vocabulary::contains_phrase(padded_response, word)).count();
    (40.0 + 60.0 * overlap as f64 / words.len() as f64).round() as u8
}

fn clarity(padded_response: &str) -> u8 {
    match padded_response.split_whitespace().count() {
        20..=150 => 90,
        10..=19 | 151..=250 => 70,
        _ => 50,
    }
}

fn engagement(response: &str, padded_response: &str) -> u8 {
    let mut score = 50u8;
    if response.contains('?') {
        score += 30;
    }
    if response.contains('!') {
        score += 10;
    }
    if vocabulary::contains_phrase(padded_response, "you")
        || vocabulary::contains_phrase(padded_response, "your")
    {
        score += 10;
    }
    score.min(100)
}

fn personalization(padded_response: &str, lead: &LeadContext) -> u8 {
    let mut score = 20u8;

    let names_customer = lead
        .name
        .as_deref()
        .and_then(|name| name.split_whitespace().next())
        .is_some_and(|first| vocabulary::contains_phrase(padded_response, &first.to_lowercase()));
    if names_customer {
        score += 40;
    }

    let mentions_vehicle = lead.vehicle_interest.as_deref().is_some_and(|interest| {
        vocabulary::word_padded(interest)
            .split_whitespace()
            .filter(|word| word.chars().count() >= 3)
            .any(|word| vocabulary::contains_phrase(padded_response, word))
    });
    if mentions_vehicle {
        score += 40;
    }
    score
}

fn actionability(response: &str, padded_response: &str) -> u8 {
    let mut score = 40u8;
    if response.contains('?') {
        score += 30;
    }
    if CALL_TO_ACTION_TERMS.iter().any(|term| vocabulary::contains_phrase(padded_response, term)) {
        score += 30;
    }
    score
}

fn professionalism(padded_response: &str) -> u8 {
    let slang = UNPROFESSIONAL_TERMS
        .iter()
        .filter(|term| vocabulary::contains_phrase(padded_response, term))
        .count() as i32;
    let polite = POLITE_TERMS.iter().any(|term| vocabulary::contains_phrase(padded_response, term));

    let score = 80 - 20 * slang + if polite { 10 } else { 0 };
    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{EffectivenessScorer, QualityError, ScoringInput};
    use crate::domain::conversation::{ConversationId, LeadContext};
    use crate::domain::quality::{BenchmarkTier, ResponseImpact};

    fn lead() -> LeadContext {
        LeadContext {
            name: Some("Maria Lopez".to_string()),
            vehicle_interest: Some("Toyota RAV4".to_string()),
            source: None,
        }
    }

    fn input<'a>(
        id: &'a ConversationId,
        response: &'a str,
        original: &'a str,
        lead: &'a LeadContext,
        impact: ResponseImpact,
    ) -> ScoringInput<'a> {
        ScoringInput {
            response_id: Some("resp-1"),
            conversation_id: id,
            response,
            original_message: original,
            lead,
            impact,
        }
    }

    #[test]
    fn strong_personalized_reply_scores_well() {
        let scorer = EffectivenessScorer::default();
        let id = ConversationId("conv-1".to_string());
        let lead = lead();
        let response = "Thanks for asking, Maria! The RAV4 hybrid gets excellent mileage and the \
                        financing offers this month are strong. Would you like to schedule a test \
                        drive this Saturday so you can see it for yourself?";
        let original = "What mileage does the RAV4 hybrid get and is there financing?";

        let score = scorer
            .score(&input(&id, response, original, &lead, ResponseImpact::default()), Utc::now())
            .expect("scored");

        assert_eq!(score.dimensions.personalization, 100);
        assert_eq!(score.dimensions.actionability, 100);
        assert_eq!(score.dimensions.relevance, 100);
        assert!(score.overall >= 88, "overall {}", score.overall);
        assert_eq!(score.benchmark, BenchmarkTier::TopPerformer);
        assert_eq!(score.response_id, "resp-1");
        assert!(!score.degraded);
    }

    #[test]
    fn terse_generic_reply_gets_recommendations() {
        let scorer = EffectivenessScorer::default();
        let id = ConversationId("conv-1".to_string());
        let lead = lead();

        let score = scorer
            .score(
                &input(&id, "ok lol", "Do you have the RAV4 in blue?", &lead, ResponseImpact::default()),
                Utc::now(),
            )
            .expect("scored");

        assert_eq!(score.benchmark, BenchmarkTier::BelowAverage);
        assert!(score.recommendations.iter().any(|r| r.contains("name")));
        assert!(score.recommendations.iter().any(|r| r.contains("industry average")));
        assert_eq!(score.dimensions.professionalism, 60);
    }

    #[test]
    fn impact_bonus_lifts_overall_and_is_capped() {
        let scorer = EffectivenessScorer::default();
        let id = ConversationId("conv-1".to_string());
        let lead = lead();
        let response = "Hi Maria, the RAV4 is available. Want to book a visit?";
        let original = "Is the RAV4 available?";
        let impact = ResponseImpact {
            customer_replied: true,
            sentiment_delta: 2,
            stage_advanced: true,
            new_buying_signal: true,
        };

        let without = scorer
            .score(&input(&id, response, original, &lead, ResponseImpact::default()), Utc::now())
            .expect("scored");
        let with = scorer.score(&input(&id, response, original, &lead, impact), Utc::now()).expect("scored");

        assert!(with.overall > without.overall);
        assert!(with.overall <= 100);
    }

    #[test]
    fn empty_response_is_a_scoring_error() {
        let scorer = EffectivenessScorer::default();
        let id = ConversationId("conv-1".to_string());
        let lead = LeadContext::default();

        assert_eq!(
            scorer.score(&input(&id, "  ", "hello", &lead, ResponseImpact::default()), Utc::now()),
            Err(QualityError::EmptyResponse)
        );
        let neutral = scorer.neutral(&input(&id, "  ", "hello", &lead, ResponseImpact::default()), Utc::now());
        assert_eq!(neutral.overall, 70);
        assert!(neutral.degraded);
    }

    #[test]
    fn benchmark_tiers_follow_fixed_cut_points() {
        let scorer = EffectivenessScorer::default();

        assert_eq!(scorer.benchmark(95), BenchmarkTier::TopPerformer);
        assert_eq!(scorer.benchmark(88), BenchmarkTier::TopPerformer);
        assert_eq!(scorer.benchmark(72), BenchmarkTier::AboveAverage);
        assert_eq!(scorer.benchmark(65), BenchmarkTier::Average);
        assert_eq!(scorer.benchmark(40), BenchmarkTier::BelowAverage);
    }
}
