//! Template matching against the current message and lead context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::vocabulary;
use crate::catalog::{ResponseTemplate, TemplateCatalog, TemplateCategory};
use crate::domain::conversation::{Intent, LeadContext};

/// Points per use-condition keyword present in the message.
pub const USE_CONDITION_POINTS: f64 = 25.0;
/// Bonus when a template tag matches the lead's vehicle interest.
pub const TAG_MATCH_POINTS: f64 = 20.0;
/// Share of the template's effectiveness added to its score.
pub const EFFECTIVENESS_WEIGHT: f64 = 0.3;

/// A scored template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub template: ResponseTemplate,
    pub score: u8,
    pub matched_conditions: Vec<String>,
}

impl TemplateMatch {
    pub fn template_id(&self) -> &str {
        &self.template.id
    }
}

/// Category x intent relevance, 0 to 35.
pub fn category_relevance(category: TemplateCategory, intent: Intent) -> f64 {
    use Intent::*;
    use TemplateCategory::*;

    match (category, intent) {
        (Pricing, PriceFocused) | (Scheduling, ReadyToBuy) => 35.0,
        (ObjectionHandling, Undecided) => 30.0,
        (Information, Research) | (Information, Comparison) | (Scheduling, Comparison) => 25.0,
        (Pricing, ReadyToBuy) | (ObjectionHandling, PriceFocused) | (Followup, Undecided) => 20.0,
        (Pricing, Comparison) | (Scheduling, Research) => 15.0,
        (Greeting, Research) | (Information, Undecided) => 10.0,
        _ => 0.0,
    }
}

#[derive(Clone, Debug, Default)]
pub struct TemplateMatcher {
    catalog: Arc<TemplateCatalog>,
}

impl TemplateMatcher {
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<TemplateCatalog> {
        &self.catalog
    }

    /// Scores one template. Capped at 100.
    pub fn score_template(
        &self,
        template: &ResponseTemplate,
        message: &str,
        intent: Intent,
        lead: &LeadContext,
    ) -> TemplateMatch {
        let padded = vocabulary::word_padded(message);
        score_against(template, &padded, intent, lead)
    }

    /// Every catalog template, best first. Equal scores keep catalog order.
    pub fn ranked(&self, message: &str, intent: Intent, lead: &LeadContext) -> Vec<TemplateMatch> {
        let padded = vocabulary::word_padded(message);
        let mut matches: Vec<TemplateMatch> = self
            .catalog
            .snapshot()
            .iter()
            .map(|template| score_against(template, &padded, intent, lead))
            .collect();
        matches.sort_by(|left, right| right.score.cmp(&left.score));
        matches
    }

    /// The highest-scoring template, or the acknowledge-and-redirect fallback with score 0
    /// when the catalog is empty or nothing scores.
    pub fn best_match(&self, message: &str, intent: Intent, lead: &LeadContext) -> TemplateMatch {
        self.ranked(message, intent, lead)
            .into_iter()
            .next()
            .filter(|candidate| candidate.score > 0)
            .unwrap_or_else(|| TemplateMatch {
                template: self.catalog.fallback().clone(),
                score: 0,
                matched_conditions: Vec::new(),
            })
    }
}

fn score_against(
    template: &ResponseTemplate,
    padded_message: &str,
    intent: Intent,
    lead: &LeadContext,
) -> TemplateMatch {
    let matched_conditions: Vec<String> = template
        .use_conditions
        .iter()
        .filter(|condition| vocabulary::contains_phrase(padded_message, &condition.to_lowercase()))
        .cloned()
        .collect();

    let interest = lead.vehicle_interest.as_deref().map(str::to_lowercase).unwrap_or_default();
    let tag_matches = !interest.is_empty()
        && template.applicable_tags.iter().any(|tag| interest.contains(&tag.to_lowercase()));

    let mut score = USE_CONDITION_POINTS * matched_conditions.len() as f64;
    if tag_matches {
        score += TAG_MATCH_POINTS;
    }
    score += category_relevance(template.category, intent);
    score += EFFECTIVENESS_WEIGHT * f64::from(template.effectiveness);

    TemplateMatch {
        template: template.clone(),
        score: score.round().clamp(0.0, 100.0) as u8,
        matched_conditions,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{category_relevance, TemplateMatcher};
    use crate::catalog::{TemplateCatalog, TemplateCategory, FALLBACK_TEMPLATE_ID};
    use crate::domain::conversation::{Intent, LeadContext};

    fn lead(interest: &str) -> LeadContext {
        LeadContext { vehicle_interest: Some(interest.to_string()), ..Default::default() }
    }

    #[test]
    fn pricing_question_picks_pricing_template() {
        let matcher = TemplateMatcher::default();
        let best = matcher.best_match(
            "How much is the price with the current discount?",
            Intent::PriceFocused,
            &lead("2024 Honda Accord sedan"),
        );

        assert_eq!(best.template_id(), "pricing_breakdown");
        assert!(best.score > 70, "score was {}", best.score);
        assert_eq!(best.matched_conditions, vec!["price", "how much", "discount"]);
    }

    #[test]
    fn empty_catalog_falls_back_with_zero_score() {
        let matcher = TemplateMatcher::new(Arc::new(TemplateCatalog::empty()));
        let best = matcher.best_match("anything at all", Intent::Research, &LeadContext::default());

        assert_eq!(best.template_id(), FALLBACK_TEMPLATE_ID);
        assert_eq!(best.score, 0);
    }

    #[test]
    fn score_is_monotonic_in_keyword_overlap() {
        let matcher = TemplateMatcher::default();
        let catalog = TemplateCatalog::default();
        let template = catalog.get("pricing_breakdown").expect("template exists");
        let context = LeadContext::default();

        let messages = [
            "tell me more",
            "what is the price",
            "what is the price and how much off",
            "what is the price and how much is the discount on this deal",
        ];
        let scores: Vec<u8> = messages
            .iter()
            .map(|message| matcher.score_template(&template, message, Intent::Research, &context).score)
            .collect();

        assert!(scores.windows(2).all(|pair| pair[0] <= pair[1]), "scores {scores:?}");
    }

    #[test]
    fn keywords_match_on_word_boundaries() {
        let matcher = TemplateMatcher::default();
        let catalog = TemplateCatalog::default();
        let template = catalog.get("greeting_welcome").expect("template exists");

        let matched = matcher.score_template(&template, "this thing", Intent::Research, &lead(""));
        assert!(matched.matched_conditions.is_empty());
    }

    #[test]
    fn tag_bonus_requires_stated_interest() {
        let matcher = TemplateMatcher::default();
        let catalog = TemplateCatalog::default();
        let template = catalog.get("schedule_test_drive").expect("template exists");

        let with_tag =
            matcher.score_template(&template, "hello", Intent::Research, &lead("Ford F-150 truck"));
        let without_tag =
            matcher.score_template(&template, "hello", Intent::Research, &LeadContext::default());

        assert_eq!(with_tag.score - without_tag.score, 20);
    }

    #[test]
    fn relevance_table_stays_within_bounds() {
        let categories = [
            TemplateCategory::Greeting,
            TemplateCategory::Information,
            TemplateCategory::Pricing,
            TemplateCategory::Scheduling,
            TemplateCategory::Followup,
            TemplateCategory::ObjectionHandling,
        ];
        let intents = [
            Intent::Research,
            Intent::Comparison,
            Intent::ReadyToBuy,
            Intent::PriceFocused,
            Intent::Undecided,
        ];

        for category in categories {
            for intent in intents {
                let relevance = category_relevance(category, intent);
                assert!((0.0..=35.0).contains(&relevance));
            }
        }
    }
}
