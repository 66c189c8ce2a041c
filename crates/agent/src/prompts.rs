//! Prompt assembly for the generation service.

use std::fmt::Write as _;

use closer_core::domain::conversation::{ConversationAnalysis, ConversationMessage, LeadContext};
use closer_core::domain::experiment::{PersonalizationLevel, ResponseStrategy};
use closer_core::domain::quality::PersonalizationProfile;

use crate::llm::GenerationRequest;

const RECENT_MESSAGES: usize = 6;

pub struct PromptInput<'a> {
    pub message: &'a str,
    pub history: &'a [ConversationMessage],
    pub analysis: &'a ConversationAnalysis,
    pub lead: &'a LeadContext,
    pub strategy: &'a ResponseStrategy,
    pub profile: &'a PersonalizationProfile,
}

pub fn first_name(lead: &LeadContext) -> Option<&str> {
    lead.name.as_deref().and_then(|name| name.split_whitespace().next())
}

pub fn build_generation_request(input: &PromptInput<'_>) -> GenerationRequest {
    let strategy = input.strategy;
    let max_chars = strategy.response_length.max_chars();

    let mut system_prompt = format!(
        "You are a car dealership sales assistant replying to a customer by text message. \
         Write in a {} tone. Keep the reply under {max_chars} characters. \
         Never quote prices, discounts or payment figures; offer to have the sales team \
         confirm numbers instead.",
        strategy.tone.as_str()
    );
    if strategy.include_offers {
        system_prompt.push_str(" Mention that current promotions are available.");
    }
    if strategy.include_urgency {
        system_prompt.push_str(" Note politely that inventory moves quickly.");
    }
    if !input.profile.preferred_topics.is_empty() {
        let _ = write!(
            system_prompt,
            " Customers like this one respond well to talk about {}.",
            input.profile.preferred_topics.join(", ")
        );
    }

    let personalize = strategy.personalization_level != PersonalizationLevel::Low;
    let mut prompt = String::new();
    if personalize && input.profile.name_usage_rate >= 0.5 {
        if let Some(name) = first_name(input.lead) {
            let _ = writeln!(prompt, "Customer first name: {name}");
        }
    }
    if personalize && input.profile.vehicle_reference_rate >= 0.5 {
        if let Some(vehicle) = input.lead.vehicle_interest.as_deref() {
            let _ = writeln!(prompt, "Vehicle of interest: {vehicle}");
        }
    }

    let analysis = input.analysis;
    let _ = writeln!(
        prompt,
        "Customer mood: {}. Intent: {}. Urgency: {}.",
        analysis.mood.as_str(),
        analysis.intent.as_str(),
        analysis.urgency.as_str()
    );
    if !analysis.buying_signals.is_empty() {
        let _ = writeln!(prompt, "Buying signals: {}.", analysis.buying_signals.join(", "));
    }
    if !analysis.risk_factors.is_empty() {
        let _ = writeln!(prompt, "Concerns to address: {}.", analysis.risk_factors.join(", "));
    }
    if let Some(step) = analysis.next_steps.first() {
        let _ = writeln!(prompt, "Goal for this reply: {step}.");
    }

    let skip = input.history.len().saturating_sub(RECENT_MESSAGES);
    if input.history.len() > skip {
        prompt.push_str("\nRecent conversation:\n");
        for message in &input.history[skip..] {
            let speaker = if message.is_from_agent { "Agent" } else { "Customer" };
            let _ = writeln!(prompt, "{speaker}: {}", message.content);
        }
    }
    let _ = write!(prompt, "\nCustomer: {}\nAgent:", input.message.trim());

    GenerationRequest { system_prompt, prompt, max_chars, tone: strategy.tone }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use closer_core::analysis::{AnalysisRequest, ConversationAnalyzer};
    use closer_core::domain::conversation::{ConversationId, ConversationMessage, LeadContext};
    use closer_core::domain::experiment::{PersonalizationLevel, ResponseStrategy, Tone};
    use closer_core::quality::PersonalizationTuner;
    use closer_core::domain::quality::LeadSegment;

    use super::{build_generation_request, first_name, PromptInput};

    fn lead() -> LeadContext {
        LeadContext {
            name: Some("Maria Lopez".to_string()),
            vehicle_interest: Some("Toyota RAV4 Hybrid".to_string()),
            source: Some("website".to_string()),
        }
    }

    #[test]
    fn prompt_carries_personalization_and_analysis() {
        let id = ConversationId("conv-1".to_string());
        let lead = lead();
        let analysis = ConversationAnalyzer::default()
            .analyze(&AnalysisRequest::new(&id, "What's the best price on the RAV4?"));
        let profile = PersonalizationTuner::new(10, Utc::now()).profile(LeadSegment::Electric);
        let history = vec![ConversationMessage::agent("Hi Maria, thanks for your interest!", Utc::now())];
        let strategy = ResponseStrategy { tone: Tone::Consultative, ..ResponseStrategy::default() };

        let request = build_generation_request(&PromptInput {
            message: "What's the best price on the RAV4?",
            history: &history,
            analysis: &analysis,
            lead: &lead,
            strategy: &strategy,
            profile: &profile,
        });

        assert!(request.system_prompt.contains("consultative tone"));
        assert!(request.prompt.contains("Customer first name: Maria"));
        assert!(request.prompt.contains("Vehicle of interest: Toyota RAV4 Hybrid"));
        assert!(request.prompt.contains("Agent: Hi Maria"));
        assert!(request.prompt.ends_with("Agent:"));
        assert_eq!(request.max_chars, 400);
    }

    #[test]
    fn low_personalization_leaves_out_lead_details() {
        let id = ConversationId("conv-2".to_string());
        let lead = lead();
        let analysis = ConversationAnalyzer::default().analyze(&AnalysisRequest::new(&id, "hello"));
        let profile = PersonalizationTuner::new(10, Utc::now()).profile(LeadSegment::General);
        let strategy = ResponseStrategy {
            personalization_level: PersonalizationLevel::Low,
            ..ResponseStrategy::default()
        };

        let request = build_generation_request(&PromptInput {
            message: "hello",
            history: &[],
            analysis: &analysis,
            lead: &lead,
            strategy: &strategy,
            profile: &profile,
        });

        assert!(!request.prompt.contains("Maria"));
        assert_eq!(first_name(&lead), Some("Maria"));
    }
}
