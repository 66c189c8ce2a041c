//! Conversation analysis: turns an inbound message plus the customer side of the history
//! into mood, urgency, intent, buying signals, risk factors and a recommended action.

mod cache;

pub use cache::{AnalysisCache, CacheKey};

use serde::{Deserialize, Serialize};

use crate::catalog::vocabulary::{
    self, DEFAULT_INTENT, DEFAULT_URGENCY, INTENT_PATTERNS, MOOD_RULES, RISK_PHRASES,
    URGENCY_TIERS, VERY_POSITIVE_MIN_HITS,
};
use crate::catalog::SignalCatalog;
use crate::domain::conversation::{
    ConversationAnalysis, ConversationId, ConversationMessage, Intent, LeadContext, LeadId, Mood,
    RecommendedAction, Urgency,
};

pub const EMPTY_CONVERSATION_CONFIDENCE: u8 = 30;

const BASE_CONFIDENCE: u32 = 50;
const HISTORY_CONFIDENCE_STEP: u32 = 5;
const HISTORY_CONFIDENCE_CAP: u32 = 30;
const SIGNAL_CONFIDENCE_STEP: u32 = 10;
const SIGNAL_CONFIDENCE_CAP: u32 = 20;

/// Everything the analyzer looks at for one message.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisRequest<'a> {
    pub conversation_id: &'a ConversationId,
    pub lead_id: Option<&'a LeadId>,
    pub message: &'a str,
    pub history: &'a [ConversationMessage],
    pub lead: Option<&'a LeadContext>,
}

impl<'a> AnalysisRequest<'a> {
    pub fn new(conversation_id: &'a ConversationId, message: &'a str) -> Self {
        Self { conversation_id, lead_id: None, message, history: &[], lead: None }
    }

    pub fn with_history(mut self, history: &'a [ConversationMessage]) -> Self {
        self.history = history;
        self
    }

    pub fn with_lead(mut self, lead_id: Option<&'a LeadId>, lead: &'a LeadContext) -> Self {
        self.lead_id = lead_id;
        self.lead = Some(lead);
        self
    }

    /// Number of prior customer-authored messages.
    pub fn customer_history_len(&self) -> usize {
        self.history.iter().filter(|message| !message.is_from_agent).count()
    }
}

/// Facts the recommended-action table is evaluated against.
#[derive(Clone, Copy, Debug)]
struct ActionFacts {
    strong_signal: bool,
    signal_count: usize,
    best_price_signal: bool,
    urgency: Urgency,
    intent: Intent,
    mood: Mood,
}

struct ActionRule {
    action: RecommendedAction,
    reason: &'static str,
    applies: fn(&ActionFacts) -> bool,
}

const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        action: RecommendedAction::Escalate,
        reason: "strong buying signal or critical urgency needs a human now",
        applies: |facts| facts.strong_signal || facts.urgency == Urgency::Critical,
    },
    ActionRule {
        action: RecommendedAction::UrgentFollowup,
        reason: "customer is ready to buy or showing several buying signals",
        applies: |facts| facts.intent == Intent::ReadyToBuy || facts.signal_count >= 3,
    },
    ActionRule {
        action: RecommendedAction::ScheduleCall,
        reason: "high urgency or an excited customer with buying signals",
        applies: |facts| {
            facts.urgency == Urgency::High || (facts.mood == Mood::Excited && facts.signal_count >= 1)
        },
    },
    ActionRule {
        action: RecommendedAction::SendOffer,
        reason: "customer is focused on price",
        applies: |facts| facts.intent == Intent::PriceFocused || facts.best_price_signal,
    },
];

const CONTINUE_REASON: &str = "no decisive signal yet, keep the conversation going";

#[derive(Clone, Debug, Default)]
pub struct ConversationAnalyzer {
    signals: SignalCatalog,
}

impl ConversationAnalyzer {
    pub fn new(signals: SignalCatalog) -> Self {
        Self { signals }
    }

    pub fn signals(&self) -> &SignalCatalog {
        &self.signals
    }

    /// Pure function of the request: identical requests yield identical analyses.
    pub fn analyze(&self, request: &AnalysisRequest<'_>) -> ConversationAnalysis {
        let history_len = request.customer_history_len();
        let text = customer_text(request);

        if text.is_empty() {
            return default_analysis(request);
        }

        let mood = classify_mood(&text);
        let urgency = classify_urgency(&text);
        let intent = classify_intent(&text);
        let buying_signals = self.signals.detect(&text);
        let risk_factors = vocabulary::matching_terms(&text, RISK_PHRASES);

        let facts = ActionFacts {
            strong_signal: buying_signals.iter().any(|signal| self.signals.is_strong(signal)),
            signal_count: buying_signals.len(),
            best_price_signal: buying_signals.iter().any(|signal| signal == "best price"),
            urgency,
            intent,
            mood,
        };
        let (recommended_action, rule_reason) = recommend(&facts);

        let confidence = confidence(history_len, buying_signals.len());
        let vehicle = request.lead.and_then(|lead| lead.vehicle_interest.as_deref());
        let next_steps = next_steps(recommended_action, vehicle, &risk_factors);

        let reasoning = format!(
            "{rule_reason}; mood {}, urgency {}, intent {}, {} buying signal(s), {} risk factor(s)",
            mood.as_str(),
            urgency.as_str(),
            intent.as_str(),
            buying_signals.len(),
            risk_factors.len()
        );

        ConversationAnalysis {
            conversation_id: request.conversation_id.clone(),
            lead_id: request.lead_id.cloned(),
            mood,
            urgency,
            intent,
            buying_signals,
            risk_factors,
            recommended_action,
            reasoning,
            confidence,
            next_steps,
        }
    }

    /// Analyzes a set of active conversations and ranks them most urgent first.
    pub fn rank(&self, requests: &[AnalysisRequest<'_>]) -> Vec<PrioritizedConversation> {
        prioritize(requests.iter().map(|request| self.analyze(request)).collect())
    }
}

fn customer_text(request: &AnalysisRequest<'_>) -> String {
    let mut parts: Vec<&str> = request
        .history
        .iter()
        .filter(|message| !message.is_from_agent)
        .map(|message| message.content.as_str())
        .collect();
    parts.push(request.message);
    vocabulary::normalize(&parts.join(" "))
}

fn default_analysis(request: &AnalysisRequest<'_>) -> ConversationAnalysis {
    ConversationAnalysis {
        conversation_id: request.conversation_id.clone(),
        lead_id: request.lead_id.cloned(),
        mood: Mood::Neutral,
        urgency: DEFAULT_URGENCY,
        intent: DEFAULT_INTENT,
        buying_signals: Vec::new(),
        risk_factors: Vec::new(),
        recommended_action: RecommendedAction::Continue,
        reasoning: "no customer messages to analyze yet".to_string(),
        confidence: EMPTY_CONVERSATION_CONFIDENCE,
        next_steps: vec![
            "Send a friendly welcome message".to_string(),
            "Ask which vehicle they are interested in".to_string(),
        ],
    }
}

fn classify_mood(text: &str) -> Mood {
    let padded = vocabulary::word_padded(text);
    for (mood, terms) in MOOD_RULES {
        let hits: usize = terms.iter().map(|term| vocabulary::count_phrase(&padded, term)).sum();
        if hits == 0 {
            continue;
        }
        if *mood == Mood::Positive && hits >= VERY_POSITIVE_MIN_HITS {
            return Mood::VeryPositive;
        }
        return *mood;
    }
    Mood::Neutral
}

fn classify_urgency(text: &str) -> Urgency {
    URGENCY_TIERS
        .iter()
        .find(|(_, terms)| terms.iter().any(|term| text.contains(term)))
        .map(|(urgency, _)| *urgency)
        .unwrap_or(DEFAULT_URGENCY)
}

fn classify_intent(text: &str) -> Intent {
    let padded = format!(" {text} ");
    INTENT_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|pattern| padded.contains(pattern)))
        .map(|(intent, _)| *intent)
        .unwrap_or(DEFAULT_INTENT)
}

fn recommend(facts: &ActionFacts) -> (RecommendedAction, &'static str) {
    ACTION_RULES
        .iter()
        .find(|rule| (rule.applies)(facts))
        .map(|rule| (rule.action, rule.reason))
        .unwrap_or((RecommendedAction::Continue, CONTINUE_REASON))
}

fn confidence(history_len: usize, signal_count: usize) -> u8 {
    let history = (HISTORY_CONFIDENCE_STEP * history_len as u32).min(HISTORY_CONFIDENCE_CAP);
    let signals = (SIGNAL_CONFIDENCE_STEP * signal_count as u32).min(SIGNAL_CONFIDENCE_CAP);
    (BASE_CONFIDENCE + history + signals).min(100) as u8
}

fn next_steps(
    action: RecommendedAction,
    vehicle: Option<&str>,
    risk_factors: &[String],
) -> Vec<String> {
    let vehicle = vehicle.unwrap_or("the vehicle");
    let mut steps = match action {
        RecommendedAction::Escalate => vec![
            "Notify a sales manager now".to_string(),
            format!("Prepare purchase paperwork for {vehicle}"),
            "Confirm availability and final pricing".to_string(),
        ],
        RecommendedAction::UrgentFollowup => vec![
            "Follow up within the hour".to_string(),
            format!("Offer a test drive of {vehicle}"),
            "Send a pricing summary".to_string(),
        ],
        RecommendedAction::ScheduleCall => vec![
            "Propose two call times".to_string(),
            format!("Share details on {vehicle} ahead of the call"),
        ],
        RecommendedAction::SendOffer => vec![
            format!("Send current incentives for {vehicle}"),
            "Include financing options".to_string(),
        ],
        RecommendedAction::Continue => vec![
            "Answer the open question".to_string(),
            "Ask about needs and purchase timeline".to_string(),
        ],
    };

    if !risk_factors.is_empty() {
        steps.push(format!("Address concerns: {}", risk_factors.join(", ")));
    }
    steps
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizedConversation {
    pub analysis: ConversationAnalysis,
    pub priority_score: u32,
}

pub fn priority_score(analysis: &ConversationAnalysis) -> u32 {
    let urgency = match analysis.urgency {
        Urgency::Critical => 40,
        Urgency::High => 30,
        Urgency::Medium => 20,
        Urgency::Low => 10,
    };
    let intent = match analysis.intent {
        Intent::ReadyToBuy => 30,
        Intent::PriceFocused => 20,
        Intent::Comparison => 15,
        Intent::Research => 10,
        Intent::Undecided => 5,
    };
    let mood = match analysis.mood {
        Mood::Excited | Mood::Frustrated => 20,
        Mood::VeryPositive => 15,
        Mood::Positive | Mood::Negative => 10,
        Mood::Neutral => 5,
    };
    urgency + analysis.buying_signals.len() as u32 * 10 + intent + mood
}

/// Orders analyses by descending priority score; equal scores fall back to conversation id.
pub fn prioritize(analyses: Vec<ConversationAnalysis>) -> Vec<PrioritizedConversation> {
    let mut ranked: Vec<PrioritizedConversation> = analyses
        .into_iter()
        .map(|analysis| PrioritizedConversation { priority_score: priority_score(&analysis), analysis })
        .collect();
    ranked.sort_by(|left, right| {
        right
            .priority_score
            .cmp(&left.priority_score)
            .then_with(|| left.analysis.conversation_id.cmp(&right.analysis.conversation_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{prioritize, AnalysisRequest, ConversationAnalyzer};
    use crate::domain::conversation::{
        ConversationId, ConversationMessage, Intent, LeadContext, Mood, RecommendedAction, Urgency,
    };

    fn conversation() -> ConversationId {
        ConversationId("conv-1".to_string())
    }

    fn customer(text: &str) -> ConversationMessage {
        ConversationMessage::customer(text, Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap())
    }

    #[test]
    fn ready_to_buy_message_is_critical_and_escalates() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let analysis = analyzer.analyze(&AnalysisRequest::new(
            &id,
            "I'm ready to buy today, can we sign the paperwork?",
        ));

        assert_eq!(analysis.intent, Intent::ReadyToBuy);
        assert_eq!(analysis.urgency, Urgency::Critical);
        assert!(analysis.has_signal("ready to buy"));
        assert!(analysis.has_signal("sign the paperwork"));
        assert_eq!(analysis.recommended_action, RecommendedAction::Escalate);
    }

    #[test]
    fn empty_conversation_returns_default_analysis() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let analysis = analyzer.analyze(&AnalysisRequest::new(&id, "   "));

        assert_eq!(analysis.mood, Mood::Neutral);
        assert_eq!(analysis.urgency, Urgency::Medium);
        assert_eq!(analysis.intent, Intent::Research);
        assert_eq!(analysis.recommended_action, RecommendedAction::Continue);
        assert_eq!(analysis.confidence, 30);
        assert!(!analysis.reasoning.is_empty());
    }

    #[test]
    fn agent_messages_are_ignored() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let history = vec![ConversationMessage::agent(
            "Are you ready to buy today?",
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        )];
        let analysis = analyzer.analyze(&AnalysisRequest::new(&id, "").with_history(&history));

        assert_eq!(analysis.confidence, 30);
        assert!(analysis.buying_signals.is_empty());
    }

    #[test]
    fn analysis_is_idempotent() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let history = vec![customer("Looking at the Highlander, what features does it have?")];
        let lead = LeadContext { vehicle_interest: Some("Highlander".to_string()), ..Default::default() };
        let request = AnalysisRequest::new(&id, "Can we compare it to the Pilot? Best price?")
            .with_history(&history)
            .with_lead(None, &lead);

        assert_eq!(analyzer.analyze(&request), analyzer.analyze(&request));
    }

    #[test]
    fn mood_priority_prefers_excited_over_positive() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let analysis =
            analyzer.analyze(&AnalysisRequest::new(&id, "Thanks, great car, I'm so excited!"));

        assert_eq!(analysis.mood, Mood::Excited);
    }

    #[test]
    fn mood_terms_match_whole_words_only() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();

        let casual = analyzer.analyze(&AnalysisRequest::new(&id, "Whatever works, thanks!"));
        assert_eq!(casual.mood, Mood::Positive);

        let neutral = analyzer.analyze(&AnalysisRequest::new(&id, "Does it likely come with a badge kit?"));
        assert_eq!(neutral.mood, Mood::Neutral);
    }

    #[test]
    fn three_positive_hits_read_as_very_positive() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let analysis = analyzer
            .analyze(&AnalysisRequest::new(&id, "Thanks, that was helpful, really appreciate it"));

        assert_eq!(analysis.mood, Mood::VeryPositive);
    }

    #[test]
    fn confidence_grows_with_history_and_signals() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let history: Vec<ConversationMessage> =
            (0..8).map(|i| customer(&format!("message number {i}"))).collect();
        let analysis = analyzer.analyze(
            &AnalysisRequest::new(&id, "Can I book a test drive and discuss financing?")
                .with_history(&history),
        );

        // 50 base + 30 capped history + 20 capped signals
        assert_eq!(analysis.confidence, 100);
    }

    #[test]
    fn price_focus_recommends_offer_and_lists_risks() {
        let analyzer = ConversationAnalyzer::default();
        let id = conversation();
        let analysis = analyzer.analyze(&AnalysisRequest::new(
            &id,
            "How much is the sedan? It seems too expensive, no rush",
        ));

        assert_eq!(analysis.intent, Intent::PriceFocused);
        assert_eq!(analysis.urgency, Urgency::Low);
        assert_eq!(analysis.recommended_action, RecommendedAction::SendOffer);
        assert_eq!(analysis.risk_factors, vec!["too expensive".to_string()]);
        assert!(analysis.next_steps.iter().any(|step| step.contains("too expensive")));
    }

    #[test]
    fn ranking_surfaces_most_urgent_first() {
        let analyzer = ConversationAnalyzer::default();
        let calm = ConversationId("conv-a".to_string());
        let hot = ConversationId("conv-b".to_string());
        let ranked = analyzer.rank(&[
            AnalysisRequest::new(&calm, "Just browsing, tell me about the features"),
            AnalysisRequest::new(&hot, "I'm a cash buyer and want to buy today"),
        ]);

        assert_eq!(ranked[0].analysis.conversation_id, hot);
        assert!(ranked[0].priority_score > ranked[1].priority_score);
    }

    #[test]
    fn equal_scores_are_ordered_by_conversation_id() {
        let analyzer = ConversationAnalyzer::default();
        let first = ConversationId("a".to_string());
        let second = ConversationId("b".to_string());
        let ranked = prioritize(vec![
            analyzer.analyze(&AnalysisRequest::new(&second, "tell me about the specs")),
            analyzer.analyze(&AnalysisRequest::new(&first, "tell me about the specs")),
        ]);

        assert_eq!(ranked[0].analysis.conversation_id, first);
    }
}
