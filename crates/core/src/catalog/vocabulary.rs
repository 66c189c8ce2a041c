//! Ordered rule tables behind the analyzer, router and trigger system.
//!
//! Each table is evaluated top to bottom and the first matching row wins, so the row order
//! is the tie-break policy.

use crate::domain::conversation::{Intent, Mood, Urgency};

/// Mood buckets in priority order. Positive is the last bucket consulted before neutral.
pub const MOOD_RULES: &[(Mood, &[&str])] = &[
    (
        Mood::Excited,
        &["excited", "can't wait", "cant wait", "amazing", "love it", "awesome", "perfect", "dream car"],
    ),
    (
        Mood::Frustrated,
        &[
            "frustrated",
            "annoyed",
            "ridiculous",
            "waste of time",
            "still waiting",
            "no one called",
            "nobody called",
            "unacceptable",
            "fed up",
        ],
    ),
    (
        Mood::Negative,
        &["not happy", "disappointed", "bad", "terrible", "worst", "unhappy", "poor", "hate"],
    ),
    (
        Mood::Positive,
        &["thanks", "thank you", "great", "good", "nice", "helpful", "appreciate", "interested", "like"],
    ),
];

/// A positive bucket with at least this many hits reads as very positive.
pub const VERY_POSITIVE_MIN_HITS: usize = 3;

/// Urgency tiers from most to least urgent.
pub const URGENCY_TIERS: &[(Urgency, &[&str])] = &[
    (
        Urgency::Critical,
        &["today", "right now", "asap", "immediately", "urgent", "emergency", "tonight"],
    ),
    (Urgency::High, &["tomorrow", "this week", "this weekend", "soon", "quickly", "by friday"]),
    (Urgency::Medium, &["next week", "this month", "in a few weeks", "couple of weeks"]),
    (Urgency::Low, &["no rush", "just looking", "someday", "next year", "eventually", "browsing"]),
];

pub const DEFAULT_URGENCY: Urgency = Urgency::Medium;

/// Intent patterns in priority order.
pub const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::ReadyToBuy,
        &[
            "ready to buy",
            "buy today",
            "sign today",
            "sign the paperwork",
            "purchase now",
            "i'll take it",
            "ill take it",
            "want to buy",
            "where do i sign",
            "cash buyer",
        ],
    ),
    (
        Intent::PriceFocused,
        &["price", "cost", "how much", "best deal", "discount", "monthly payment", "msrp", "out the door"],
    ),
    (Intent::Comparison, &["compare", "versus", " vs ", "difference between", "better than", "other dealer"]),
    (Intent::Research, &["features", "specs", "information", "tell me about", "mpg", "options", "reviews"]),
    (Intent::Undecided, &["not sure", "thinking about it", "maybe", "undecided", "still deciding"]),
];

pub const DEFAULT_INTENT: Intent = Intent::Research;

/// Disengagement and objection phrases reported as risk factors.
pub const RISK_PHRASES: &[&str] = &[
    "not interested",
    "too expensive",
    "just looking",
    "maybe later",
    "found another",
    "bought elsewhere",
    "went with another",
    "stop texting",
    "unsubscribe",
    "need to think",
    "can't afford",
    "cant afford",
    "bad experience",
    "too far",
];

pub const COMPLAINT_TERMS: &[&str] = &[
    "complaint",
    "speak to a manager",
    "talk to a manager",
    "your manager",
    "lawyer",
    "refund",
    "unacceptable",
    "ripped off",
    "scam",
    "report you",
];

pub const COMPETITOR_TERMS: &[&str] = &[
    "other dealer",
    "another dealer",
    "competitor",
    "better offer",
    "beat this price",
    "beat their price",
    "carmax",
    "carvana",
    "quoted me",
];

pub const COMPLEX_REQUEST_TERMS: &[&str] = &[
    "custom order",
    "special order",
    "lease transfer",
    "lease buyout",
    "warranty claim",
    "recall",
    "fleet",
    "business lease",
    "multiple vehicles",
    "co-signer",
];

pub const HIGH_VALUE_TERMS: &[&str] = &["fleet", "multiple vehicles", "cash buyer", "top trim", "fully loaded"];

/// Messages longer than this many characters count as complex requests.
pub const COMPLEX_MESSAGE_CHARS: usize = 500;

/// Automated responses keyed by action name, in match order.
pub const AUTOMATED_ACTIONS: &[(&str, &[&str])] = &[
    (
        "send_hours_info",
        &[
            "your hours",
            "business hours",
            "what time do you open",
            "what time do you close",
            "when do you open",
            "when do you close",
            "are you open",
        ],
    ),
    (
        "send_location_info",
        &["where are you located", "your address", "directions to", "where is the dealership", "how do i get there"],
    ),
];

/// Short acknowledgment-only messages that need nothing beyond a courtesy reply.
pub const ACKNOWLEDGMENT_PHRASES: &[&str] =
    &["thanks", "thank you", "ok", "okay", "got it", "sounds good", "great thanks", "will do"];

pub const ACKNOWLEDGMENT_ACTION: &str = "send_acknowledgment";

/// Lower-cases and collapses whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cases, replaces punctuation other than apostrophes and hyphens with spaces, and
/// pads with a leading and trailing space so whole-phrase checks can search `" phrase "`.
pub fn word_padded(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '\'' || ch == '-' { ch } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Whole-word phrase check against text prepared with [`word_padded`].
pub fn contains_phrase(padded: &str, phrase: &str) -> bool {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return false;
    }
    padded.contains(&format!(" {phrase} "))
}

/// Whole-word occurrences of `phrase` in text prepared with [`word_padded`].
pub fn count_phrase(padded: &str, phrase: &str) -> usize {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return 0;
    }
    padded
        .match_indices(phrase)
        .filter(|(start, _)| {
            let end = start + phrase.len();
            padded[..*start].ends_with(' ') && padded[end..].starts_with(' ')
        })
        .count()
}

pub fn matching_terms(normalized: &str, terms: &[&str]) -> Vec<String> {
    terms.iter().filter(|term| normalized.contains(**term)).map(|term| term.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::{contains_phrase, count_phrase, normalize, word_padded};

    #[test]
    fn word_padding_strips_punctuation() {
        let padded = word_padded("What are your HOURS?");

        assert_eq!(padded, " what are your hours ");
        assert!(contains_phrase(&padded, "your hours"));
        assert!(!contains_phrase(&padded, "our hour"));
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Ready   TO\nbuy "), "ready to buy");
    }

    #[test]
    fn phrases_are_counted_as_whole_words() {
        let padded = word_padded("Great, great. Good badge, whatever!");

        assert_eq!(count_phrase(&padded, "great"), 2);
        assert_eq!(count_phrase(&padded, "bad"), 0);
        assert_eq!(count_phrase(&padded, "hate"), 0);
        assert_eq!(count_phrase(&padded, ""), 0);
    }
}
