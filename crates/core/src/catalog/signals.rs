use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Urgency,
    Financial,
    Decision,
    Timeline,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyingSignal {
    pub phrase: String,
    pub weight: u8,
    pub category: SignalCategory,
    pub description: String,
}

impl BuyingSignal {
    pub fn new(
        phrase: &str,
        weight: u8,
        category: SignalCategory,
        description: &str,
    ) -> Self {
        Self {
            phrase: phrase.to_string(),
            weight: weight.clamp(1, 10),
            category,
            description: description.to_string(),
        }
    }
}

/// Weighted buying-signal phrases in detection order, plus the subset strong enough to
/// warrant a human on their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCatalog {
    signals: Vec<BuyingSignal>,
    strong_phrases: Vec<String>,
}

impl Default for SignalCatalog {
    fn default() -> Self {
        use SignalCategory::*;

        let signals = vec![
            BuyingSignal::new("ready to buy", 10, Decision, "Customer states they are ready to purchase"),
            BuyingSignal::new("buy today", 10, Urgency, "Wants to complete the purchase today"),
            BuyingSignal::new("sign today", 10, Urgency, "Wants to sign the deal today"),
            BuyingSignal::new("sign the paperwork", 10, Decision, "Asks to sign purchase paperwork"),
            BuyingSignal::new("cash buyer", 9, Financial, "Paying in cash, no financing friction"),
            BuyingSignal::new("pre-approved", 8, Financial, "Already holds financing approval"),
            BuyingSignal::new("down payment", 7, Financial, "Discussing the down payment"),
            BuyingSignal::new("monthly payment", 6, Financial, "Working out affordability"),
            BuyingSignal::new("financing", 6, Financial, "Interested in financing options"),
            BuyingSignal::new("trade in", 6, Financial, "Has a vehicle to trade in"),
            BuyingSignal::new("best price", 7, Financial, "Negotiating on price"),
            BuyingSignal::new("out the door", 8, Financial, "Asking for the final out-the-door price"),
            BuyingSignal::new("test drive", 7, Decision, "Wants to experience the vehicle"),
            BuyingSignal::new("is it available", 6, Decision, "Checking the unit is still in stock"),
            BuyingSignal::new("hold it", 8, Decision, "Asks to reserve the vehicle"),
            BuyingSignal::new("this week", 6, Timeline, "Plans to act within the week"),
            BuyingSignal::new("this weekend", 6, Timeline, "Plans to visit or buy this weekend"),
            BuyingSignal::new("need a car by", 7, Timeline, "Has a hard deadline for a vehicle"),
            BuyingSignal::new("as soon as possible", 7, Urgency, "Wants to move quickly"),
        ];

        let strong_phrases = ["ready to buy", "buy today", "sign today", "sign the paperwork", "cash buyer"]
            .iter()
            .map(|phrase| phrase.to_string())
            .collect();

        Self { signals, strong_phrases }
    }
}

impl SignalCatalog {
    pub fn new(signals: Vec<BuyingSignal>, strong_phrases: Vec<String>) -> Self {
        Self { signals, strong_phrases }
    }

    pub fn signals(&self) -> &[BuyingSignal] {
        &self.signals
    }

    pub fn get(&self, phrase: &str) -> Option<&BuyingSignal> {
        self.signals.iter().find(|signal| signal.phrase == phrase)
    }

    pub fn is_strong(&self, phrase: &str) -> bool {
        self.strong_phrases.iter().any(|strong| strong == phrase)
    }

    /// Every catalog phrase present in `normalized_text`, in catalog order, without
    /// duplicates.
    pub fn detect(&self, normalized_text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for signal in &self.signals {
            if normalized_text.contains(signal.phrase.as_str())
                && !found.iter().any(|existing| existing == &signal.phrase)
            {
                found.push(signal.phrase.clone());
            }
        }
        found
    }

    pub fn contains_strong(&self, normalized_text: &str) -> bool {
        self.strong_phrases.iter().any(|phrase| normalized_text.contains(phrase.as_str()))
    }

    pub fn total_weight(&self, phrases: &[String]) -> u32 {
        phrases.iter().filter_map(|phrase| self.get(phrase)).map(|signal| u32::from(signal.weight)).sum()
    }
}
