//! Checks on generated text before it reaches a customer. The language model never commits
//! the dealership to prices, discounts or payments; those come from the sales team.

use closer_core::catalog::vocabulary;

const PRICE_COMMITMENT_PHRASES: &[&str] = &[
    "guaranteed price",
    "price guarantee",
    "final price",
    "out the door price",
    "i can approve",
    "i'll approve",
    "locked in",
    "per month",
    "% off",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Degrade { reason_code: &'static str, fallback_path: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub struct GuardrailPolicy {
    pub llm_can_quote_prices: bool,
    /// Replies longer than the strategy's limit by more than this factor are rejected.
    pub length_tolerance: f64,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { llm_can_quote_prices: false, length_tolerance: 1.5 }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, reply: &str, max_chars: usize) -> GuardrailDecision {
        let chars = reply.chars().count();
        if chars as f64 > max_chars as f64 * self.length_tolerance {
            return GuardrailDecision::Degrade {
                reason_code: "reply_too_long",
                fallback_path: "template_fallback",
            };
        }

        if !self.llm_can_quote_prices && quotes_price(reply) {
            return GuardrailDecision::Degrade {
                reason_code: "price_commitment_disallowed",
                fallback_path: "template_fallback",
            };
        }

        GuardrailDecision::Allow
    }
}

fn quotes_price(reply: &str) -> bool {
    if reply.chars().zip(reply.chars().skip(1)).any(|(sign, next)| sign == '$' && next.is_ascii_digit()) {
        return true;
    }
    let lowered = reply.to_lowercase();
    let padded = vocabulary::word_padded(reply);
    PRICE_COMMITMENT_PHRASES.iter().any(|phrase| {
        if phrase.contains('%') {
            lowered.contains(phrase)
        } else {
            vocabulary::contains_phrase(&padded, phrase)
        }
    })
}
