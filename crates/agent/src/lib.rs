//! Async message pipeline around the closer decision core.
//!
//! `AgentRuntime` loads a conversation through the collaborator traits, runs the analyzer
//! and router from `closer-core`, and then produces one of three things: a suggested reply,
//! an escalation payload for the sales team, or automated actions.
//!
//! The language model only writes reply text. It never decides routing, escalation or
//! pricing. Every generation call runs under a timeout, and any failure falls back to the
//! best matching template or a generic acknowledgment.

pub mod collaborators;
pub mod guardrails;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod prompts;
pub mod runtime;

pub use collaborators::{
    priority_tier_for, ConversationStore, InMemoryConversationStore, LeadScorer, StaticLeadScorer,
};
pub use llm::{build_client, GenerationError, GenerationRequest, LlmClient};
pub use runtime::{
    AgentRuntime, EscalationPayload, OptimizedResponse, ResponseOutcome, ResponseSource,
    RouteOutcome, RouteResponse, SuggestedResponse,
};
