pub mod analysis;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod escalation;
pub mod quality;
pub mod routing;

pub use analysis::{
    prioritize, AnalysisCache, AnalysisRequest, CacheKey, ConversationAnalyzer,
    PrioritizedConversation,
};
pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use catalog::{
    BuyingSignal, ResponseTemplate, SignalCatalog, TemplateCatalog, TemplateCategory,
    TriggerCatalog, TriggerType,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::conversation::{
    ConversationAnalysis, ConversationId, ConversationMessage, LeadContext, LeadId,
};
pub use domain::routing::{RoutingDecision, RoutingPriority, RoutingType};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use escalation::{EscalationAlert, EscalationContext, EscalationOutcome, EscalationTriggerSystem};
pub use quality::{ExperimentError, QualityReport, ResponseQualityOptimizer, ScoringInput};
pub use routing::{RoutingDecisionEngine, RoutingInput, RoutingResult, TemplateMatcher};
