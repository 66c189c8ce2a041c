//! Static signal catalogs: buying signals, escalation triggers, response templates and the
//! ordered vocabulary tables the analyzers consult.

pub mod signals;
pub mod templates;
pub mod triggers;
pub mod vocabulary;

pub use signals::{BuyingSignal, SignalCatalog, SignalCategory};
pub use templates::{
    ResponseTemplate, TemplateCatalog, TemplateCategory, TemplateRenderError, FALLBACK_TEMPLATE_ID,
};
pub use triggers::{EscalationAction, EscalationTrigger, TriggerCatalog, TriggerType};
