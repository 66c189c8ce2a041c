use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;

pub const FALLBACK_TEMPLATE_ID: &str = "acknowledge_redirect";

const FEEDBACK_RETAIN: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Greeting,
    Information,
    Pricing,
    Scheduling,
    Followup,
    ObjectionHandling,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Information => "information",
            Self::Pricing => "pricing",
            Self::Scheduling => "scheduling",
            Self::Followup => "followup",
            Self::ObjectionHandling => "objection_handling",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTemplate {
    pub id: String,
    pub category: TemplateCategory,
    pub content: String,
    pub placeholders: Vec<String>,
    pub use_conditions: Vec<String>,
    pub applicable_tags: Vec<String>,
    pub effectiveness: u8,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateRenderError {
    #[error("template `{template_id}` failed to render: {message}")]
    Render { template_id: String, message: String },
}

impl ResponseTemplate {
    /// Fills the template's placeholders. Placeholders without a supplied value get a
    /// neutral default so a partially known lead still receives a readable reply.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateRenderError> {
        let mut context = Context::new();
        for placeholder in &self.placeholders {
            let value = values
                .get(placeholder)
                .filter(|value| !value.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| default_placeholder_value(placeholder).to_string());
            context.insert(placeholder.as_str(), &value);
        }

        Tera::one_off(&self.content, &context, false).map_err(|error| {
            TemplateRenderError::Render { template_id: self.id.clone(), message: error.to_string() }
        })
    }
}

fn default_placeholder_value(placeholder: &str) -> &'static str {
    match placeholder {
        "customer_name" => "there",
        "vehicle" => "the vehicle you're interested in",
        "dealership" => "our dealership",
        _ => "",
    }
}

/// Template catalog. Effectiveness is the only field that changes after construction and
/// is updated through [`TemplateCatalog::record_feedback`].
#[derive(Debug)]
pub struct TemplateCatalog {
    templates: RwLock<Vec<ResponseTemplate>>,
    fallback: ResponseTemplate,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<ResponseTemplate>) -> Self {
        Self { templates: RwLock::new(templates), fallback: fallback_template() }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn snapshot(&self) -> Vec<ResponseTemplate> {
        match self.templates.read() {
            Ok(templates) => templates.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn get(&self, template_id: &str) -> Option<ResponseTemplate> {
        if template_id == self.fallback.id {
            return Some(self.fallback.clone());
        }
        self.snapshot().into_iter().find(|template| template.id == template_id)
    }

    pub fn fallback(&self) -> &ResponseTemplate {
        &self.fallback
    }

    /// Folds an observed quality score into the template's effectiveness and returns the
    /// new value.
    pub fn record_feedback(&self, template_id: &str, observed_score: u8) -> Option<u8> {
        let mut templates = match self.templates.write() {
            Ok(templates) => templates,
            Err(poisoned) => poisoned.into_inner(),
        };
        let template = templates.iter_mut().find(|template| template.id == template_id)?;
        let blended = f64::from(template.effectiveness) * FEEDBACK_RETAIN
            + f64::from(observed_score.min(100)) * (1.0 - FEEDBACK_RETAIN);
        template.effectiveness = blended.round().clamp(0.0, 100.0) as u8;
        Some(template.effectiveness)
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new(default_templates())
    }
}

fn template(
    id: &str,
    category: TemplateCategory,
    content: &str,
    use_conditions: &[&str],
    applicable_tags: &[&str],
    effectiveness: u8,
) -> ResponseTemplate {
    let placeholders = ["customer_name", "vehicle", "dealership"]
        .iter()
        .filter(|placeholder| content.contains(*placeholder))
        .map(|placeholder| placeholder.to_string())
        .collect();

    ResponseTemplate {
        id: id.to_string(),
        category,
        content: content.to_string(),
        placeholders,
        use_conditions: use_conditions.iter().map(|value| value.to_string()).collect(),
        applicable_tags: applicable_tags.iter().map(|value| value.to_string()).collect(),
        effectiveness,
    }
}

fn fallback_template() -> ResponseTemplate {
    template(
        FALLBACK_TEMPLATE_ID,
        TemplateCategory::Followup,
        "Thanks for your message, {{ customer_name }}! I want to make sure I get you the right \
         answer. Could you tell me a little more about what you're looking for?",
        &[],
        &[],
        60,
    )
}

pub fn default_templates() -> Vec<ResponseTemplate> {
    use TemplateCategory::*;

    vec![
        template(
            "greeting_welcome",
            Greeting,
            "Hi {{ customer_name }}, thanks for reaching out about {{ vehicle }}! What would you \
             like to know first?",
            &["hello", "hi", "hey", "interested", "inquiry"],
            &["sedan", "suv", "truck", "electric", "luxury"],
            78,
        ),
        template(
            "pricing_breakdown",
            Pricing,
            "Great question, {{ customer_name }}. I can put together a full price breakdown for \
             {{ vehicle }}, including current incentives. Would you like me to include financing \
             options as well?",
            &["price", "cost", "how much", "msrp", "deal", "discount"],
            &["sedan", "suv", "truck", "electric", "luxury"],
            82,
        ),
        template(
            "financing_options",
            Pricing,
            "Happy to help with financing, {{ customer_name }}. We work with several lenders and \
             can estimate a monthly payment for {{ vehicle }}. What down payment did you have in \
             mind?",
            &["financing", "monthly payment", "apr", "interest rate", "down payment", "credit"],
            &["sedan", "suv", "truck", "electric", "luxury"],
            80,
        ),
        template(
            "schedule_test_drive",
            Scheduling,
            "I'd love to get you behind the wheel of {{ vehicle }}, {{ customer_name }}. What day \
             and time work best for a test drive at {{ dealership }}?",
            &["test drive", "visit", "come in", "appointment", "see it", "schedule"],
            &["sedan", "suv", "truck", "electric", "luxury"],
            85,
        ),
        template(
            "vehicle_information",
            Information,
            "Good question about {{ vehicle }}, {{ customer_name }}. I can send over the full \
             spec sheet and feature list. Is there a particular feature that matters most to \
             you?",
            &["features", "specs", "mileage", "mpg", "options", "color", "trim", "warranty"],
            &["sedan", "suv", "truck", "electric", "luxury", "hybrid"],
            75,
        ),
        template(
            "availability_check",
            Information,
            "Let me confirm availability on {{ vehicle }} for you, {{ customer_name }}. Would you \
             like me to hold it for a test drive once I confirm?",
            &["available", "in stock", "still have", "inventory"],
            &["sedan", "suv", "truck", "electric", "luxury"],
            79,
        ),
        template(
            "comparison_help",
            Information,
            "Comparing options is smart, {{ customer_name }}. I can put {{ vehicle }} side by side \
             with the models you're considering. Which ones are on your list?",
            &["compare", "versus", "vs", "difference", "better than"],
            &["sedan", "suv", "truck", "electric"],
            74,
        ),
        template(
            "followup_checkin",
            Followup,
            "No rush at all, {{ customer_name }}. When you're ready, I'm here to help with \
             {{ vehicle }}. Is there anything that would make the decision easier?",
            &["thinking about it", "get back", "later", "not sure yet", "still deciding"],
            &[],
            70,
        ),
        template(
            "objection_price",
            ObjectionHandling,
            "I understand budget matters, {{ customer_name }}. Let's look at options that keep \
             {{ vehicle }} within reach, like different trims, incentives, or financing terms. \
             What monthly range works for you?",
            &["too expensive", "too much", "can't afford", "over budget", "cheaper"],
            &["sedan", "suv", "truck", "electric", "luxury"],
            77,
        ),
        template(
            "objection_trade_value",
            ObjectionHandling,
            "I hear you on the trade-in value, {{ customer_name }}. We can have our appraiser take \
             a second look and walk you through how we arrived at the number. Would that help?",
            &["trade in value", "trade-in", "lowball", "worth"],
            &["sedan", "suv", "truck"],
            73,
        ),
    ]
}
