//! Prompt templates for the insight analysis call.
//!
//! The system prompt is assembled from the section keys so the instruction
//! and the parser cannot drift apart.

use once_cell::sync::Lazy;

use crate::sections::{HEADING_PREFIX, SECTION_KEYS};

/// System instruction sent with every analysis request
pub static INSIGHT_SYSTEM_PROMPT: Lazy<String> = Lazy::new(|| {
    let headings = SECTION_KEYS
        .iter()
        .map(|key| format!("\"{}{}\"", HEADING_PREFIX, key))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are a product analyst reviewing raw customer feedback. \
         Categorize the feedback into exactly three sections, in this order, \
         each introduced by its own markdown heading line: {}. \
         Under each heading, list the most important findings as short bullet \
         points. Do not add any other headings or commentary.",
        headings
    )
});

/// User prompt template; `{corpus}` is replaced with the joined feedback text
pub const INSIGHT_USER_TEMPLATE: &str = "Analyze the following customer feedback and extract \
the top pain points, the top feature requests, and recommended improvements.\n\nFeedback:\n{corpus}";

/// Render the user prompt by substituting the corpus into the template.
pub fn render_user_prompt(template: &str, corpus: &str) -> String {
    template.replace("{corpus}", corpus)
}
