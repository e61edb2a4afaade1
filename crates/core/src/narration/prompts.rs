//! Prompt templates bundled at compile time, plus the payload builders that
//! feed them.

use super::types::{LocationDescriptor, ResidentRef};

/// Narrator - cynical tour-guide voice
pub const NARRATOR: &str = include_str!("defaults/narrator.md");

/// Evaluator - factual-consistency auditor with the scoring policy
pub const EVALUATOR: &str = include_str!("defaults/evaluator.md");

/// Stands in for the resident list when a location has nobody in it
pub const NO_RESIDENTS_PLACEHOLDER: &str = "no one (it's empty, Morty!)";

/// All bundled prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![("narrator", NARRATOR), ("evaluator", EVALUATOR)]
}

/// Comma-separated resident names, or the placeholder when there are none
pub fn resident_list(residents: &[ResidentRef]) -> String {
    if residents.is_empty() {
        return NO_RESIDENTS_PLACEHOLDER.to_string();
    }
    residents
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// User message for the narrator
pub fn narration_payload(location: &LocationDescriptor) -> String {
    format!(
        "Location Name: {}\nLocation Type: {}\nKnown Residents: {}",
        location.name,
        location.kind,
        resident_list(&location.residents)
    )
}

/// User message for the evaluator.
///
/// An empty resident list is spelled out as `(none)` so the evaluator applies
/// the empty-residents rule instead of guessing.
pub fn evaluation_payload(narrative: &str, residents: &[ResidentRef]) -> String {
    let actual = if residents.is_empty() {
        "(none)".to_string()
    } else {
        residents
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Data (Actual Residents): {}\n\nGenerated Summary:\n<summary>\n{}\n</summary>",
        actual, narrative
    )
}
