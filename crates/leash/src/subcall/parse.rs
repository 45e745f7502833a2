//! Interpreting free-text answers as JSON, booleans, or a fixed choice.

pub(crate) const JSON_SUFFIX: &str =
    "IMPORTANT: Respond with valid JSON only. No explanation, no markdown, just JSON.";
pub(crate) const BOOL_SUFFIX: &str = "Answer with exactly 'yes' or 'no'.";

/// Prompt asking for exactly one of `choices`.
pub(crate) fn choice_prompt(prompt: &str, choices: &[&str]) -> String {
    let listed = choices
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{prompt}\n\nChoose exactly one of: {listed}\nRespond with only your choice, nothing else."
    )
}

/// Remove a surrounding markdown code fence, if any.
///
/// The opening fence line (including any language tag) and a closing
/// ```` ``` ```` line are dropped; anything else is returned trimmed.
pub(crate) fn strip_code_fence(response: &str) -> String {
    let text = response.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = text.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n")
}

pub(crate) fn parse_bool(response: &str) -> Option<bool> {
    match response.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Pick the choice the response names: exact match, then
/// case-insensitive, then the first choice contained in the response.
pub(crate) fn match_choice<'c>(response: &str, choices: &[&'c str]) -> Option<&'c str> {
    let response = response.trim();
    if let Some(exact) = choices.iter().find(|c| **c == response) {
        return Some(*exact);
    }
    let lower = response.to_lowercase();
    choices
        .iter()
        .find(|c| c.to_lowercase() == lower)
        .or_else(|| choices.iter().find(|c| lower.contains(&c.to_lowercase())))
        .copied()
}

/// First `max_chars` characters, for error messages.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
