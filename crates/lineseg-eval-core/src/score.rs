//! Score extraction from scorer output.
//!
//! The external tool prints a human-readable report; the only part we rely
//! on is a line carrying [`LINE_IU_MARKER`] followed by `=` and a number.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ScoreParseError;

/// Marker preceding the line intersection-over-union value.
pub const LINE_IU_MARKER: &str = "line IU =";

/// Characters after the `=` that are searched for a number.
const SCORE_WINDOW_CHARS: usize = 8;

/// Optional sign, optional leading dot, digits with optional `,ddd` groups,
/// optional fraction and optional exponent.
const NUMERIC_TOKEN_PATTERN: &str = r"[-+]?[.]?[\d]+(?:,\d\d\d)*[\.]?\d*(?:[eE][-+]?\d+)?";

fn numeric_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NUMERIC_TOKEN_PATTERN).expect("numeric token pattern is valid"))
}

/// Return the first numeric token in `text`, if any.
pub fn find_numeric_token(text: &str) -> Option<&str> {
    numeric_token_regex().find(text).map(|m| m.as_str())
}

/// Parse a numeric token, dropping thousands separators first.
pub fn parse_numeric_token(token: &str) -> Option<f64> {
    token.replace(',', "").parse::<f64>().ok()
}

/// Extract the score reported on the first line containing `marker`.
///
/// Takes the text between the first and second `=` of that line, keeps at
/// most eight characters of it and parses the first numeric token found
/// there. Lines after the first marker line are never inspected.
///
/// Returns `Ok(None)` when no line carries the marker or the window holds
/// no number.
pub fn extract_score<S: AsRef<str>>(
    lines: &[S],
    marker: &str,
) -> Result<Option<f64>, ScoreParseError> {
    let Some(line) = lines.iter().map(AsRef::as_ref).find(|l| l.contains(marker)) else {
        return Ok(None);
    };

    let after_eq = line.split('=').nth(1).unwrap_or("");
    let window: String = after_eq.chars().take(SCORE_WINDOW_CHARS).collect();

    let Some(token) = find_numeric_token(&window) else {
        return Ok(None);
    };

    parse_numeric_token(token)
        .map(Some)
        .ok_or_else(|| ScoreParseError {
            token: token.to_string(),
            line: line.to_string(),
        })
}
