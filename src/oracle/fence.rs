//! Cleanup of free-form oracle answers.

use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|(lt|gt|amp|quot|apos|nbsp));")
            .unwrap()
    })
}

/// Body of the first fenced block in `text`, or the trimmed text when it
/// has no fence. An unterminated fence runs to the end of the text.
///
/// The info string (` ```python `, ` ```json `) is dropped.
pub fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.trim().to_string();
    };
    let after_ticks = &text[open + 3..];
    let body_start = match after_ticks.find('\n') {
        Some(nl) if is_info_string(&after_ticks[..nl]) => nl + 1,
        _ => 0,
    };
    let body = &after_ticks[body_start..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}

fn is_info_string(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_alphanumeric() || "-_+.".contains(c))
}

/// Decode HTML character references that models sometimes emit in code
/// (`&gt;`, `&lt;`, `&amp;`, `&#39;` ...). Unknown or invalid references
/// are left untouched.
pub fn unescape_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    entity_re()
        .replace_all(text, |caps: &Captures<'_>| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("amp") => Some('&'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("nbsp") => Some('\u{a0}'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// The outermost `{ ... }` span in `text`, if any.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
