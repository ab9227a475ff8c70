//! The "Emoción detectada" sentinel: a fixed textual prefix the generation
//! prompt asks the model to emit, and the pattern this module parses it back
//! out with. Format and parser are one versioned unit; a change to either
//! side is a protocol change and must update [`SENTINEL_VERSION`].

pub const SENTINEL_VERSION: &str = "v1";

const SENTINEL_PREFIX: &str = "Emoción detectada:";
const SENTINEL_MARKER_LOWER: &str = "emoción detectada";
const SENTINEL_SUFFIX: &str = "😊";

/// Whether generated text already carries the sentinel, meaning a second
/// classification call must not run for this turn.
pub fn starts_with_sentinel(text: &str) -> bool {
    text.to_lowercase().starts_with(SENTINEL_MARKER_LOWER)
}

/// Prepends the sentinel line for `label` to the reply body.
pub fn annotate(label: &str, body: &str) -> String {
    format!("{SENTINEL_PREFIX} {label} {SENTINEL_SUFFIX}\n{body}")
}

/// Parses the emotion label out of a sentinel-prefixed reply. Returns `None`
/// when the sentinel is absent or carries no usable label.
pub fn parse_label(text: &str) -> Option<String> {
    let marker_len = SENTINEL_MARKER_LOWER.len();
    if text.len() < marker_len
        || !text.is_char_boundary(marker_len)
        || text[..marker_len].to_lowercase() != SENTINEL_MARKER_LOWER
    {
        return None;
    }

    let rest = &text[marker_len..];
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let first_line = rest.lines().next().unwrap_or("");
    let label = first_line.trim().trim_end_matches(SENTINEL_SUFFIX).trim();

    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}
