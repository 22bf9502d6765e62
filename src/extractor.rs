//! Line-based extraction of `ERROR` messages from raw log text.

/// Literal token marking a log line of interest
pub const ERROR_MARKER: &str = "ERROR";

/// Extracts the message of every line containing [`ERROR_MARKER`]
///
/// The message is whatever follows the first marker on the line after
/// skipping exactly one separator character, trimmed. Lines are returned in
/// document order; empty messages and duplicates are kept.
pub fn extract_errors(log_content: &str) -> Vec<String> {
    log_content
        .lines()
        .filter_map(|line| {
            let start = line.find(ERROR_MARKER)?;
            Some(message_after_marker(&line[start + ERROR_MARKER.len()..]).to_string())
        })
        .collect()
}

/// Drops the single separator after the marker and trims the rest.
/// Returns an empty slice when nothing follows.
fn message_after_marker(rest: &str) -> &str {
    let mut chars = rest.chars();
    chars.next();
    chars.as_str().trim()
}
