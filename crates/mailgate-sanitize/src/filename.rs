//! Attachment file name normalization.

/// Normalizes a declared attachment file name.
///
/// Strips path separators (`/` and `\`) and control characters.
/// Idempotent; the result never contains path separators or C0
/// controls. May return an empty string; callers must treat that as a
/// validation failure.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '/' && *c != '\\' && !c.is_control() && !('\u{80}'..='\u{9f}').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
