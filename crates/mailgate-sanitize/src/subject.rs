//! Subject line scrubbing.

/// Maximum subject length in characters after scrubbing.
const MAX_SUBJECT_CHARS: usize = 255;

/// Returns true for C0 and C1 control characters (including CR and LF).
fn is_control(c: char) -> bool {
    c.is_control() || ('\u{80}'..='\u{9f}').contains(&c)
}

/// Scrubs a subject line for transmission.
///
/// Removes CR, LF, and all other C0/C1 control characters, truncates to
/// 255 characters, and trims surrounding whitespace. Idempotent.
#[must_use]
pub fn sanitize_subject(subject: &str) -> String {
    let scrubbed: String = subject
        .chars()
        .filter(|c| !is_control(*c))
        .take(MAX_SUBJECT_CHARS)
        .collect();
    scrubbed.trim().to_string()
}
