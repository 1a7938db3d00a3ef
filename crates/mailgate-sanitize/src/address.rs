//! Email address validation.

/// Maximum address length in bytes (RFC 5321 forward-path limit).
const MAX_ADDRESS_BYTES: usize = 254;

/// Validates an email address against a conservative `local@domain.tld`
/// grammar.
///
/// Accepts addresses that are non-empty, at most 254 bytes, contain
/// exactly one `@`, a non-empty local part of common mailbox
/// characters, and a dotted domain whose final label is at least two
/// letters.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    if address.is_empty() || address.len() > MAX_ADDRESS_BYTES {
        return false;
    }

    let mut parts = address.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    if local.is_empty() || !local.chars().all(is_local_char) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    if !labels.iter().all(|label| is_valid_label(label)) {
        return false;
    }

    // Top-level domain: at least two letters.
    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-')
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
