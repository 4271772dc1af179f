// src/process/email.rs

/// Trim, lower-case, and turn every inner space into `-`.
fn email_part(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "-")
}

/// `first.last@domain` and `first-last@domain`.
pub fn derive_emails(first: &str, last: &str, domain: &str) -> (String, String) {
    let first = email_part(first);
    let last = email_part(last);
    (
        format!("{}.{}@{}", first, last, domain),
        format!("{}-{}@{}", first, last, domain),
    )
}
