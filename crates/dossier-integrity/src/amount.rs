//! Monetary amount parsing

/// Parse an amount as written in a document
///
/// Accepts an optional currency prefix or suffix and both separator
/// conventions: `1,234.56` and `1.234,56`. The right-most of `.`/`,`
/// is taken as the decimal separator when followed by one or two digits.
#[must_use]
pub fn parse_amount(text: &str) -> Option<f64> {
    let trimmed: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let negative = trimmed.starts_with('-');
    let body = trimmed.trim_start_matches('-');
    if body.contains('-') {
        return None;
    }

    let decimal_at = body.rfind(['.', ',']).filter(|&i| {
        let tail = &body[i + 1..];
        (1..=2).contains(&tail.len())
    });
    let normalized = match decimal_at {
        Some(i) => {
            let int: String = body[..i].chars().filter(char::is_ascii_digit).collect();
            format!("{}.{}", if int.is_empty() { "0" } else { &int }, &body[i + 1..])
        }
        None => body.chars().filter(char::is_ascii_digit).collect(),
    };
    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Whether two amounts agree within `tolerance`
#[must_use]
pub fn amounts_agree(a: f64, b: f64, tolerance: f64) -> bool {
    // absorb binary representation error at the boundary
    (a - b).abs() <= tolerance + 1e-9
}
