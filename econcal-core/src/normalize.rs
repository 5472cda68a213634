//! Text normalization shared by index keys and name matching.

const TRADEMARK_GLYPHS: [char; 3] = ['\u{2122}', '\u{00AE}', '\u{00A9}'];

/// Placeholder feeds use for "no value yet".
const EMPTY_METRIC: &str = "-";

/// Normalize an event name for comparison.
///
/// Lowercases, drops ™/®/© glyphs, turns word-joining and spaced hyphens
/// ("Non-Farm", "GDP - Final") into plain word breaks, collapses runs of
/// whitespace and trims. Idempotent.
pub fn normalize_name(raw: &str) -> String {
    let chars = prepare(raw);
    let mut out = String::with_capacity(chars.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' && is_separator_hyphen(&chars, i) {
            out.push(' ');
        } else {
            out.push(c);
        }
    }

    collapse_whitespace(&out)
}

/// Like [`normalize_name`], but word-joining hyphens are dropped instead of
/// becoming a word break, so "Non-Farm" reads as "nonfarm".
pub fn normalize_name_joined(raw: &str) -> String {
    let chars = prepare(raw);
    let mut out = String::with_capacity(chars.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' && is_joining_hyphen(&chars, i) {
            continue;
        }
        if c == '-' && is_separator_hyphen(&chars, i) {
            out.push(' ');
        } else {
            out.push(c);
        }
    }

    collapse_whitespace(&out)
}

/// Trimmed, uppercased currency code; `None` when blank.
pub fn normalize_currency(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Trimmed display metric; `None` when blank or the "-" placeholder.
pub fn normalize_metric(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == EMPTY_METRIC {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn prepare(raw: &str) -> Vec<char> {
    raw.to_lowercase()
        .chars()
        .filter(|c| !TRADEMARK_GLYPHS.contains(c))
        .collect()
}

fn neighbours(chars: &[char], i: usize) -> (Option<char>, Option<char>) {
    let left = i.checked_sub(1).map(|l| chars[l]);
    let right = chars.get(i + 1).copied();
    (left, right)
}

fn is_joining_hyphen(chars: &[char], i: usize) -> bool {
    matches!(
        neighbours(chars, i),
        (Some(l), Some(r)) if l.is_alphanumeric() && r.is_alphanumeric()
    )
}

// A hyphen leading a number ("-0.5") or dangling at an edge is kept.
fn is_separator_hyphen(chars: &[char], i: usize) -> bool {
    is_joining_hyphen(chars, i)
        || matches!(
            neighbours(chars, i),
            (Some(l), Some(r)) if l.is_whitespace() && r.is_whitespace()
        )
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_name_basic() {
        assert_eq!(normalize_name("  Nonfarm   Payrolls "), "nonfarm payrolls");
        assert_eq!(normalize_name("Non-Farm Payrolls"), "non farm payrolls");
        assert_eq!(normalize_name("GDP - Final"), "gdp final");
        assert_eq!(normalize_name("ISM™ Manufacturing PMI®"), "ism manufacturing pmi");
        assert_eq!(normalize_name("\tCPI\ny/y"), "cpi y/y");
    }

    #[test]
    fn test_normalize_name_keeps_signed_numbers() {
        assert_eq!(normalize_name("Rate -0.10%"), "rate -0.10%");
        assert_eq!(normalize_name("-"), "-");
    }

    #[test]
    fn test_normalize_name_joined_drops_word_hyphens() {
        assert_eq!(normalize_name_joined("Non-Farm Payrolls"), "nonfarm payrolls");
        assert_eq!(normalize_name_joined("GDP - Final"), "gdp final");
    }

    #[test]
    fn test_normalize_currency_and_metric() {
        assert_eq!(normalize_currency(" eur"), Some("EUR".to_string()));
        assert_eq!(normalize_currency("   "), None);
        assert_eq!(normalize_metric(" - "), None);
        assert_eq!(normalize_metric("0.2%"), Some("0.2%".to_string()));
    }

    proptest! {
        #[test]
        fn prop_normalize_name_idempotent(s in "[a-zA-Z0-9 \\-\t/%.™®©]{0,40}") {
            let once = normalize_name(&s);
            prop_assert_eq!(normalize_name(&once), once);
        }

        #[test]
        fn prop_normalize_name_joined_idempotent(s in "[a-zA-Z0-9 \\-\t/%.]{0,40}") {
            let once = normalize_name_joined(&s);
            prop_assert_eq!(normalize_name_joined(&once), once);
        }
    }
}
