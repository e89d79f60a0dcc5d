//! Text-to-number parsing shared by every platform
//!
//! Parsers never fail loudly: `None` is the sentinel for "could not parse",
//! callers decide whether that becomes zero or a missing value.

/// Pull the numeric magnitude out of free text: digits and one decimal point.
///
/// Thousands separators and currency/unit noise are dropped. A second decimal
/// point makes the text ambiguous and yields `None`.
pub fn magnitude(text: &str) -> Option<f64> {
    let mut digits = String::new();
    let mut has_decimal = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if c == '.' {
            if has_decimal {
                return None;
            }
            // a dot before any digit ("v.10") is not a decimal point
            if digits.is_empty() {
                continue;
            }
            digits.push('.');
            has_decimal = true;
        }
    }
    let digits = digits.trim_end_matches('.');
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok()
}

/// App size in megabytes
///
/// `"123 MB"` is 123.0, `"1.5 GB"` is 1536.0, `"512 KB"` is 0.5.
pub fn parse_size_mb(text: &str) -> Option<f64> {
    let number = magnitude(text)?;
    let upper = text.to_ascii_uppercase();
    let multiplier = if upper.contains("GB") {
        1024.0
    } else if upper.contains("KB") {
        1.0 / 1024.0
    } else {
        1.0
    };
    Some(number * multiplier)
}

/// Install count with `K`/`M`/`B` suffix expansion
///
/// The largest unit token found anywhere in the text wins.
pub fn parse_downloads(text: &str) -> Option<u64> {
    let number = magnitude(text)?;
    let multiplier = if text.contains('B') {
        1e9
    } else if text.contains('M') {
        1e6
    } else if text.contains('K') {
        1e3
    } else {
        1.0
    };
    Some((number * multiplier).round() as u64)
}

/// Price in USD; every "Free..." label is 0.0
pub fn parse_price_usd(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.to_ascii_lowercase().starts_with("free") {
        return Some(0.0);
    }
    magnitude(trimmed)
}

/// Integer counts such as `"1,234"` or `"1.234"`
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// First decimal number in the text, e.g. `"4.5 out of 5 stars"` is 4.5
pub fn parse_rating(text: &str) -> Option<f64> {
    let token = text
        .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .find(|t| t.chars().any(|c| c.is_ascii_digit()))?;
    token.replace(',', ".").trim_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_strings() {
        assert_eq!(parse_size_mb("123 MB"), Some(123.0));
        assert_eq!(parse_size_mb("1.5 GB"), Some(1536.0));
        assert_eq!(parse_size_mb("512 KB"), Some(0.5));
        assert_eq!(parse_size_mb("45M"), Some(45.0));
        assert_eq!(parse_size_mb("Varies with device"), None);
        assert_eq!(parse_size_mb(""), None);
    }

    #[test]
    fn test_download_strings() {
        assert_eq!(parse_downloads("10K"), Some(10_000));
        assert_eq!(parse_downloads("2.3M"), Some(2_300_000));
        assert_eq!(parse_downloads("1B"), Some(1_000_000_000));
        assert_eq!(parse_downloads("500+"), Some(500));
        assert_eq!(parse_downloads("1,000,000+"), Some(1_000_000));
        assert_eq!(parse_downloads("n/a"), None);
    }

    #[test]
    fn test_price_strings() {
        assert_eq!(parse_price_usd("Free"), Some(0.0));
        assert_eq!(parse_price_usd("Free with In-App Purchases"), Some(0.0));
        assert_eq!(parse_price_usd("$4.99"), Some(4.99));
        assert_eq!(parse_price_usd("12"), Some(12.0));
        assert_eq!(parse_price_usd("Contact seller"), None);
    }

    #[test]
    fn test_ambiguous_magnitude() {
        assert_eq!(magnitude("1.2.3"), None);
        assert_eq!(magnitude("v.10"), Some(10.0));
    }

    #[test]
    fn test_counts_and_ratings() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("none"), None);
        assert_eq!(parse_rating("4.5 out of 5 stars"), Some(4.5));
        assert_eq!(parse_rating("Rated 3,8 sur 5"), Some(3.8));
        assert_eq!(parse_rating("no rating"), None);
    }
}
