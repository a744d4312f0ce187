use std::sync::LazyLock;

use regex::Regex;

use super::{is_missing, FieldError, FieldResult};

static VOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)([KM]?)$").unwrap());

/// "3.1M" → 3_100_000, "946K" → 946_000, "2,345" → 2345. Truncates, never rounds.
pub fn parse_votes(raw: Option<&str>) -> FieldResult<u64> {
    let raw = raw.filter(|s| !is_missing(s)).ok_or(FieldError::Missing)?;
    let malformed = || FieldError::malformed("Votes", raw);

    let cleaned = raw.trim().replace(',', "");
    let caps = VOTES_RE.captures(&cleaned).ok_or_else(malformed)?;

    let num: f64 = caps[1].parse().map_err(|_| malformed())?;
    let scale = match caps[2].to_ascii_uppercase().as_str() {
        "K" => 1_000.0,
        "M" => 1_000_000.0,
        _ => 1.0,
    };

    let total = num * scale;
    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(malformed());
    }
    Ok(total as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes() {
        assert_eq!(parse_votes(Some("3.1M")), Ok(3_100_000));
        assert_eq!(parse_votes(Some("946K")), Ok(946_000));
        assert_eq!(parse_votes(Some("1.5k")), Ok(1_500));
        assert_eq!(parse_votes(Some("2m")), Ok(2_000_000));
    }

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_votes(Some("2,345")), Ok(2345));
        assert_eq!(parse_votes(Some(" 1,234,567 ")), Ok(1_234_567));
        assert_eq!(parse_votes(Some("42")), Ok(42));
        // pandas writes nullable integer columns as floats
        assert_eq!(parse_votes(Some("3100000.0")), Ok(3_100_000));
    }

    #[test]
    fn truncates_fractions() {
        assert_eq!(parse_votes(Some("12.9")), Ok(12));
        assert_eq!(parse_votes(Some("1.2345K")), Ok(1234));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_votes(Some("abc")), Err(FieldError::Malformed { .. })));
        assert!(parse_votes(Some("12KM")).is_err());
        assert!(parse_votes(Some("12 votes")).is_err());
        assert!(parse_votes(Some(".5K")).is_err());
        assert!(parse_votes(Some("-5")).is_err());
    }

    #[test]
    fn missing_values() {
        assert_eq!(parse_votes(None), Err(FieldError::Missing));
        assert_eq!(parse_votes(Some("N/A")), Err(FieldError::Missing));
        assert_eq!(parse_votes(Some("")), Err(FieldError::Missing));
    }
}
