use std::sync::LazyLock;

use regex::Regex;

use super::{is_missing, round2, FieldError, FieldResult};

static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)h").unwrap());
static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)m").unwrap());

/// "2h 30m" → 2.5, "1h" → 1.0, "90m" → 1.5. The two parts are matched
/// independently, anywhere in the string.
pub fn parse_runtime(raw: Option<&str>) -> FieldResult<f64> {
    let raw = raw.filter(|s| !is_missing(s)).ok_or(FieldError::Missing)?;
    let malformed = || FieldError::malformed("Runtime", raw);

    let hours = capture_u64(&HOURS_RE, raw).map_err(|_| malformed())?;
    let minutes = capture_u64(&MINUTES_RE, raw).map_err(|_| malformed())?;

    let total = round2(hours as f64 + minutes as f64 / 60.0);
    // Zero is never a valid runtime: nothing matched, or "0h 0m".
    if total > 0.0 {
        Ok(total)
    } else {
        Err(malformed())
    }
}

fn capture_u64(re: &Regex, s: &str) -> Result<u64, std::num::ParseIntError> {
    match re.captures(s) {
        Some(caps) => caps[1].parse(),
        None => Ok(0),
    }
}
