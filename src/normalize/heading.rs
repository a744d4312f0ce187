use std::sync::LazyLock;

use regex::Regex;

static RANKED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.\s*(.*)$").unwrap());

/// Split a listing heading such as "12. Some Movie" into rank and title.
/// Headings without a leading "<n>." are all title.
pub fn split_heading(raw: Option<&str>) -> (Option<u32>, String) {
    let Some(text) = raw.filter(|s| !s.is_empty()) else {
        return (None, String::new());
    };

    // One trailing newline does not block the match.
    let line = text.strip_suffix('\n').unwrap_or(text);
    if let Some(caps) = RANKED_RE.captures(line) {
        // A rank too large for u32 is not a rank; keep the whole heading as title.
        if let Ok(rank) = caps[1].parse::<u32>() {
            return (Some(rank), caps[2].trim().to_string());
        }
    }
    (None, text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_heading() {
        assert_eq!(split_heading(Some("12. Some Movie")), (Some(12), "Some Movie".into()));
        assert_eq!(split_heading(Some("1.Dune: Part Two ")), (Some(1), "Dune: Part Two".into()));
    }

    #[test]
    fn unranked_heading() {
        assert_eq!(split_heading(Some("Untitled Thing")), (None, "Untitled Thing".into()));
        assert_eq!(split_heading(Some("  Padded  ")), (None, "Padded".into()));
        // leading whitespace defeats the anchor, like the scraper it came from
        assert_eq!(split_heading(Some(" 3. Three")), (None, "3. Three".into()));
    }

    #[test]
    fn number_without_period_is_title() {
        assert_eq!(split_heading(Some("1917")), (None, "1917".into()));
        assert_eq!(split_heading(Some("2001 A Space Odyssey")), (None, "2001 A Space Odyssey".into()));
    }

    #[test]
    fn empty_heading() {
        assert_eq!(split_heading(None), (None, String::new()));
        assert_eq!(split_heading(Some("")), (None, String::new()));
    }

    #[test]
    fn single_trailing_newline() {
        assert_eq!(split_heading(Some("12. Title\n")), (Some(12), "Title".into()));
        // an inner newline still defeats the match
        assert_eq!(split_heading(Some("12. Two\nLines")), (None, "12. Two\nLines".into()));
    }

    #[test]
    fn rank_only() {
        assert_eq!(split_heading(Some("7.")), (Some(7), String::new()));
    }
}
