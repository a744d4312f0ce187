use super::tables::{GenreKeywordTable, DEFAULT_GENRE};

/// Keyword-based genre guess from a title. Every genre with a keyword that
/// occurs as a substring of the lower-cased title is kept, in table order.
/// Never empty: falls back to [`DEFAULT_GENRE`].
///
/// `_year` is accepted for call-site symmetry with the report path and does
/// not influence matching.
pub fn classify(
    title: Option<&str>,
    _year: Option<i32>,
    table: &GenreKeywordTable,
) -> Vec<&'static str> {
    let Some(title) = title else {
        return vec![DEFAULT_GENRE];
    };
    let lower = title.to_lowercase();

    let genres: Vec<&'static str> = table
        .entries
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(label, _)| *label)
        .collect();

    if genres.is_empty() {
        vec![DEFAULT_GENRE]
    } else {
        genres
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::tables::{GENRES_V1, GENRES_V2};

    #[test]
    fn single_keyword() {
        let g = classify(Some("The Last War"), None, &GENRES_V2);
        assert_eq!(g, vec!["Action"]);
    }

    #[test]
    fn v1_also_files_war_under_history() {
        let g = classify(Some("The Last War"), None, &GENRES_V1);
        assert_eq!(g, vec!["Action", "History"]);
        assert_eq!(g[0], "Action");
    }

    #[test]
    fn multiple_matches_keep_table_order() {
        // "family" hits Drama and Family; "love" hits Romance, which comes first
        let g = classify(Some("A Family Love Affair"), None, &GENRES_V2);
        assert_eq!(g, vec!["Romance", "Drama", "Family"]);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(classify(Some("ZOMBIE NIGHT"), None, &GENRES_V2), vec!["Horror"]);
    }

    #[test]
    fn defaults_to_drama() {
        assert_eq!(classify(None, None, &GENRES_V2), vec!["Drama"]);
        assert_eq!(classify(Some("Oppenheimer"), Some(2023), &GENRES_V2), vec!["Drama"]);
        assert_eq!(classify(Some(""), None, &GENRES_V2), vec!["Drama"]);
    }

    #[test]
    fn substring_false_positives_are_kept() {
        // "warm" contains "war"; the heuristic accepts that
        assert_eq!(classify(Some("Warm Bodies"), None, &GENRES_V2)[0], "Action");
    }

    #[test]
    fn year_does_not_matter() {
        let a = classify(Some("Space Quest"), Some(1999), &GENRES_V2);
        let b = classify(Some("Space Quest"), None, &GENRES_V2);
        assert_eq!(a, b);
        assert_eq!(a, vec!["Sci-Fi", "Adventure"]);
    }
}
