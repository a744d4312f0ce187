use std::collections::BTreeMap;

use serde::Serialize;

use super::bucket::{DurationBucket, RatingBucket};

/// Raw field names, as written by the scraper and read from CSV.
pub mod fields {
    pub const RANK: &str = "Rank";
    pub const HEADING: &str = "Heading";
    pub const TITLE: &str = "Title";
    pub const YEAR: &str = "Year";
    pub const RUNTIME: &str = "Runtime";
    pub const RATING: &str = "IMDb Rating";
    pub const VOTES: &str = "Votes";
    pub const VOTES_NUMERIC: &str = "Votes_Numeric";
    pub const URL: &str = "URL";
}

/// One scraped or loaded item before normalization. Absent keys are missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    values: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawRecord {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One item after typed-field derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub title: String,
    pub rank: Option<u32>,
    pub year: Option<i32>,
    pub url: Option<String>,
    pub duration_hours: Option<f64>,
    pub rating: Option<f64>,
    pub votes: Option<u64>,
    /// Never empty.
    pub genres: Vec<&'static str>,
    /// Always `genres[0]`.
    pub primary_genre: &'static str,
    pub duration_bucket: DurationBucket,
    pub rating_bucket: RatingBucket,
}

impl NormalizedRecord {
    pub fn genres_joined(&self) -> String {
        self.genres.join(", ")
    }

    pub fn has_title(&self) -> bool {
        !self.title.is_empty()
    }
}
