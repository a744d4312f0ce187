pub mod bucket;
pub mod genre;
pub mod heading;
pub mod record;
pub mod runtime;
pub mod tables;
pub mod votes;

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, warn};

pub use bucket::{DurationBucket, RatingBucket};
pub use record::{fields, NormalizedRecord, RawRecord};
pub use tables::GenreTableVersion;
use tables::{GenreKeywordTable, DURATION_BUCKETS, RATING_BUCKETS};

use crate::progress::progress_bar;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// Absent, empty, or the literal "N/A".
    #[error("value missing")]
    Missing,
    #[error("malformed {field} value: {raw:?}")]
    Malformed { field: &'static str, raw: String },
}

impl FieldError {
    pub fn malformed(field: &'static str, raw: &str) -> Self {
        FieldError::Malformed {
            field,
            raw: raw.to_string(),
        }
    }
}

pub type FieldResult<T> = Result<T, FieldError>;

/// A malformed field found while normalizing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub error: FieldError,
}

pub(crate) fn is_missing(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "N/A"
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Plain numeric coercion: anything that is not a finite number is malformed.
pub fn parse_number(raw: Option<&str>, field: &'static str) -> FieldResult<f64> {
    let raw = raw.filter(|s| !is_missing(s)).ok_or(FieldError::Missing)?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FieldError::malformed(field, raw))
}

/// Numeric coercion for integer columns; "2024.0" is accepted, "2024.5" is not.
fn parse_integral<T: TryFrom<i64>>(raw: Option<&str>, field: &'static str) -> FieldResult<T> {
    let v = parse_number(raw, field)?;
    let bad = || FieldError::malformed(field, raw.unwrap_or_default());
    if v.fract() != 0.0 || v.abs() > i64::MAX as f64 {
        return Err(bad());
    }
    T::try_from(v as i64).map_err(|_| bad())
}

fn keep<T>(issues: &mut Vec<FieldIssue>, field: &'static str, res: FieldResult<T>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(FieldError::Missing) => None,
        Err(error) => {
            issues.push(FieldIssue { field, error });
            None
        }
    }
}

pub struct BatchOutcome {
    pub records: Vec<NormalizedRecord>,
    /// Malformed-field counts keyed by raw field name.
    pub issues: BTreeMap<&'static str, usize>,
}

impl BatchOutcome {
    pub fn malformed_total(&self) -> usize {
        self.issues.values().sum()
    }
}

/// Turns RawRecords into NormalizedRecords. Pure; holds only a reference to a
/// static keyword table, so one instance can be shared across threads.
#[derive(Clone, Copy)]
pub struct Normalizer {
    genres: &'static GenreKeywordTable,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(GenreTableVersion::default())
    }
}

impl Normalizer {
    pub fn new(version: GenreTableVersion) -> Self {
        Normalizer {
            genres: GenreKeywordTable::for_version(version),
        }
    }

    pub fn table_version(&self) -> GenreTableVersion {
        self.genres.version
    }

    pub fn normalize(&self, raw: &RawRecord) -> NormalizedRecord {
        self.normalize_detailed(raw).0
    }

    /// Like [`Normalizer::normalize`], also returning the fields that were present
    /// but unparsable. A `None` field without an issue was simply missing.
    pub fn normalize_detailed(&self, raw: &RawRecord) -> (NormalizedRecord, Vec<FieldIssue>) {
        let mut issues = Vec::new();

        let (heading_rank, heading_title) = heading::split_heading(
            raw.get(fields::HEADING).filter(|s| !s.trim().is_empty()),
        );
        let title = if heading_title.is_empty() {
            raw.get(fields::TITLE)
                .filter(|s| !is_missing(s))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        } else {
            heading_title
        };
        let rank = match heading_rank {
            Some(r) => Some(r),
            None => keep(
                &mut issues,
                fields::RANK,
                parse_integral::<u32>(raw.get(fields::RANK), fields::RANK),
            ),
        };

        let year = keep(
            &mut issues,
            fields::YEAR,
            parse_integral::<i32>(raw.get(fields::YEAR), fields::YEAR),
        );
        let rating = keep(
            &mut issues,
            fields::RATING,
            parse_number(raw.get(fields::RATING), fields::RATING),
        );
        let duration_hours = keep(
            &mut issues,
            fields::RUNTIME,
            runtime::parse_runtime(raw.get(fields::RUNTIME)),
        );

        // Prefer the pre-parsed column; fall back to the display string.
        let votes_res = votes::parse_votes(raw.get(fields::VOTES_NUMERIC)).or_else(|first| {
            match votes::parse_votes(raw.get(fields::VOTES)) {
                Err(FieldError::Missing) => Err(first),
                other => other,
            }
        });
        let votes = keep(&mut issues, fields::VOTES, votes_res);

        let url = raw
            .get(fields::URL)
            .filter(|s| !is_missing(s))
            .map(|s| s.trim().to_string());

        let genre_title = (!title.is_empty()).then_some(title.as_str());
        let genres = genre::classify(genre_title, year, self.genres);
        let primary_genre = genres[0];

        let record = NormalizedRecord {
            title,
            rank,
            year,
            url,
            duration_hours,
            rating,
            votes,
            genres,
            primary_genre,
            duration_bucket: DURATION_BUCKETS.categorize(duration_hours),
            rating_bucket: RATING_BUCKETS.categorize(rating),
        };
        (record, issues)
    }

    /// Normalize a batch on the rayon pool, `chunk_size` records at a time.
    /// Output order matches input order.
    pub fn normalize_batch(&self, raws: &[RawRecord], chunk_size: usize) -> BatchOutcome {
        let pb = progress_bar(raws.len() as u64);
        let mut records = Vec::with_capacity(raws.len());
        let mut issues: BTreeMap<&'static str, usize> = BTreeMap::new();

        for chunk in raws.chunks(chunk_size.max(1)) {
            let results: Vec<_> = chunk
                .par_iter()
                .map(|raw| self.normalize_detailed(raw))
                .collect();

            for (record, found) in results {
                for issue in found {
                    debug!(title = %record.title, "{}", issue.error);
                    *issues.entry(issue.field).or_default() += 1;
                }
                records.push(record);
            }
            pb.inc(chunk.len() as u64);
        }
        pb.finish_and_clear();

        for (field, count) in &issues {
            warn!("{} malformed {} value(s) treated as missing", count, field);
        }
        BatchOutcome { records, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawRecord {
        RawRecord::new()
            .with(fields::RANK, "3")
            .with(fields::TITLE, "The Last War")
            .with(fields::YEAR, "2024")
            .with(fields::RUNTIME, "2h 30m")
            .with(fields::RATING, "8.5")
            .with(fields::VOTES, "946K")
            .with(fields::URL, "https://www.imdb.com/title/tt0000001/")
    }

    #[test]
    fn normalizes_full_record() {
        let r = Normalizer::default().normalize(&sample());
        assert_eq!(r.title, "The Last War");
        assert_eq!(r.rank, Some(3));
        assert_eq!(r.year, Some(2024));
        assert_eq!(r.duration_hours, Some(2.5));
        assert_eq!(r.rating, Some(8.5));
        assert_eq!(r.votes, Some(946_000));
        assert_eq!(r.genres, vec!["Action"]);
        assert_eq!(r.primary_genre, "Action");
        assert_eq!(r.duration_bucket, DurationBucket::Long);
        assert_eq!(r.rating_bucket.label(), "Excellent (8.0-9.0)");
        assert_eq!(r.url.as_deref(), Some("https://www.imdb.com/title/tt0000001/"));
    }

    #[test]
    fn idempotent() {
        let n = Normalizer::default();
        let raw = sample();
        assert_eq!(n.normalize(&raw), n.normalize(&raw));
    }

    #[test]
    fn all_absent_record() {
        let (r, issues) = Normalizer::default().normalize_detailed(&RawRecord::new());
        assert!(issues.is_empty());
        assert_eq!(r.title, "");
        assert_eq!(r.rank, None);
        assert_eq!(r.year, None);
        assert_eq!(r.url, None);
        assert_eq!(r.duration_hours, None);
        assert_eq!(r.rating, None);
        assert_eq!(r.votes, None);
        assert_eq!(r.genres, vec!["Drama"]);
        assert_eq!(r.primary_genre, "Drama");
        assert_eq!(r.duration_bucket, DurationBucket::Unknown);
        assert_eq!(r.rating_bucket, RatingBucket::Unrated);
    }

    #[test]
    fn heading_wins_over_title_and_rank() {
        let raw = sample().with(fields::HEADING, "12. Space Wedding");
        let r = Normalizer::default().normalize(&raw);
        assert_eq!(r.rank, Some(12));
        assert_eq!(r.title, "Space Wedding");
        assert_eq!(r.genres, vec!["Romance", "Sci-Fi"]);
    }

    #[test]
    fn malformed_fields_degrade_alone() {
        let raw = sample()
            .with(fields::YEAR, "TBA")
            .with(fields::RATING, "great")
            .with(fields::VOTES, "lots");
        let (r, issues) = Normalizer::default().normalize_detailed(&raw);
        assert_eq!(r.year, None);
        assert_eq!(r.rating, None);
        assert_eq!(r.votes, None);
        assert_eq!(r.rating_bucket, RatingBucket::Unrated);
        assert_eq!(r.duration_hours, Some(2.5));
        assert_eq!(r.title, "The Last War");

        let fields_hit: Vec<_> = issues.iter().map(|i| i.field).collect();
        assert_eq!(fields_hit, vec![fields::YEAR, fields::RATING, fields::VOTES]);
    }

    #[test]
    fn numeric_votes_column_preferred() {
        let raw = sample().with(fields::VOTES_NUMERIC, "946123.0");
        assert_eq!(Normalizer::default().normalize(&raw).votes, Some(946_123));

        let raw = sample().with(fields::VOTES_NUMERIC, "");
        assert_eq!(Normalizer::default().normalize(&raw).votes, Some(946_000));
    }

    #[test]
    fn year_coercion() {
        let n = Normalizer::default();
        assert_eq!(n.normalize(&sample().with(fields::YEAR, "2024.0")).year, Some(2024));
        assert_eq!(n.normalize(&sample().with(fields::YEAR, "2024.5")).year, None);
        assert_eq!(n.normalize(&sample().with(fields::YEAR, " 1999 ")).year, Some(1999));
    }

    #[test]
    fn negative_rank_is_dropped() {
        let r = Normalizer::default().normalize(&sample().with(fields::RANK, "-4"));
        assert_eq!(r.rank, None);
    }

    #[test]
    fn na_title_is_missing() {
        let r = Normalizer::default().normalize(&sample().with(fields::TITLE, "N/A"));
        assert!(!r.has_title());
        assert_eq!(r.genres, vec!["Drama"]);
    }

    #[test]
    fn nan_rating_is_malformed() {
        let (r, issues) = Normalizer::default().normalize_detailed(&sample().with(fields::RATING, "NaN"));
        assert_eq!(r.rating, None);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn batch_keeps_order_and_counts_issues() {
        let raws: Vec<RawRecord> = (0..25)
            .map(|i| {
                let raw = sample().with(fields::RANK, i.to_string());
                if i % 5 == 0 {
                    raw.with(fields::RUNTIME, "soon")
                } else {
                    raw
                }
            })
            .collect();
        let out = Normalizer::default().normalize_batch(&raws, 4);
        assert_eq!(out.records.len(), 25);
        let ranks: Vec<_> = out.records.iter().map(|r| r.rank.unwrap()).collect();
        assert_eq!(ranks, (0..25).collect::<Vec<u32>>());
        assert_eq!(out.issues.get(fields::RUNTIME), Some(&5));
        assert_eq!(out.malformed_total(), 5);
    }

    #[test]
    fn legacy_table_changes_labels() {
        let r = Normalizer::new(GenreTableVersion::V1).normalize(&sample());
        assert_eq!(r.genres, vec!["Action", "History"]);
        assert_eq!(r.primary_genre, "Action");
    }
}
