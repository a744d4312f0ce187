use std::cmp::Ordering;

use itertools::Itertools;

use crate::normalize::{DurationBucket, NormalizedRecord, RatingBucket};

const HIGH_QUALITY_RATING: f64 = 8.0;
const POPULAR_VOTES: u64 = 10_000;

/// Sidebar-style filters. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub duration: Option<DurationBucket>,
    /// Unrated records never pass a rating threshold.
    pub min_rating: Option<f64>,
    /// Missing vote counts compare as 0.
    pub min_votes: Option<u64>,
    /// Exact primary-genre label.
    pub genre: Option<String>,
}

impl Filter {
    pub fn matches(&self, r: &NormalizedRecord) -> bool {
        self.duration.map_or(true, |d| r.duration_bucket == d)
            && self
                .min_rating
                .map_or(true, |min| r.rating.is_some_and(|v| v >= min))
            && self.min_votes.map_or(true, |min| r.votes.unwrap_or(0) >= min)
            && self.genre.as_deref().map_or(true, |g| r.primary_genre == g)
    }

    pub fn apply<'a>(&self, records: &'a [NormalizedRecord]) -> Vec<&'a NormalizedRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.min_rating.is_none()
            && self.min_votes.is_none()
            && self.genre.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingStats {
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub rated: usize,
    pub with_duration: usize,
    pub rating: Option<RatingStats>,
    pub total_votes: u64,
    pub mean_votes: Option<f64>,
    pub most_voted: Option<String>,
    pub mean_duration: Option<f64>,
    pub shortest: Option<(String, f64)>,
    pub longest: Option<(String, f64)>,
    /// Primary-genre counts, largest first; ties by label.
    pub genre_counts: Vec<(&'static str, usize)>,
    pub rating_buckets: Vec<(RatingBucket, usize)>,
    pub duration_buckets: Vec<(DurationBucket, usize)>,
    pub highest_rated_genre: Option<(&'static str, f64)>,
    pub year_range: Option<(i32, i32)>,
    pub most_productive_year: Option<(i32, usize)>,
    pub high_quality: usize,
    pub popular_and_quality: usize,
}

impl Summary {
    pub fn compute(records: &[&NormalizedRecord]) -> Summary {
        let ratings: Vec<f64> = records.iter().filter_map(|r| r.rating).collect();
        let durations: Vec<f64> = records.iter().filter_map(|r| r.duration_hours).collect();
        let votes: Vec<u64> = records.iter().filter_map(|r| r.votes).collect();

        let most_voted = first_extreme(records, |r| r.votes.map(|v| v as f64), Ordering::Greater)
            .map(|r| r.title.clone());
        let shortest = first_extreme(records, |r| r.duration_hours, Ordering::Less)
            .and_then(|r| Some((r.title.clone(), r.duration_hours?)));
        let longest = first_extreme(records, |r| r.duration_hours, Ordering::Greater)
            .and_then(|r| Some((r.title.clone(), r.duration_hours?)));

        let genre_counts: Vec<(&'static str, usize)> = records
            .iter()
            .map(|r| r.primary_genre)
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)))
            .collect();

        let rating_counts = records.iter().map(|r| r.rating_bucket).counts();
        let rating_buckets = RatingBucket::ALL
            .iter()
            .filter_map(|b| rating_counts.get(b).map(|n| (*b, *n)))
            .collect();
        let duration_counts = records.iter().map(|r| r.duration_bucket).counts();
        let duration_buckets = DurationBucket::ALL
            .iter()
            .filter_map(|b| duration_counts.get(b).map(|n| (*b, *n)))
            .collect();

        let highest_rated_genre = genre_averages(records)
            .into_iter()
            .filter_map(|g| g.mean_rating.map(|m| (g.genre, m)))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(a.0)));

        let years: Vec<i32> = records.iter().filter_map(|r| r.year).collect();
        let year_range = years.iter().copied().minmax().into_option();
        let most_productive_year = years
            .iter()
            .copied()
            .counts()
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));

        let high_quality = records
            .iter()
            .filter(|r| r.rating.is_some_and(|v| v >= HIGH_QUALITY_RATING))
            .count();
        let popular_and_quality = records
            .iter()
            .filter(|r| {
                r.rating.is_some_and(|v| v >= HIGH_QUALITY_RATING)
                    && r.votes.is_some_and(|v| v >= POPULAR_VOTES)
            })
            .count();

        Summary {
            total: records.len(),
            rated: ratings.len(),
            with_duration: durations.len(),
            rating: rating_stats(&ratings),
            total_votes: sum_votes(votes.iter().copied()),
            mean_votes: mean(votes.iter().map(|v| *v as f64)),
            most_voted,
            mean_duration: mean(durations.iter().copied()),
            shortest,
            longest,
            genre_counts,
            rating_buckets,
            duration_buckets,
            highest_rated_genre,
            year_range,
            most_productive_year,
            high_quality,
            popular_and_quality,
        }
    }

    pub fn most_popular_genre(&self) -> Option<&'static str> {
        self.genre_counts.first().map(|(g, _)| *g)
    }
}

/// Rated records, best first. Ties keep input order.
pub fn top_rated<'a>(records: &[&'a NormalizedRecord], n: usize) -> Vec<&'a NormalizedRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.rating.is_some())
        .sorted_by(|a, b| cmp_desc(a.rating, b.rating))
        .take(n)
        .collect()
}

/// Best-rated record of each primary genre, best first.
pub fn genre_leaders<'a>(records: &[&'a NormalizedRecord]) -> Vec<&'a NormalizedRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.rating.is_some())
        .into_group_map_by(|r| r.primary_genre)
        .into_values()
        .filter_map(|group| {
            group
                .into_iter()
                .reduce(|best, r| if r.rating > best.rating { r } else { best })
        })
        .sorted_by(|a, b| cmp_desc(a.rating, b.rating).then(a.primary_genre.cmp(b.primary_genre)))
        .collect()
}

/// `n` shortest and `n` longest records with a known duration.
pub fn duration_extremes<'a>(
    records: &[&'a NormalizedRecord],
    n: usize,
) -> (Vec<&'a NormalizedRecord>, Vec<&'a NormalizedRecord>) {
    let timed: Vec<&NormalizedRecord> = records
        .iter()
        .copied()
        .filter(|r| r.duration_hours.is_some())
        .sorted_by(|a, b| cmp_desc(b.duration_hours, a.duration_hours))
        .collect();
    let shortest = timed.iter().copied().take(n).collect();
    let longest = timed
        .iter()
        .copied()
        .sorted_by(|a, b| cmp_desc(a.duration_hours, b.duration_hours))
        .take(n)
        .collect();
    (shortest, longest)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreAverage {
    pub genre: &'static str,
    pub movies: usize,
    pub mean_rating: Option<f64>,
    pub mean_duration: Option<f64>,
    pub total_votes: u64,
}

/// Per primary genre aggregates, ordered by label.
pub fn genre_averages(records: &[&NormalizedRecord]) -> Vec<GenreAverage> {
    records
        .iter()
        .copied()
        .into_group_map_by(|r| r.primary_genre)
        .into_iter()
        .map(|(genre, group)| GenreAverage {
            genre,
            movies: group.len(),
            mean_rating: mean(group.iter().filter_map(|r| r.rating)),
            mean_duration: mean(group.iter().filter_map(|r| r.duration_hours)),
            total_votes: sum_votes(group.iter().filter_map(|r| r.votes)),
        })
        .sorted_by(|a, b| a.genre.cmp(b.genre))
        .collect()
}

/// Saturates at `u64::MAX`; vote strings are not range-checked upstream.
fn sum_votes(votes: impl Iterator<Item = u64>) -> u64 {
    votes.fold(0, u64::saturating_add)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn rating_stats(ratings: &[f64]) -> Option<RatingStats> {
    if ratings.is_empty() {
        return None;
    }
    let sorted: Vec<f64> = ratings.iter().copied().sorted_by(f64::total_cmp).collect();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    Some(RatingStats {
        mean: mean(sorted.iter().copied())?,
        median,
        max: sorted[sorted.len() - 1],
        min: sorted[0],
    })
}

/// Descending order over optional values; `None` sorts last.
fn cmp_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// First record whose key is strictly beyond every earlier one in `direction`.
fn first_extreme<'a>(
    records: &[&'a NormalizedRecord],
    key: impl Fn(&NormalizedRecord) -> Option<f64>,
    direction: Ordering,
) -> Option<&'a NormalizedRecord> {
    let mut best: Option<(&NormalizedRecord, f64)> = None;
    for r in records.iter().copied() {
        let Some(k) = key(r) else { continue };
        match best {
            Some((_, b)) if k.total_cmp(&b) != direction => {}
            _ => best = Some((r, k)),
        }
    }
    best.map(|(r, _)| r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{fields, Normalizer, RawRecord};

    fn movie(title: &str, year: &str, rating: &str, runtime: &str, votes: &str) -> NormalizedRecord {
        Normalizer::default().normalize(
            &RawRecord::new()
                .with(fields::TITLE, title)
                .with(fields::YEAR, year)
                .with(fields::RATING, rating)
                .with(fields::RUNTIME, runtime)
                .with(fields::VOTES, votes),
        )
    }

    fn dataset() -> Vec<NormalizedRecord> {
        vec![
            movie("Dark Night", "2024", "6.5", "1h 20m", "5K"),      // Horror
            movie("Ghost Town", "2024", "8.2", "2h", "50K"),         // Horror
            movie("Space Quest", "2023", "9.1", "3h 40m", "1.2M"),   // Sci-Fi
            movie("Love Letters", "2024", "7.0", "1h 45m", "800"),   // Romance
            movie("Nowhere", "N/A", "N/A", "N/A", "N/A"),            // Drama
        ]
    }

    fn refs(v: &[NormalizedRecord]) -> Vec<&NormalizedRecord> {
        v.iter().collect()
    }

    #[test]
    fn huge_vote_counts_saturate() {
        let data = vec![
            movie("Ghost One", "2024", "7.0", "1h", "18446744073709551615"),
            movie("Ghost Two", "2024", "7.5", "1h", "18446744073709551615"),
        ];
        assert_eq!(data[0].votes, Some(u64::MAX));

        let s = Summary::compute(&refs(&data));
        assert_eq!(s.total_votes, u64::MAX);
        let avgs = genre_averages(&refs(&data));
        assert_eq!(avgs.len(), 1);
        assert_eq!(avgs[0].total_votes, u64::MAX);
    }

    #[test]
    fn filter_matches_like_the_sidebar() {
        let data = dataset();
        let f = Filter {
            min_rating: Some(7.0),
            ..Filter::default()
        };
        let titles: Vec<_> = f.apply(&data).iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Ghost Town", "Space Quest", "Love Letters"]);

        let f = Filter {
            genre: Some("Horror".into()),
            min_votes: Some(10_000),
            ..Filter::default()
        };
        assert_eq!(f.apply(&data).len(), 1);

        let f = Filter {
            duration: Some(DurationBucket::Unknown),
            ..Filter::default()
        };
        assert_eq!(f.apply(&data)[0].title, "Nowhere");

        assert!(Filter::default().is_empty());
        assert_eq!(Filter::default().apply(&data).len(), 5);
    }

    #[test]
    fn summary_numbers() {
        let data = dataset();
        let s = Summary::compute(&refs(&data));
        assert_eq!(s.total, 5);
        assert_eq!(s.rated, 4);
        assert_eq!(s.with_duration, 4);
        let rating = s.rating.clone().unwrap();
        assert_eq!(rating.max, 9.1);
        assert_eq!(rating.min, 6.5);
        assert!((rating.median - 7.6).abs() < 1e-9);
        assert!((rating.mean - 7.7).abs() < 1e-9);
        assert_eq!(s.total_votes, 5_000 + 50_000 + 1_200_000 + 800);
        assert_eq!(s.most_voted.as_deref(), Some("Space Quest"));
        assert_eq!(s.shortest, Some(("Dark Night".to_string(), 1.33)));
        assert_eq!(s.longest, Some(("Space Quest".to_string(), 3.67)));
        assert_eq!(s.year_range, Some((2023, 2024)));
        assert_eq!(s.most_productive_year, Some((2024, 3)));
        assert_eq!(s.high_quality, 2);
        assert_eq!(s.popular_and_quality, 2);
    }

    #[test]
    fn genre_distribution() {
        let data = dataset();
        let s = Summary::compute(&refs(&data));
        assert_eq!(s.genre_counts[0], ("Horror", 2));
        assert_eq!(s.most_popular_genre(), Some("Horror"));
        // remaining ties sorted by label
        let rest: Vec<_> = s.genre_counts[1..].iter().map(|(g, _)| *g).collect();
        assert_eq!(rest, vec!["Drama", "Romance", "Sci-Fi"]);
        assert_eq!(s.highest_rated_genre, Some(("Sci-Fi", 9.1)));
    }

    #[test]
    fn bucket_distribution() {
        let data = dataset();
        let s = Summary::compute(&refs(&data));
        assert!(s.rating_buckets.contains(&(RatingBucket::Unrated, 1)));
        assert!(s.rating_buckets.contains(&(RatingBucket::Good, 1)));
        assert!(s.duration_buckets.contains(&(DurationBucket::VeryLong, 1)));
        assert_eq!(s.rating_buckets.iter().map(|(_, n)| n).sum::<usize>(), 5);
    }

    #[test]
    fn empty_summary() {
        let s = Summary::compute(&[]);
        assert_eq!(s.total, 0);
        assert!(s.rating.is_none());
        assert!(s.most_popular_genre().is_none());
        assert!(s.year_range.is_none());
    }

    #[test]
    fn tables() {
        let data = dataset();
        let all = refs(&data);

        let top: Vec<_> = top_rated(&all, 2).iter().map(|r| r.title.as_str()).collect();
        assert_eq!(top, vec!["Space Quest", "Ghost Town"]);

        let leaders: Vec<_> = genre_leaders(&all).iter().map(|r| r.title.as_str()).collect();
        assert_eq!(leaders, vec!["Space Quest", "Ghost Town", "Love Letters"]);

        let (short, long) = duration_extremes(&all, 2);
        assert_eq!(short[0].title, "Dark Night");
        assert_eq!(short[1].title, "Love Letters");
        assert_eq!(long[0].title, "Space Quest");
        assert_eq!(long[1].title, "Ghost Town");
    }

    #[test]
    fn averages_by_genre() {
        let data = dataset();
        let avgs = genre_averages(&refs(&data));
        let horror = avgs.iter().find(|g| g.genre == "Horror").unwrap();
        assert_eq!(horror.movies, 2);
        assert_eq!(horror.total_votes, 55_000);
        assert!((horror.mean_rating.unwrap() - 7.35).abs() < 1e-9);
        let drama = avgs.iter().find(|g| g.genre == "Drama").unwrap();
        assert_eq!(drama.mean_rating, None);
        assert_eq!(drama.mean_duration, None);
    }
}
