//! Shared keyword and bucket tables.
//!
//! Every consumer (CSV ingestion, report, store) reads these constants, so the
//! loader and the report can no longer drift apart. Changing a keyword or a
//! threshold changes the labels downstream: bump the table version.

use serde::{Deserialize, Serialize};

use super::bucket::{BucketTable, DurationBucket, RatingBucket};

/// Label used when no keyword matches, and for records without a title.
pub const DEFAULT_GENRE: &str = "Drama";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreTableVersion {
    /// Keyword set of the first CSV loader.
    V1,
    /// Dashboard keyword set: V1 plus extra keywords, `war` moved out of History.
    #[default]
    V2,
}

pub struct GenreKeywordTable {
    pub version: GenreTableVersion,
    /// Declared order is the match order; it decides the primary genre.
    pub entries: &'static [(&'static str, &'static [&'static str])],
}

impl GenreKeywordTable {
    pub fn for_version(version: GenreTableVersion) -> &'static GenreKeywordTable {
        match version {
            GenreTableVersion::V1 => &GENRES_V1,
            GenreTableVersion::V2 => &GENRES_V2,
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }
}

pub static GENRES_V1: GenreKeywordTable = GenreKeywordTable {
    version: GenreTableVersion::V1,
    entries: &[
        ("Action", &["action", "fight", "war", "battle", "combat", "martial"]),
        ("Romance", &["love", "romance", "wedding", "romantic", "heart"]),
        ("Horror", &["horror", "scary", "fear", "dark", "evil", "ghost", "zombie"]),
        ("Comedy", &["comedy", "funny", "laugh", "humor", "fun"]),
        ("Drama", &["drama", "life", "story", "human", "family"]),
        ("Sci-Fi", &["sci-fi", "space", "future", "robot", "alien", "time"]),
        ("Crime", &["crime", "murder", "detective", "police", "criminal"]),
        ("Adventure", &["adventure", "journey", "quest", "treasure", "exploration"]),
        ("Thriller", &["thriller", "suspense", "mystery", "dangerous"]),
        ("Fantasy", &["fantasy", "magic", "wizard", "dragon", "fairy"]),
        ("Animation", &["animation", "animated", "cartoon"]),
        ("Documentary", &["documentary", "real", "true"]),
        ("Biography", &["biography", "bio", "life of", "story of"]),
        ("History", &["history", "historical", "war", "ancient"]),
        ("Music", &["music", "musical", "song", "band", "concert"]),
        ("Sport", &["sport", "football", "basketball", "baseball", "olympic"]),
        ("Western", &["western", "cowboy", "frontier"]),
        ("Family", &["family", "kids", "children", "kid"]),
    ],
};

pub static GENRES_V2: GenreKeywordTable = GenreKeywordTable {
    version: GenreTableVersion::V2,
    entries: &[
        ("Action", &["action", "fight", "war", "battle", "combat", "martial", "warrior"]),
        ("Romance", &["love", "romance", "wedding", "romantic", "heart"]),
        ("Horror", &["horror", "scary", "fear", "dark", "evil", "ghost", "zombie", "demon"]),
        ("Comedy", &["comedy", "funny", "laugh", "humor", "fun", "comic"]),
        ("Drama", &["drama", "life", "story", "human", "family", "emotional"]),
        ("Sci-Fi", &["sci-fi", "space", "future", "robot", "alien", "time", "science"]),
        ("Crime", &["crime", "murder", "detective", "police", "criminal", "investigation"]),
        (
            "Adventure",
            &["adventure", "journey", "quest", "treasure", "exploration", "expedition"],
        ),
        ("Thriller", &["thriller", "suspense", "mystery", "dangerous", "tension"]),
        ("Fantasy", &["fantasy", "magic", "wizard", "dragon", "fairy", "mythical"]),
        ("Animation", &["animation", "animated", "cartoon", "anime"]),
        ("Documentary", &["documentary", "real", "true", "factual"]),
        ("Biography", &["biography", "bio", "life of", "story of", "based on"]),
        ("History", &["history", "historical", "ancient", "period", "era"]),
        ("Music", &["music", "musical", "song", "band", "concert", "singer"]),
        ("Sport", &["sport", "football", "basketball", "baseball", "olympic", "athlete"]),
        ("Western", &["western", "cowboy", "frontier", "wild west"]),
        ("Family", &["family", "kids", "children", "kid", "child"]),
    ],
};

pub static DURATION_BUCKETS: BucketTable<DurationBucket> = BucketTable {
    bounds: &[
        (1.5, DurationBucket::Short),
        (2.5, DurationBucket::Medium),
        (3.5, DurationBucket::Long),
    ],
    top: DurationBucket::VeryLong,
    unknown: DurationBucket::Unknown,
};

pub static RATING_BUCKETS: BucketTable<RatingBucket> = BucketTable {
    bounds: &[
        (6.0, RatingBucket::Poor),
        (7.0, RatingBucket::Average),
        (8.0, RatingBucket::Good),
        (9.0, RatingBucket::Excellent),
    ],
    top: RatingBucket::Masterpiece,
    unknown: RatingBucket::Unrated,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_ascending() {
        for pair in DURATION_BUCKETS.bounds.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        for pair in RATING_BUCKETS.bounds.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn keywords_are_lowercase() {
        for table in [&GENRES_V1, &GENRES_V2] {
            for (label, keywords) in table.entries {
                for kw in *keywords {
                    assert_eq!(*kw, kw.to_lowercase(), "{label}: {kw}");
                }
            }
        }
    }

    #[test]
    fn both_versions_share_label_order() {
        let v1: Vec<_> = GENRES_V1.labels().collect();
        let v2: Vec<_> = GENRES_V2.labels().collect();
        assert_eq!(v1, v2);
        assert!(v1.contains(&DEFAULT_GENRE));
    }
}
