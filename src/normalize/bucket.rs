use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Ordered half-open intervals: a value lands in the first pair whose bound
/// exceeds it, or in `top` when it exceeds every bound.
pub struct BucketTable<B: 'static> {
    pub bounds: &'static [(f64, B)],
    pub top: B,
    pub unknown: B,
}

impl<B: Copy> BucketTable<B> {
    pub fn categorize(&self, value: Option<f64>) -> B {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            return self.unknown;
        };
        self.bounds
            .iter()
            .find(|(bound, _)| v < *bound)
            .map(|(_, bucket)| *bucket)
            .unwrap_or(self.top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DurationBucket {
    Short,
    Medium,
    Long,
    VeryLong,
    Unknown,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 5] = [
        DurationBucket::Short,
        DurationBucket::Medium,
        DurationBucket::Long,
        DurationBucket::VeryLong,
        DurationBucket::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DurationBucket::Short => "Short (< 1.5h)",
            DurationBucket::Medium => "Medium (1.5-2.5h)",
            DurationBucket::Long => "Long (2.5-3.5h)",
            DurationBucket::VeryLong => "Very Long (> 3.5h)",
            DurationBucket::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RatingBucket {
    Poor,
    Average,
    Good,
    Excellent,
    Masterpiece,
    Unrated,
}

impl RatingBucket {
    pub const ALL: [RatingBucket; 6] = [
        RatingBucket::Poor,
        RatingBucket::Average,
        RatingBucket::Good,
        RatingBucket::Excellent,
        RatingBucket::Masterpiece,
        RatingBucket::Unrated,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RatingBucket::Poor => "Poor (< 6.0)",
            RatingBucket::Average => "Average (6.0-7.0)",
            RatingBucket::Good => "Good (7.0-8.0)",
            RatingBucket::Excellent => "Excellent (8.0-9.0)",
            RatingBucket::Masterpiece => "Masterpiece (9.0+)",
            RatingBucket::Unrated => "Unrated",
        }
    }
}

/// Labels go to CSV and SQLite verbatim; consumers key on them.
macro_rules! label_traits {
    ($ty:ty, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.label())
            }
        }

        /// Accepts the full label or its leading word ("short", "very long").
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|b| {
                        let label = b.label().to_lowercase();
                        label == wanted
                            || label.split(" (").next() == Some(wanted.as_str())
                    })
                    .ok_or_else(|| format!("unknown {} bucket: {:?}", $what, s))
            }
        }
    };
}

label_traits!(DurationBucket, "duration");
label_traits!(RatingBucket, "rating");
