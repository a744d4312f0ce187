use tracing::info;

use crate::normalize::NormalizedRecord;

/// Which normalized rows are kept for storage and reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestPolicy {
    pub require_rating: bool,
}

/// Drop rows without a title and, under `require_rating`, rows without a
/// rating. Returns how many were dropped.
pub fn retain_usable(records: &mut Vec<NormalizedRecord>, policy: IngestPolicy) -> usize {
    let before = records.len();
    records.retain(|r| r.has_title() && (!policy.require_rating || r.rating.is_some()));
    let dropped = before - records.len();
    if dropped > 0 {
        info!("Dropped {} unusable rows ({} kept)", dropped, records.len());
    }
    dropped
}
