//! Result ranking and deduplication.

use std::collections::HashSet;

use crate::PageMatch;

/// Ranks page matches.
///
/// This performs:
/// 1. A stable sort by match count, highest first, so equal counts keep
///    discovery order
/// 2. Deduplication by URL, keeping the first (best ranked) entry
pub fn rank(mut results: Vec<PageMatch>) -> Vec<PageMatch> {
    results.sort_by(|a, b| b.match_count.cmp(&a.match_count));

    let mut seen = HashSet::new();
    results.retain(|result| seen.insert(result.url.clone()));
    results
}
