use std::collections::HashSet;
use std::sync::Arc;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::sunburst::Partition;

pub(super) struct SearchMatchCache {
    query: String,
    layout_revision: u64,
    matches: Arc<HashSet<usize>>,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Wedges whose names fuzzy-match `query`.
pub(super) fn search_matches(partition: &Partition, query: &str) -> HashSet<usize> {
    let matcher = SkimMatcherV2::default();
    partition
        .wedge_indices()
        .filter(|&index| {
            partition
                .node(index)
                .is_some_and(|node| fuzzy_match_score(&matcher, &node.name, query).is_some())
        })
        .collect()
}

/// Returns cached matches for `query`, recomputing when the query or the
/// layout changed. `None` for a blank query.
pub(super) fn cached_search_matches(
    cache: &mut Option<SearchMatchCache>,
    partition: &Partition,
    layout_revision: u64,
    query: &str,
) -> Option<Arc<HashSet<usize>>> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if let Some(cached) = cache.as_ref()
        && cached.layout_revision == layout_revision
        && cached.query == query
    {
        return Some(Arc::clone(&cached.matches));
    }

    let matches = Arc::new(search_matches(partition, query));
    *cache = Some(SearchMatchCache {
        query: query.to_owned(),
        layout_revision,
        matches: Arc::clone(&matches),
    });
    Some(matches)
}
