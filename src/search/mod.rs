//! Quota-aware paginated search over any [`SourceAdapter`].
//!
//! Each source gets `limit / sources.len()` matches at most. The remainder is
//! never redistributed, so a source with few matches leaves its share unused.
//! A failing source is abandoned with one [`ErrorRecord`]; the other sources
//! are still searched.

use crate::models::ErrorRecord;
use crate::source::{Record, SourceAdapter, SourceFetchError, SourceId};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Matches and failures from one search run.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Matching records, grouped by source in source order.
    pub results: Vec<Record>,
    /// One entry per abandoned source.
    pub errors: Vec<ErrorRecord>,
    /// Number of sources whose traversal was attempted.
    pub sources_searched: usize,
}

/// How a search run ended, so "no matches" is never confused with "every
/// source failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Every searched source finished without error.
    Complete,
    /// Some sources failed, others finished.
    Partial,
    /// Every searched source failed.
    AllFailed,
    /// Nothing failed and nothing matched.
    NoMatches,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStatus::Complete => write!(f, "complete"),
            SearchStatus::Partial => write!(f, "partial"),
            SearchStatus::AllFailed => write!(f, "all sources failed"),
            SearchStatus::NoMatches => write!(f, "no matches"),
        }
    }
}

impl SearchOutcome {
    pub fn status(&self) -> SearchStatus {
        if self.errors.is_empty() {
            if self.results.is_empty() {
                SearchStatus::NoMatches
            } else {
                SearchStatus::Complete
            }
        } else if self.errors.len() >= self.sources_searched {
            SearchStatus::AllFailed
        } else {
            SearchStatus::Partial
        }
    }

    fn absorb(&mut self, traversal: SourceTraversal) {
        if traversal.attempted {
            self.sources_searched += 1;
        }
        self.results.extend(traversal.records);
        self.errors.extend(traversal.error);
    }
}

/// What one source traversal produced. Owned by the traversal until the
/// fan-in step.
#[derive(Debug, Default)]
struct SourceTraversal {
    records: Vec<Record>,
    error: Option<ErrorRecord>,
    attempted: bool,
}

/// Matches allowed per source.
pub fn per_source_quota(limit: usize, source_count: usize) -> usize {
    if source_count == 0 {
        0
    } else {
        limit / source_count
    }
}

/// Search `sources` one after another.
pub async fn search<A>(adapter: &A, term: &str, sources: &[SourceId], limit: usize) -> SearchOutcome
where
    A: SourceAdapter + ?Sized,
{
    let quota = per_source_quota(limit, sources.len());
    info!(
        "Searching {} {} source(s) for {:?} (quota {} each)",
        sources.len(),
        adapter.name(),
        term,
        quota
    );

    let mut outcome = SearchOutcome::default();
    for source in sources {
        let traversal = traverse_source(adapter, term, source, quota).await;
        outcome.absorb(traversal);
    }
    outcome
}

/// Search `sources` concurrently. The result is identical to [`search`]:
/// traversals are joined back in source order.
pub async fn search_concurrent<A>(
    adapter: &A,
    term: &str,
    sources: &[SourceId],
    limit: usize,
) -> SearchOutcome
where
    A: SourceAdapter + ?Sized,
{
    let quota = per_source_quota(limit, sources.len());
    info!(
        "Searching {} {} source(s) concurrently for {:?} (quota {} each)",
        sources.len(),
        adapter.name(),
        term,
        quota
    );

    let traversals = join_all(
        sources
            .iter()
            .map(|source| traverse_source(adapter, term, source, quota)),
    )
    .await;

    let mut outcome = SearchOutcome::default();
    for traversal in traversals {
        outcome.absorb(traversal);
    }
    outcome
}

/// Search several adapters, each on its own task. Returns `(adapter name,
/// outcome)` pairs in input order. A task that dies is reported as a failure
/// of all its sources.
pub async fn search_platforms<A>(
    jobs: Vec<(Arc<A>, Vec<SourceId>)>,
    term: &str,
    limit: usize,
    concurrent: bool,
) -> Vec<(String, SearchOutcome)>
where
    A: SourceAdapter + 'static,
{
    let tasks: Vec<_> = jobs
        .into_iter()
        .map(|(adapter, sources)| {
            let name = adapter.name().to_string();
            let source_count = sources.len();
            let term = term.to_string();
            let handle = tokio::spawn(async move {
                if concurrent {
                    search_concurrent(adapter.as_ref(), &term, &sources, limit).await
                } else {
                    search(adapter.as_ref(), &term, &sources, limit).await
                }
            });
            (name, source_count, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(tasks.len());
    for (name, source_count, handle) in tasks {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Search task for {} failed: {}", name, e);
                SearchOutcome {
                    results: Vec::new(),
                    errors: vec![ErrorRecord::new("task", name.clone(), e.to_string())],
                    sources_searched: source_count.max(1),
                }
            }
        };
        outcomes.push((name, outcome));
    }
    outcomes
}

async fn traverse_source<A>(adapter: &A, term: &str, source: &SourceId, quota: usize) -> SourceTraversal
where
    A: SourceAdapter + ?Sized,
{
    if quota == 0 {
        debug!("Skipping {}:{}: quota is zero", adapter.name(), source);
        return SourceTraversal::default();
    }

    let mut records = Vec::new();
    let error = match collect_matches(adapter, term, source, quota, &mut records).await {
        Ok(()) => None,
        Err(e) => {
            warn!(
                "Abandoning {}:{} after {} match(es): {}",
                adapter.name(),
                source,
                records.len(),
                e
            );
            Some(ErrorRecord::from(&e))
        }
    };

    debug!(
        "Collected {} match(es) from {}:{}",
        records.len(),
        adapter.name(),
        source
    );

    SourceTraversal {
        records,
        error,
        attempted: true,
    }
}

/// Walk the pages of one source, pushing enriched matches into `records`
/// until the quota is met or the source is exhausted. Matches gathered
/// before a failure stay in `records`.
async fn collect_matches<A>(
    adapter: &A,
    term: &str,
    source: &SourceId,
    quota: usize,
    records: &mut Vec<Record>,
) -> Result<(), SourceFetchError>
where
    A: SourceAdapter + ?Sized,
{
    let mut page = adapter.fetch_first_page(source).await?;
    let mut pages = 1usize;

    loop {
        for record in page.items {
            if records.len() >= quota {
                break;
            }
            if adapter.matches(term, &record) {
                records.push(adapter.enrich(record).await?);
            }
        }

        if records.len() >= quota {
            return Ok(());
        }

        match page.next {
            Some(token) => {
                page = adapter.fetch_next_page(&token).await?;
                pages += 1;
                debug!("Fetched page {} of {}:{}", pages, adapter.name(), source);
            }
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FetchErrorKind, Page, PageToken};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory adapter serving pre-scripted pages.
    struct ScriptedAdapter {
        pages: HashMap<String, Vec<Vec<Record>>>,
        /// Fail when fetching this (source, page index).
        fail_page: Option<(String, usize)>,
        /// Fail when enriching a record with this id.
        fail_enrich: Option<String>,
        fetches: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                fail_page: None,
                fail_enrich: None,
                fetches: AtomicUsize::new(0),
            }
        }

        fn with_source(mut self, source: &str, pages: Vec<Vec<Record>>) -> Self {
            self.pages.insert(source.to_string(), pages);
            self
        }

        fn page(&self, source: &str, index: usize) -> Result<Page, SourceFetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_page.as_ref() == Some(&(source.to_string(), index)) {
                return Err(SourceFetchError::new(
                    FetchErrorKind::Transport,
                    format!("scripted:{}", source),
                    "connection reset",
                ));
            }
            let pages = self.pages.get(source).ok_or_else(|| {
                SourceFetchError::new(FetchErrorKind::Status, source, "unknown source")
            })?;
            let items = pages.get(index).cloned().unwrap_or_default();
            let next = (index + 1 < pages.len())
                .then(|| PageToken(format!("{}#{}", source, index + 1)));
            Ok(Page::new(items, next))
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError> {
            self.page(source.as_str(), 0)
        }

        async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError> {
            let (source, index) = token.as_str().split_once('#').unwrap();
            self.page(source, index.parse().unwrap())
        }

        fn matches(&self, term: &str, record: &Record) -> bool {
            crate::source::matches_fields(term, record, &["text"])
        }

        async fn enrich(&self, mut record: Record) -> Result<Record, SourceFetchError> {
            if record.get("id").and_then(Value::as_str) == self.fail_enrich.as_deref() {
                return Err(SourceFetchError::new(
                    FetchErrorKind::Timeout,
                    "scripted:comments",
                    "comments timed out",
                ));
            }
            record.insert("enriched".to_string(), json!(true));
            Ok(record)
        }
    }

    fn post(id: &str, text: &str) -> Record {
        json!({"id": id, "text": text}).as_object().cloned().unwrap()
    }

    /// `count` posts split into pages of `per_page`, every other one a match.
    fn pages(prefix: &str, count: usize, per_page: usize) -> Vec<Vec<Record>> {
        let posts: Vec<Record> = (0..count)
            .map(|i| {
                let text = if i % 2 == 0 { "Trump rally" } else { "weather" };
                post(&format!("{}{}", prefix, i), text)
            })
            .collect();
        posts.chunks(per_page).map(|c| c.to_vec()).collect()
    }

    fn sources(names: &[&str]) -> Vec<SourceId> {
        names.iter().map(|n| SourceId::from(*n)).collect()
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_per_source_quota() {
        assert_eq!(per_source_quota(10, 2), 5);
        assert_eq!(per_source_quota(10, 3), 3);
        assert_eq!(per_source_quota(2, 3), 0);
        assert_eq!(per_source_quota(10, 0), 0);
    }

    #[tokio::test]
    async fn test_two_sources_split_limit_evenly() {
        // 12 posts per source, 6 of them matching
        let adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 12, 4))
            .with_source("b", pages("b", 12, 4));

        let outcome = search(&adapter, "trump", &sources(&["a", "b"]), 10).await;

        assert_eq!(outcome.results.len(), 10);
        assert!(outcome.errors.is_empty());
        assert_eq!(
            ids(&outcome.results),
            vec!["a0", "a2", "a4", "a6", "a8", "b0", "b2", "b4", "b6", "b8"]
        );
        assert!(outcome.results.iter().all(|r| r["enriched"] == true));
        assert_eq!(outcome.status(), SearchStatus::Complete);
    }

    #[tokio::test]
    async fn test_failure_on_second_page_is_isolated() {
        let mut adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 12, 4))
            .with_source("b", pages("b", 12, 4));
        adapter.fail_page = Some(("a".to_string(), 1));

        let outcome = search(&adapter, "trump", &sources(&["a", "b"]), 10).await;

        // first page of "a" holds a0 and a2
        assert_eq!(
            ids(&outcome.results),
            vec!["a0", "a2", "b0", "b2", "b4", "b6", "b8"]
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].origin, "scripted:a");
        assert_eq!(outcome.errors[0].kind, "transport");
        assert_eq!(outcome.status(), SearchStatus::Partial);
    }

    #[tokio::test]
    async fn test_no_source_exceeds_quota() {
        let adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 40, 10))
            .with_source("b", pages("b", 40, 10))
            .with_source("c", pages("c", 40, 10));

        let outcome = search(&adapter, "TRUMP", &sources(&["a", "b", "c"]), 10).await;

        assert_eq!(outcome.results.len(), 9);
        for prefix in ["a", "b", "c"] {
            let from_source = ids(&outcome.results)
                .iter()
                .filter(|id| id.starts_with(prefix))
                .count();
            assert_eq!(from_source, 3);
        }
    }

    #[tokio::test]
    async fn test_short_source_is_not_compensated() {
        // "a" has only 2 matches; its unused quota does not move to "b"
        let adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 4, 4))
            .with_source("b", pages("b", 40, 10));

        let outcome = search(&adapter, "trump", &sources(&["a", "b"]), 10).await;

        assert_eq!(outcome.results.len(), 7);
        assert_eq!(outcome.status(), SearchStatus::Complete);
    }

    #[tokio::test]
    async fn test_more_sources_than_limit_yields_nothing() {
        let adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 10, 5))
            .with_source("b", pages("b", 10, 5))
            .with_source("c", pages("c", 10, 5));

        let outcome = search(&adapter, "trump", &sources(&["a", "b", "c"]), 2).await;

        assert!(outcome.results.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.status(), SearchStatus::NoMatches);
    }

    #[tokio::test]
    async fn test_stops_fetching_once_quota_met() {
        let adapter = ScriptedAdapter::new().with_source("a", pages("a", 100, 10));

        let outcome = search(&adapter, "trump", &sources(&["a"]), 5).await;

        assert_eq!(outcome.results.len(), 5);
        // each page holds 5 matches, so one fetch is enough
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enrich_failure_aborts_source() {
        let mut adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 12, 4))
            .with_source("b", pages("b", 12, 4));
        adapter.fail_enrich = Some("a4".to_string());

        let outcome = search(&adapter, "trump", &sources(&["a", "b"]), 10).await;

        assert_eq!(
            ids(&outcome.results),
            vec!["a0", "a2", "b0", "b2", "b4", "b6", "b8"]
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, "timeout");
    }

    #[tokio::test]
    async fn test_every_source_failing_is_distinguished() {
        let mut adapter = ScriptedAdapter::new().with_source("a", pages("a", 4, 4));
        adapter.fail_page = Some(("a".to_string(), 0));

        let outcome = search(&adapter, "trump", &sources(&["a", "missing"]), 10).await;

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.sources_searched, 2);
        assert_eq!(outcome.status(), SearchStatus::AllFailed);
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        // quota is 4; page 0 of "b" holds only b0 and b2, so page 1 is fetched and fails
        let mut adapter = ScriptedAdapter::new()
            .with_source("a", pages("a", 30, 4))
            .with_source("b", pages("b", 30, 3))
            .with_source("c", pages("c", 30, 3));
        adapter.fail_page = Some(("b".to_string(), 1));

        let names = sources(&["a", "b", "c"]);
        let sequential = search(&adapter, "trump", &names, 12).await;
        let concurrent = search_concurrent(&adapter, "trump", &names, 12).await;

        assert_eq!(
            ids(&concurrent.results),
            vec!["a0", "a2", "a4", "a6", "b0", "b2", "c0", "c2", "c4", "c6"]
        );
        assert_eq!(ids(&sequential.results), ids(&concurrent.results));

        assert_eq!(concurrent.errors.len(), 1);
        assert_eq!(sequential.errors.len(), 1);
        assert_eq!(concurrent.errors[0].origin, "scripted:b");
        assert_eq!(sequential.errors[0].origin, concurrent.errors[0].origin);
        assert_eq!(concurrent.sources_searched, 3);
        assert_eq!(concurrent.status(), SearchStatus::Partial);
    }

    #[tokio::test]
    async fn test_search_platforms_keeps_input_order() {
        let healthy = Arc::new(ScriptedAdapter::new().with_source("a", pages("a", 8, 4)));
        let mut broken = ScriptedAdapter::new().with_source("x", pages("x", 8, 4));
        broken.fail_page = Some(("x".to_string(), 0));
        let broken = Arc::new(broken);

        let outcomes = search_platforms(
            vec![
                (broken, sources(&["x"])),
                (healthy, sources(&["a"])),
            ],
            "trump",
            10,
            true,
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "scripted");
        assert_eq!(outcomes[0].1.status(), SearchStatus::AllFailed);
        assert_eq!(outcomes[1].1.results.len(), 4);
        assert_eq!(outcomes[1].1.status(), SearchStatus::Complete);
    }

    #[tokio::test]
    async fn test_empty_sources() {
        let adapter = ScriptedAdapter::new();
        let outcome = search(&adapter, "trump", &[], 10).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.status(), SearchStatus::NoMatches);
    }
}
