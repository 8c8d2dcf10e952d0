//! Where a list view's records come from.
//!
//! Client-local sources hold (or fetch once) the full collection and
//! filter, sort and slice it in memory. Server-driven sources send the
//! query to the API and receive exactly one page back.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use tokio::sync::Mutex;
use tracing::debug;

use super::pagination::PaginationState;
use super::sort::SortState;
use crate::api::{ApiClient, ApiError};
use crate::filters::{
    passes_time_range, passes_values, AnnotatorFilter, Dimension, FilterContext, FilterState,
    TimeRange,
};
use crate::models::{Annotation, QueueId, Run, RunId};

/// Page size used to pull every run for the annotations view.
pub const ANNOTATIONS_FETCH_SIZE: usize = 1000;

/// Everything one load depends on. Retrying a failed load reuses it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filters: FilterState,
    pub sort: SortState,
    pub page: usize,
    pub page_size: usize,
    /// Effective filter annotator (never "unset").
    pub annotator: AnnotatorFilter,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: FilterState::default(),
            sort: SortState::default(),
            page: 1,
            page_size: super::pagination::DEFAULT_PAGE_SIZE,
            annotator: AnnotatorFilter::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    ClientLocal,
    ServerDriven,
}

/// One page of records plus totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub records: Vec<Run>,
    pub total_count: usize,
    pub total_pages: usize,
    pub current_page: usize,
    /// Queue name, when the source is a queue.
    pub title: Option<String>,
    /// Queue creator, when the source is a queue.
    pub owner: Option<String>,
    /// `total_count` is an upper bound: some filters were applied to this
    /// page only, not to the whole result set.
    pub total_is_estimate: bool,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn mode(&self) -> PagingMode;

    async fn fetch(&self, query: &ListQuery) -> Result<PageResult, ApiError>;

    /// The backend accepted `annotation` from `annotator` on `run_id`.
    /// Sources that keep records between loads update them here.
    async fn annotation_saved(&self, _run_id: &RunId, _annotator: &str, _annotation: &Annotation) {}
}

/// Filter, sort and slice a full collection.
pub fn local_page(runs: &[Run], query: &ListQuery, now: DateTime<FixedOffset>) -> PageResult {
    let ctx = FilterContext::new(now, query.annotator.clone());
    let mut matching: Vec<Run> = runs
        .iter()
        .filter(|run| query.filters.matches(run, &ctx))
        .cloned()
        .collect();
    query.sort.sort(&mut matching);

    let mut pagination = PaginationState::new(query.page_size).with_page(query.page);
    pagination.set_total_count(matching.len());
    let records = pagination.slice(&matching).to_vec();

    PageResult {
        records,
        total_count: pagination.total_count(),
        total_pages: pagination.total_pages(),
        current_page: pagination.current_page(),
        title: None,
        owner: None,
        total_is_estimate: false,
    }
}

/// An in-memory collection.
#[derive(Debug, Clone, Default)]
pub struct LocalSource {
    runs: Vec<Run>,
    now: Option<DateTime<FixedOffset>>,
}

impl LocalSource {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs, now: None }
    }

    /// Pin the clock used by time-range filters.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }
}

#[async_trait]
impl DataSource for LocalSource {
    fn mode(&self) -> PagingMode {
        PagingMode::ClientLocal
    }

    async fn fetch(&self, query: &ListQuery) -> Result<PageResult, ApiError> {
        let now = self.now.unwrap_or_else(|| Local::now().fixed_offset());
        Ok(local_page(&self.runs, query, now))
    }
}

/// Flat runs list, paged by `/api/runs`.
#[derive(Debug, Clone)]
pub struct RunsSource {
    api: ApiClient,
}

impl RunsSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for RunsSource {
    fn mode(&self) -> PagingMode {
        PagingMode::ServerDriven
    }

    async fn fetch(&self, query: &ListQuery) -> Result<PageResult, ApiError> {
        let page = self.api.list_runs(query).await?;
        Ok(PageResult {
            records: page.runs,
            total_count: page.total_count,
            total_pages: page.total_pages,
            current_page: page.current_page.max(1),
            title: None,
            owner: None,
            total_is_estimate: false,
        })
    }
}

/// One queue's runs, paged by `/api/queues/{id}`.
///
/// The queue endpoint filters on status, annotator and text only. Time
/// range and categorical filters, and the sort, apply to the returned page.
/// With those filters active the totals are exact for a single-page queue
/// and an upper bound otherwise.
#[derive(Debug, Clone)]
pub struct QueueSource {
    api: ApiClient,
    queue_id: QueueId,
    now: Option<DateTime<FixedOffset>>,
}

impl QueueSource {
    pub fn new(api: ApiClient, queue_id: QueueId) -> Self {
        Self {
            api,
            queue_id,
            now: None,
        }
    }

    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }
}

#[async_trait]
impl DataSource for QueueSource {
    fn mode(&self) -> PagingMode {
        PagingMode::ServerDriven
    }

    async fn fetch(&self, query: &ListQuery) -> Result<PageResult, ApiError> {
        let page = self.api.get_queue(&self.queue_id, query).await?;
        let now = self.now.unwrap_or_else(|| Local::now().fixed_offset());

        let received = page.queue.runs.len();
        let mut records: Vec<Run> = page
            .queue
            .runs
            .into_iter()
            .filter(|run| {
                passes_time_range(run, query.filters.time_range, &now)
                    && Dimension::ALL
                        .into_iter()
                        .all(|d| passes_values(run, d, query.filters.value_set(d)))
            })
            .collect();
        query.sort.sort(&mut records);

        let locally_filtered = query.filters.time_range != TimeRange::All
            || Dimension::ALL
                .into_iter()
                .any(|d| query.filters.value_set(d).is_some());
        let single_page = page.total_pages <= 1;
        let total_count = match (locally_filtered, single_page) {
            (false, _) => page.total_count,
            (true, true) => records.len(),
            (true, false) => page.total_count.saturating_sub(received - records.len()),
        };
        if locally_filtered {
            debug!(
                "Queue {} page kept {} of {} runs after local filters",
                self.queue_id,
                records.len(),
                received
            );
        }

        Ok(PageResult {
            records,
            total_count,
            total_pages: page.total_pages,
            current_page: page.current_page.max(1),
            title: Some(page.queue.name),
            owner: page.queue.user_name,
            total_is_estimate: locally_filtered && !single_page,
        })
    }
}

/// Split runs into one entry per annotator with a valid judgement.
///
/// Each entry keeps only that annotator's annotation and records the
/// annotator, so the detail panel targets it. A specific filter annotator
/// keeps only their entries.
pub fn explode_annotations(runs: &[Run], annotator: &AnnotatorFilter) -> Vec<Run> {
    let mut entries = Vec::new();
    for run in runs {
        for (name, annotation) in &run.annotations {
            if annotation.judgement.is_none() {
                continue;
            }
            if let AnnotatorFilter::User(wanted) = annotator {
                if wanted != name {
                    continue;
                }
            }
            let mut entry = run.clone();
            entry.annotations = [(name.clone(), annotation.clone())].into();
            entry.annotator = Some(name.clone());
            entries.push(entry);
        }
    }
    entries
}

/// The part of a query that changes which runs the annotations view pulls.
/// Sort and page changes reuse the cached entries.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchKey {
    filters: FilterState,
    annotator: AnnotatorFilter,
}

impl FetchKey {
    fn of(query: &ListQuery) -> Self {
        Self {
            filters: query.filters.clone(),
            annotator: query.annotator.clone(),
        }
    }
}

/// Annotations view: pulls every matching run once, explodes it into
/// per-annotator entries, then pages locally.
pub struct AnnotationsSource {
    api: ApiClient,
    cache: Mutex<Option<(FetchKey, Vec<Run>)>>,
}

impl AnnotationsSource {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DataSource for AnnotationsSource {
    fn mode(&self) -> PagingMode {
        PagingMode::ClientLocal
    }

    async fn fetch(&self, query: &ListQuery) -> Result<PageResult, ApiError> {
        let key = FetchKey::of(query);
        let mut cache = self.cache.lock().await;

        let cached = matches!(cache.as_ref(), Some((k, _)) if *k == key);
        if !cached {
            let server_query = ListQuery {
                page: 1,
                page_size: ANNOTATIONS_FETCH_SIZE,
                ..query.clone()
            };
            let page = self.api.list_runs(&server_query).await?;
            let entries = explode_annotations(&page.runs, &query.annotator);
            debug!(
                "Exploded {} runs into {} annotation entries",
                page.runs.len(),
                entries.len()
            );
            *cache = Some((key, entries));
        }

        let entries = cache.as_ref().map(|(_, e)| e.as_slice()).unwrap_or_default();
        Ok(local_page(entries, query, Local::now().fixed_offset()))
    }

    /// Patch the cached entry for (`run_id`, `annotator`). A cleared judgement
    /// drops the entry. A judgement on a run the cache has no entry for means
    /// the cached set is incomplete, so the next load refetches.
    async fn annotation_saved(&self, run_id: &RunId, annotator: &str, annotation: &Annotation) {
        let mut cache = self.cache.lock().await;
        let Some((_, entries)) = cache.as_mut() else {
            return;
        };
        let index = entries
            .iter()
            .position(|e| &e.id == run_id && e.annotator.as_deref() == Some(annotator));
        match (index, annotation.judgement.is_some()) {
            (Some(i), true) => entries[i].annotations = [(annotator.to_string(), annotation.clone())].into(),
            (Some(i), false) => {
                entries.remove(i);
            }
            (None, true) => {
                debug!("No cached entry for run {} by {}, dropping cache", run_id, annotator);
                *cache = None;
            }
            (None, false) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::AnnotationStatusFilter;
    use crate::models::Judgement;
    use chrono::TimeZone;

    fn runs(n: usize) -> Vec<Run> {
        (0..n)
            .map(|i| Run::new(i as i64).with_start_time(format!("2024-01-{:02}T00:00:00Z", i + 1)))
            .collect()
    }

    #[tokio::test]
    async fn test_local_source_pages_and_sorts() {
        let source = LocalSource::new(runs(25));
        let query = ListQuery {
            page: 2,
            page_size: 10,
            ..ListQuery::default()
        };
        let page = source.fetch(&query).await.unwrap();
        assert_eq!(page.total_count, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.records.len(), 10);
        // Newest first: page 2 starts at the 11th newest.
        assert_eq!(page.records[0].id.to_string(), "14");
    }

    #[tokio::test]
    async fn test_local_source_clamps_page_past_end() {
        let source = LocalSource::new(runs(5));
        let query = ListQuery {
            page: 9,
            ..ListQuery::default()
        };
        let page = source.fetch(&query).await.unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.records.len(), 5);
    }

    #[test]
    fn test_local_page_applies_filters() {
        let mut all = runs(4);
        all[1].set_annotation("amy", Annotation::new(Judgement::Correct, ""));
        let mut query = ListQuery {
            annotator: AnnotatorFilter::User("amy".into()),
            ..ListQuery::default()
        };
        query.filters.status = AnnotationStatusFilter::Unannotated;
        let now = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let page = local_page(&all, &query, now);
        assert_eq!(page.total_count, 3);
        assert!(page.records.iter().all(|r| r.id.to_string() != "1"));
    }

    #[test]
    fn test_explode_annotations() {
        let run = Run::new(1)
            .with_annotation("amy", Annotation::new(Judgement::Correct, "ok"))
            .with_annotation("bob", Annotation::new(Judgement::Wrong, ""))
            .with_annotation("cat", Annotation::default());

        let all = explode_annotations(std::slice::from_ref(&run), &AnnotatorFilter::All);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].annotator.as_deref(), Some("amy"));
        assert_eq!(all[0].annotations.len(), 1);
        assert_eq!(all[1].judgement_by("bob"), Some(Judgement::Wrong));

        let bob = explode_annotations(&[run], &AnnotatorFilter::User("bob".into()));
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].annotator.as_deref(), Some("bob"));
    }

    async fn cached_source() -> AnnotationsSource {
        let api = ApiClient::new("http://127.0.0.1:9", std::time::Duration::from_secs(1), "test").unwrap();
        let source = AnnotationsSource::new(api);
        let run = Run::new(1)
            .with_annotation("amy", Annotation::new(Judgement::Correct, ""))
            .with_annotation("bob", Annotation::new(Judgement::Wrong, ""));
        let entries = explode_annotations(&[run], &AnnotatorFilter::All);
        *source.cache.lock().await = Some((FetchKey::of(&ListQuery::default()), entries));
        source
    }

    fn cached_rows(cache: &Option<(FetchKey, Vec<Run>)>) -> Option<Vec<String>> {
        cache.as_ref().map(|(_, entries)| {
            entries
                .iter()
                .map(|e| format!("{}:{}:{:?}", e.id, e.annotator.as_deref().unwrap_or("-"), e.first_judgement()))
                .collect()
        })
    }

    #[tokio::test]
    async fn test_saved_annotation_patches_cache() {
        let source = cached_source().await;
        let id = RunId::Int(1);

        source
            .annotation_saved(&id, "bob", &Annotation::new(Judgement::Correct, "fixed"))
            .await;
        assert_eq!(
            cached_rows(&*source.cache.lock().await),
            Some(vec!["1:amy:Some(Correct)".to_string(), "1:bob:Some(Correct)".to_string()])
        );

        // Clearing a judgement drops the entry.
        source.annotation_saved(&id, "amy", &Annotation::default()).await;
        assert_eq!(
            cached_rows(&*source.cache.lock().await),
            Some(vec!["1:bob:Some(Correct)".to_string()])
        );

        // A new annotator's judgement is not in the cached set.
        source
            .annotation_saved(&id, "cat", &Annotation::new(Judgement::Wrong, ""))
            .await;
        assert!(source.cache.lock().await.is_none());
    }
}
