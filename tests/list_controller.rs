//! Behaviour of the shared list view controller against in-memory sources.
//!
//! Covers filter conjunction, page coverage, sort order, URL round trips,
//! selection counts, the annotation dirty-check, and stale-response handling.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::json;

use runreview::api::ApiError;
use runreview::filters::{
    annotation_status, AnnotationStatusFilter, AnnotatorFilter, Dimension, FilterChange,
    FilterContext, FilterState, TimeRange,
};
use runreview::listing::{
    local_page, DataSource, ListQuery, ListViewController, LocalSource, MemoryHistory, PageResult,
    PagingMode, SortField, SortOrder, SortState, UrlKeys, UrlState, ViewStatus,
};
use runreview::models::{Annotation, Judgement, Run, RunId};
use runreview::view::AnnotationPanel;

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-03-10T15:00:00+00:00").unwrap()
}

/// 45 runs, one per hour going back from `now`; every third is judged correct by amy.
fn sample_runs() -> Vec<Run> {
    (0..45i64)
        .map(|i| {
            let start = now() - chrono::Duration::hours(i + 1);
            let mut run = Run::new(i)
                .with_start_time(start.to_rfc3339())
                .with_metadata("type", json!(if i % 2 == 0 { "quiz" } else { "assignment" }))
                .with_metadata("task_title", json!(format!("Task {i}")));
            if i % 3 == 0 {
                run = run.with_annotation("amy", Annotation::new(Judgement::Correct, ""));
            }
            run
        })
        .collect()
}

fn controller(runs: Vec<Run>) -> ListViewController {
    ListViewController::new(Arc::new(LocalSource::new(runs).with_now(now())), "amy")
}

/// Fails the first `failures` fetches, then serves from memory. Records every query.
struct FlakySource {
    runs: Vec<Run>,
    failures: AtomicUsize,
    seen: Mutex<Vec<ListQuery>>,
}

impl FlakySource {
    fn new(runs: Vec<Run>, failures: usize) -> Self {
        Self {
            runs,
            failures: AtomicUsize::new(failures),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<ListQuery> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for FlakySource {
    fn mode(&self) -> PagingMode {
        PagingMode::ServerDriven
    }

    async fn fetch(&self, query: &ListQuery) -> Result<PageResult, ApiError> {
        self.seen.lock().unwrap().push(query.clone());
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Connection("connection refused".into()));
        }
        Ok(local_page(&self.runs, query, now()))
    }
}

// ============================================================================
// Filter conjunction
// ============================================================================

#[test]
fn quiz_unannotated_today_passes_all_and_fails_each_excluding_change() {
    let run = Run::new(1)
        .with_start_time("2025-03-10T09:00:00Z")
        .with_metadata("type", json!("quiz"));
    let ctx = FilterContext::new(now(), AnnotatorFilter::User("amy".into()));

    let mut filters = FilterState::default();
    filters
        .apply(FilterChange::Values(Dimension::RunType, BTreeSet::from(["quiz".to_string()])))
        .unwrap();
    filters.apply(FilterChange::Status(AnnotationStatusFilter::Unannotated)).unwrap();
    filters.apply(FilterChange::TimeRange(TimeRange::Today)).unwrap();
    assert!(filters.matches(&run, &ctx));

    let mut wrong_type = filters.clone();
    wrong_type
        .apply(FilterChange::Values(Dimension::RunType, BTreeSet::from(["assignment".to_string()])))
        .unwrap();
    assert!(!wrong_type.matches(&run, &ctx));

    let mut wrong_status = filters.clone();
    wrong_status.apply(FilterChange::Status(AnnotationStatusFilter::Correct)).unwrap();
    assert!(!wrong_status.matches(&run, &ctx));

    let mut wrong_time = filters.clone();
    wrong_time.apply(FilterChange::TimeRange(TimeRange::Yesterday)).unwrap();
    assert!(!wrong_time.matches(&run, &ctx));
}

// ============================================================================
// Pagination coverage
// ============================================================================

#[tokio::test]
async fn pages_concatenate_to_the_full_sorted_list() {
    let runs = sample_runs();
    let mut expected = runs.clone();
    SortState::default().sort(&mut expected);

    for page_size in [1, 7, 20, 45, 100] {
        let mut ctl = controller(runs.clone());
        ctl.restore(UrlState {
            page_size,
            ..UrlState::default()
        });
        ctl.load().await.unwrap();

        let mut seen: Vec<RunId> = ctl.current_page_records().iter().map(|r| r.id.clone()).collect();
        while ctl.next_page().await {
            seen.extend(ctl.current_page_records().iter().map(|r| r.id.clone()));
        }
        let expected_ids: Vec<RunId> = expected.iter().map(|r| r.id.clone()).collect();
        assert_eq!(seen, expected_ids, "page size {page_size}");
    }
}

#[tokio::test]
async fn out_of_range_page_is_ignored() {
    let mut ctl = controller(sample_runs());
    ctl.load().await.unwrap();
    assert_eq!(ctl.pagination().total_pages(), 3);

    assert!(!ctl.go_to_page(0).await);
    assert!(!ctl.go_to_page(4).await);
    assert_eq!(ctl.pagination().current_page(), 1);

    assert!(ctl.go_to_page(3).await);
    let summary = ctl.pagination_summary();
    assert_eq!((summary.start_index, summary.end_index, summary.total_count), (41, 45, 45));
}

// ============================================================================
// Sort
// ============================================================================

#[tokio::test]
async fn timestamp_sort_orders_and_reverses() {
    let runs = vec![
        Run::new(1).with_start_time("2024-01-02"),
        Run::new(2).with_start_time("2024-01-01"),
    ];
    let mut ctl = controller(runs);
    ctl.set_sort(SortField::Timestamp, SortOrder::Asc).await;
    let ids: Vec<_> = ctl.current_page_records().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![RunId::Int(2), RunId::Int(1)]);

    ctl.toggle_sort_order().await;
    let ids: Vec<_> = ctl.current_page_records().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![RunId::Int(1), RunId::Int(2)]);
}

// ============================================================================
// URL state
// ============================================================================

#[tokio::test]
async fn controller_writes_its_state_to_history() {
    let history = MemoryHistory::new();
    let mut ctl = controller(sample_runs()).with_history(history.clone());
    ctl.load().await.unwrap();
    assert_eq!(history.current(), "");

    ctl.set_filter(FilterChange::Status(AnnotationStatusFilter::Correct))
        .await
        .unwrap();
    ctl.set_sort(SortField::Name, SortOrder::Asc).await;

    let query = history.current();
    let restored = UrlState::from_query(&query, &UrlKeys::RUNS);
    assert_eq!(restored, ctl.url_state());
    assert_eq!(restored.filters.status, AnnotationStatusFilter::Correct);
    assert_eq!(restored.sort, SortState::new(SortField::Name, SortOrder::Asc));
}

#[tokio::test]
async fn restored_state_reloads_the_same_page() {
    let mut first = controller(sample_runs());
    first
        .set_filter(FilterChange::Values(Dimension::RunType, BTreeSet::from(["quiz".to_string()])))
        .await
        .unwrap();
    first.go_to_page(2).await;
    let query = first.url_query();

    let mut second = controller(sample_runs());
    second
        .initialize(UrlState::from_query(&query, &UrlKeys::RUNS))
        .await
        .unwrap();
    assert_eq!(second.pagination().current_page(), 2);
    assert_eq!(second.current_page_records(), first.current_page_records());
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn select_all_matching_counts_unseen_pages() {
    let mut ctl = controller(sample_runs());
    ctl.load().await.unwrap();
    assert_eq!(ctl.current_page_records().len(), 20);

    ctl.select_all_matching();
    assert_eq!(ctl.selection().count(), 45);
    assert!(ctl.selection().is_all_selected());

    ctl.clear_selection();
    assert_eq!(ctl.selection().count(), 0);
    assert!(!ctl.selection().is_all_selected());
}

#[tokio::test]
async fn selection_survives_paging_but_not_filtering() {
    let mut ctl = controller(sample_runs());
    ctl.load().await.unwrap();
    ctl.select_all_on_page();
    ctl.go_to_page(2).await;
    assert_eq!(ctl.selection().count(), 20);

    ctl.set_filter(FilterChange::TimeRange(TimeRange::Today))
        .await
        .unwrap();
    assert!(ctl.selection().is_empty());
}

// ============================================================================
// Annotation dirty-check
// ============================================================================

#[test]
fn save_enables_only_on_real_changes() {
    let t = Instant::now();

    let fresh = Run::new(1);
    let mut panel = AnnotationPanel::open(&fresh, "amy", "amy");
    assert!(!panel.can_save(t));
    panel.set_judgement(Some(Judgement::Correct)).unwrap();
    assert!(panel.can_save(t));

    let judged = Run::new(2).with_annotation("amy", Annotation::new(Judgement::Correct, "x"));
    let mut panel = AnnotationPanel::open(&judged, "amy", "amy");
    panel.set_judgement(Some(Judgement::Correct)).unwrap();
    assert!(!panel.can_save(t));
    panel.set_notes("y").unwrap();
    assert!(panel.can_save(t));
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[tokio::test]
async fn status_filter_change_resets_to_first_page() {
    let mut ctl = controller(sample_runs());
    let annotator = AnnotatorFilter::User("amy".into());

    ctl.set_filter(FilterChange::Status(AnnotationStatusFilter::Unannotated))
        .await
        .unwrap();
    assert_eq!(ctl.pagination().current_page(), 1);
    assert_eq!(ctl.pagination().total_count(), 30);
    assert!(ctl
        .current_page_records()
        .iter()
        .all(|r| annotation_status(r, &annotator).is_none()));

    assert!(ctl.go_to_page(2).await);
    ctl.set_filter(FilterChange::Status(AnnotationStatusFilter::Correct))
        .await
        .unwrap();
    assert_eq!(ctl.pagination().current_page(), 1);
    assert_eq!(ctl.pagination().total_count(), 15);
    assert!(ctl
        .current_page_records()
        .iter()
        .all(|r| annotation_status(r, &annotator) == Some(Judgement::Correct)));
}

// ============================================================================
// Stale responses and retry
// ============================================================================

#[tokio::test]
async fn superseded_response_is_dropped() {
    let runs = sample_runs();
    let mut ctl = controller(runs.clone());

    let slow = ctl.begin_load();
    ctl.apply_filter(FilterChange::Status(AnnotationStatusFilter::Correct))
        .unwrap();
    let fast = ctl.begin_load();

    let fast_result = local_page(&runs, fast.query(), now());
    assert!(ctl.complete_load(fast, Ok(fast_result)));
    let slow_result = local_page(&runs, slow.query(), now());
    assert!(!ctl.complete_load(slow, Ok(slow_result)));

    assert_eq!(ctl.status(), &ViewStatus::Ready);
    assert_eq!(ctl.pagination().total_count(), 15);
}

#[tokio::test]
async fn retry_replays_the_failed_query() {
    let source = Arc::new(FlakySource::new(sample_runs(), 1));
    let mut ctl = ListViewController::new(source.clone(), "amy");
    ctl.restore(UrlState {
        page: 2,
        ..UrlState::default()
    });

    let err = ctl.load().await.unwrap_err();
    assert_eq!(err, ApiError::Connection("connection refused".into()));
    assert!(ctl.current_page_records().is_empty());
    assert!(matches!(ctl.status(), ViewStatus::Error { .. }));

    assert!(ctl.retry().await);
    assert_eq!(ctl.status(), &ViewStatus::Ready);

    let seen = source.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[1].page, 2);
    assert!(!ctl.retry().await);
}

#[tokio::test]
async fn stale_record_id_leaves_nothing_selected() {
    let mut ctl = controller(sample_runs()).select_first_on_load(true);
    ctl.initialize(UrlState {
        record_id: Some(RunId::from("999")),
        ..UrlState::default()
    })
    .await
    .unwrap();
    assert_eq!(ctl.selected_record().map(|r| r.id.clone()), Some(RunId::Int(0)));

    assert!(ctl.select_record(&RunId::from("999")).is_none());
    assert!(ctl.selected_record().is_none());
}
