//! The list view state machine shared by the runs, queue and annotations views.
//!
//! Every filter, sort or page change issues a new load. Loads are numbered;
//! only the response to the most recently issued load is applied, so a slow
//! response to a superseded query can never repaint the list.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::pagination::{PaginationState, PaginationSummary};
use super::selection::{SelectionError, SelectionPayload, SelectionTracker};
use super::sort::{SortField, SortOrder, SortState};
use super::source::{DataSource, ListQuery, PageResult};
use super::url_state::{HistorySink, MemoryHistory, UrlKeys, UrlState};
use crate::api::ApiError;
use crate::filters::{annotation_status, AnnotatorFilter, FilterChange, FilterError, FilterState};
use crate::models::{Annotation, QueueId, Run, RunId};

/// Where the view is in its load cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewStatus {
    /// Nothing loaded yet.
    Idle,
    /// A load is outstanding. The previous page stays visible.
    Loading,
    Ready,
    /// The last load failed. `failed` is replayed verbatim by [`ListViewController::retry`].
    Error { error: ApiError, failed: ListQuery },
}

/// Handle for one issued load.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    query: ListQuery,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }
}

pub struct ListViewController {
    source: Arc<dyn DataSource>,
    viewer: String,
    keys: UrlKeys,
    history: Box<dyn HistorySink>,
    select_first_on_load: bool,

    filters: FilterState,
    sort: SortState,
    pagination: PaginationState,
    selection: SelectionTracker,

    records: Vec<Run>,
    /// Index into `records`. The annotations view has one row per
    /// (run, annotator), so ids alone do not identify a row.
    selected: Option<usize>,
    requested_record: Option<RunId>,
    queue_id: Option<QueueId>,
    title: Option<String>,
    owner: Option<String>,
    total_is_estimate: bool,

    status: ViewStatus,
    generation: u64,
}

impl ListViewController {
    pub fn new(source: Arc<dyn DataSource>, viewer: impl Into<String>) -> Self {
        Self {
            source,
            viewer: viewer.into(),
            keys: UrlKeys::default(),
            history: Box::new(MemoryHistory::new()),
            select_first_on_load: false,
            filters: FilterState::default(),
            sort: SortState::default(),
            pagination: PaginationState::default(),
            selection: SelectionTracker::default(),
            records: Vec::new(),
            selected: None,
            requested_record: None,
            queue_id: None,
            title: None,
            owner: None,
            total_is_estimate: false,
            status: ViewStatus::Idle,
            generation: 0,
        }
    }

    pub fn with_history(mut self, history: impl HistorySink + 'static) -> Self {
        self.history = Box::new(history);
        self
    }

    pub fn with_url_keys(mut self, keys: UrlKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Select the first displayed record after a load when nothing else is selected.
    pub fn select_first_on_load(mut self, enabled: bool) -> Self {
        self.select_first_on_load = enabled;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    /// Whose annotations the status filter reads. Defaults to the viewer.
    pub fn filter_annotator(&self) -> AnnotatorFilter {
        self.filters.effective_annotator(&self.viewer)
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == ViewStatus::Loading
    }

    pub fn source(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.source)
    }

    pub fn current_page_records(&self) -> &[Run] {
        &self.records
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn pagination_summary(&self) -> PaginationSummary {
        self.pagination.summary()
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn queue_id(&self) -> Option<&QueueId> {
        self.queue_id.as_ref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// The total count is an upper bound rather than exact.
    pub fn total_is_estimate(&self) -> bool {
        self.total_is_estimate
    }

    /// Records on this page with a judgement from the filter annotator.
    pub fn annotated_on_page(&self) -> usize {
        let annotator = self.filter_annotator();
        self.records
            .iter()
            .filter(|run| annotation_status(run, &annotator).is_some())
            .count()
    }

    /// The query the next load would issue.
    pub fn query(&self) -> ListQuery {
        ListQuery {
            filters: self.filters.clone(),
            sort: self.sort,
            page: self.pagination.current_page(),
            page_size: self.pagination.page_size(),
            annotator: self.filter_annotator(),
        }
    }

    pub fn url_keys(&self) -> UrlKeys {
        self.keys
    }

    pub fn url_state(&self) -> UrlState {
        UrlState {
            filters: self.filters.clone(),
            sort: self.sort,
            page: self.pagination.current_page(),
            page_size: self.pagination.page_size(),
            record_id: self
                .selected_record()
                .map(|r| r.id.clone())
                .or_else(|| self.requested_record.clone()),
            queue_id: self.queue_id.clone(),
        }
    }

    /// Shareable query string for the current view.
    pub fn url_query(&self) -> String {
        self.url_state().to_query(&self.keys)
    }

    fn sync_url(&mut self) {
        let query = self.url_query();
        self.history.replace(&query);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Adopt state restored from a URL without loading.
    pub fn restore(&mut self, state: UrlState) {
        self.filters = state.filters;
        self.sort = state.sort;
        self.pagination = PaginationState::new(state.page_size).with_page(state.page);
        self.requested_record = state.record_id;
        self.queue_id = state.queue_id;
        self.selection.clear();
        self.records.clear();
        self.selected = None;
        self.status = ViewStatus::Idle;
    }

    /// Restore state and issue the first load.
    pub async fn initialize(&mut self, state: UrlState) -> Result<(), ApiError> {
        self.restore(state);
        self.load().await
    }

    /// Back to defaults, as when navigating away from the view.
    pub fn reset(&mut self) {
        self.restore(UrlState {
            page_size: self.pagination.page_size(),
            ..UrlState::default()
        });
        self.title = None;
        self.owner = None;
        // Outstanding loads belong to the old view.
        self.generation += 1;
    }

    /// Issue a load for the current state. Any earlier outstanding load is superseded.
    pub fn begin_load(&mut self) -> LoadTicket {
        let query = self.query();
        self.begin_load_with(query)
    }

    fn begin_load_with(&mut self, query: ListQuery) -> LoadTicket {
        self.generation += 1;
        self.status = ViewStatus::Loading;
        debug!(
            "Issuing load {} (page {}, sort {})",
            self.generation, query.page, query.sort
        );
        LoadTicket {
            generation: self.generation,
            query,
        }
    }

    /// Apply the outcome of a load. Returns `false` when the ticket was
    /// superseded and the result was dropped.
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<PageResult, ApiError>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "Ignoring stale response for load {} (current is {})",
                ticket.generation, self.generation
            );
            return false;
        }

        match result {
            Ok(page) => {
                self.pagination
                    .set_server_totals(page.total_count, page.total_pages, page.current_page);
                self.selection.set_total_count(self.pagination.total_count());
                self.total_is_estimate = page.total_is_estimate;
                let previous = self.selected_record().map(|r| (r.id.clone(), r.annotator.clone()));
                self.selected = None;
                self.records = page.records;
                if page.title.is_some() {
                    self.title = page.title;
                    self.owner = page.owner;
                }
                self.status = ViewStatus::Ready;
                self.reconcile_selected_record(previous);
                info!(
                    "Loaded page {}/{}: {} of {} records",
                    self.pagination.current_page(),
                    self.pagination.total_pages(),
                    self.records.len(),
                    self.pagination.total_count()
                );
                self.sync_url();
            }
            Err(error) => {
                warn!("Load {} failed: {}", ticket.generation, error);
                self.records.clear();
                self.selected = None;
                self.status = ViewStatus::Error {
                    error,
                    failed: ticket.query,
                };
            }
        }
        true
    }

    async fn fetch_into(&mut self, ticket: LoadTicket) {
        let source = Arc::clone(&self.source);
        let result = source.fetch(ticket.query()).await;
        self.complete_load(ticket, result);
    }

    fn last_error(&self) -> Result<(), ApiError> {
        match &self.status {
            ViewStatus::Error { error, .. } => Err(error.clone()),
            _ => Ok(()),
        }
    }

    /// Fetch the current state. Failures are also kept in [`Self::status`].
    pub async fn load(&mut self) -> Result<(), ApiError> {
        let ticket = self.begin_load();
        self.fetch_into(ticket).await;
        self.last_error()
    }

    /// Replay the failed load with identical parameters. `false` when not in
    /// the error state.
    pub async fn retry(&mut self) -> bool {
        let failed = match &self.status {
            ViewStatus::Error { failed, .. } => failed.clone(),
            _ => return false,
        };
        info!("Retrying load for page {}", failed.page);
        let ticket = self.begin_load_with(failed);
        self.fetch_into(ticket).await;
        true
    }

    /// Keep the previously selected row if it is still on the page; otherwise
    /// try the record requested by the URL, then (optionally) the first record.
    fn reconcile_selected_record(&mut self, previous: Option<(RunId, Option<String>)>) {
        let requested = self.requested_record.take();
        if let Some((id, annotator)) = previous {
            self.selected = self
                .records
                .iter()
                .position(|r| r.id == id && r.annotator == annotator);
            if self.selected.is_none() {
                debug!("Record {} is not on this page, clearing selection", id);
            }
        } else if let Some(id) = requested {
            self.selected = self.first_index_of(&id);
            if self.selected.is_none() {
                debug!("Record {} is not on this page, clearing selection", id);
            }
        }
        if self.selected.is_none() && self.select_first_on_load && !self.records.is_empty() {
            self.selected = Some(0);
        }
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    /// Apply a filter edit without loading: back to page 1, selection cleared.
    pub fn apply_filter(&mut self, change: FilterChange) -> Result<(), FilterError> {
        self.filters.apply(change)?;
        self.query_changed();
        Ok(())
    }

    /// Edit a filter and reload. Invalid input is rejected before anything changes.
    pub async fn set_filter(&mut self, change: FilterChange) -> Result<(), FilterError> {
        self.apply_filter(change)?;
        let ticket = self.begin_load();
        self.fetch_into(ticket).await;
        Ok(())
    }

    pub async fn set_sort(&mut self, by: SortField, order: SortOrder) {
        self.sort = SortState::new(by, order);
        self.query_changed();
        let ticket = self.begin_load();
        self.fetch_into(ticket).await;
    }

    /// Flip the direction of the current sort key.
    pub async fn toggle_sort_order(&mut self) {
        self.set_sort(self.sort.by, self.sort.order.reversed()).await;
    }

    fn query_changed(&mut self) {
        self.pagination.reset();
        self.selection.clear();
        self.sync_url();
    }

    /// Navigate to page `n`. Out-of-range targets are ignored. Selection persists.
    pub async fn go_to_page(&mut self, n: usize) -> bool {
        if !self.pagination.go_to(n) {
            debug!(
                "Ignoring navigation to page {} of {}",
                n,
                self.pagination.total_pages()
            );
            return false;
        }
        self.sync_url();
        let ticket = self.begin_load();
        self.fetch_into(ticket).await;
        true
    }

    pub async fn next_page(&mut self) -> bool {
        self.go_to_page(self.pagination.current_page() + 1).await
    }

    pub async fn previous_page(&mut self) -> bool {
        match self.pagination.current_page().checked_sub(1) {
            Some(page) => self.go_to_page(page).await,
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn toggle_row(&mut self, id: RunId) -> Result<bool, SelectionError> {
        self.selection.toggle_row(id)
    }

    pub fn select_all_on_page(&mut self) {
        let ids: Vec<RunId> = self.records.iter().map(|r| r.id.clone()).collect();
        self.selection.select_all_on_page(ids);
    }

    pub fn select_all_matching(&mut self) {
        self.selection.select_all_matching(self.pagination.total_count());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection_payload(&self) -> Option<SelectionPayload> {
        self.selection.payload(&self.filters, &self.viewer)
    }

    // ------------------------------------------------------------------
    // Detail record
    // ------------------------------------------------------------------

    fn first_index_of(&self, id: &RunId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    /// Target the detail pane at the first row for `id`. An id that is not
    /// on the current page clears the detail selection instead.
    pub fn select_record(&mut self, id: &RunId) -> Option<&Run> {
        let index = self.first_index_of(id);
        if index.is_none() {
            debug!("Record {} is not on this page", id);
        }
        self.set_selected(index)
    }

    /// Target the detail pane at the row at `index` on this page.
    pub fn select_index(&mut self, index: usize) -> Option<&Run> {
        let index = (index < self.records.len()).then_some(index);
        self.set_selected(index)
    }

    fn set_selected(&mut self, index: Option<usize>) -> Option<&Run> {
        self.selected = index;
        self.requested_record = None;
        self.sync_url();
        self.selected_record()
    }

    pub fn selected_record(&self) -> Option<&Run> {
        self.records.get(self.selected?)
    }

    /// 1-based position of the selected record and the page length.
    pub fn position(&self) -> Option<(usize, usize)> {
        let index = self.selected.filter(|&i| i < self.records.len())?;
        Some((index + 1, self.records.len()))
    }

    /// Move to the next record on this page, if any.
    pub fn select_next(&mut self) -> Option<&Run> {
        let next = self.selected? + 1;
        if next >= self.records.len() {
            return None;
        }
        self.select_index(next)
    }

    /// Move to the previous record on this page, if any.
    pub fn select_previous(&mut self) -> Option<&Run> {
        let previous = self.selected?.checked_sub(1)?;
        self.select_index(previous)
    }

    /// Record an annotation the backend accepted: patch the page and let the
    /// source update anything it keeps between loads.
    pub async fn annotation_saved(&mut self, run_id: &RunId, annotator: &str, annotation: Annotation) -> bool {
        self.source.annotation_saved(run_id, annotator, &annotation).await;
        self.apply_annotation(run_id, annotator, annotation)
    }

    /// Patch displayed records with an accepted annotation, without refetching.
    /// Returns whether any displayed record was updated.
    pub fn apply_annotation(&mut self, run_id: &RunId, annotator: &str, annotation: Annotation) -> bool {
        let mut updated = false;
        for run in self.records.iter_mut().filter(|r| &r.id == run_id) {
            if run.annotator.as_deref().is_some_and(|owner| owner != annotator) {
                continue;
            }
            run.set_annotation(annotator, annotation.clone());
            updated = true;
        }
        if updated {
            debug!("Applied {}'s annotation to run {}", annotator, run_id);
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::source::{explode_annotations, LocalSource};
    use crate::models::Judgement;
    use crate::view::AnnotationPanel;

    fn controller(n: usize) -> ListViewController {
        let runs = (0..n)
            .map(|i| Run::new(i as i64).with_start_time(format!("2024-03-{:02}T08:00:00Z", i + 1)))
            .collect();
        ListViewController::new(Arc::new(LocalSource::new(runs)), "amy")
    }

    #[tokio::test]
    async fn test_stale_ticket_is_dropped() {
        let mut ctl = controller(3);
        let first = ctl.begin_load();
        let second = ctl.begin_load();

        let fresh = PageResult {
            records: vec![Run::new("fresh")],
            total_count: 1,
            total_pages: 1,
            current_page: 1,
            ..PageResult::default()
        };
        let stale = PageResult {
            records: vec![Run::new("stale")],
            ..fresh.clone()
        };

        assert!(ctl.complete_load(second, Ok(fresh)));
        assert!(!ctl.complete_load(first, Ok(stale)));
        assert_eq!(ctl.current_page_records()[0].id.to_string(), "fresh");
        assert_eq!(ctl.status(), &ViewStatus::Ready);
    }

    #[tokio::test]
    async fn test_select_missing_record_clears_detail() {
        let mut ctl = controller(3);
        ctl.load().await.unwrap();
        assert!(ctl.select_record(&RunId::Int(1)).is_some());
        assert!(ctl.select_record(&RunId::from("nope")).is_none());
        assert!(ctl.selected_record().is_none());
    }

    #[tokio::test]
    async fn test_next_and_previous_stay_on_page() {
        let mut ctl = controller(3).select_first_on_load(true);
        ctl.load().await.unwrap();
        // Newest first: 2, 1, 0.
        assert_eq!(ctl.position(), Some((1, 3)));
        assert!(ctl.select_previous().is_none());
        assert_eq!(ctl.select_next().map(|r| r.id.to_string()), Some("1".into()));
        assert_eq!(ctl.select_next().map(|r| r.id.to_string()), Some("0".into()));
        assert!(ctl.select_next().is_none());
        assert_eq!(ctl.position(), Some((3, 3)));
    }

    fn exploded() -> ListViewController {
        let runs = vec![
            Run::new(1)
                .with_start_time("2024-03-02T08:00:00Z")
                .with_annotation("amy", Annotation::new(Judgement::Correct, ""))
                .with_annotation("bob", Annotation::new(Judgement::Wrong, "")),
            Run::new(2)
                .with_start_time("2024-03-01T08:00:00Z")
                .with_annotation("amy", Annotation::new(Judgement::Correct, "")),
        ];
        let entries = explode_annotations(&runs, &AnnotatorFilter::All);
        ListViewController::new(Arc::new(LocalSource::new(entries)), "amy").select_first_on_load(true)
    }

    fn row(run: Option<&Run>) -> Option<String> {
        run.map(|r| format!("{}:{}", r.id, r.annotator.as_deref().unwrap_or("-")))
    }

    #[tokio::test]
    async fn test_next_walks_entries_sharing_a_run() {
        let mut ctl = exploded();
        ctl.filters.annotator = Some(AnnotatorFilter::All);
        ctl.load().await.unwrap();
        assert_eq!(row(ctl.selected_record()).as_deref(), Some("1:amy"));
        assert_eq!(ctl.position(), Some((1, 3)));

        assert_eq!(row(ctl.select_next()).as_deref(), Some("1:bob"));
        assert_eq!(ctl.position(), Some((2, 3)));
        let panel = ctl
            .selected_record()
            .map(|run| AnnotationPanel::for_record(run, &ctl.filter_annotator(), ctl.viewer()));
        assert_eq!(panel.as_ref().map(|p| p.annotator()), Some("bob"));

        assert_eq!(row(ctl.select_next()).as_deref(), Some("2:amy"));
        assert_eq!(ctl.position(), Some((3, 3)));
        assert!(ctl.select_next().is_none());

        assert_eq!(row(ctl.select_previous()).as_deref(), Some("1:bob"));
        assert_eq!(ctl.url_state().record_id, Some(RunId::Int(1)));
    }

    #[tokio::test]
    async fn test_reload_keeps_the_selected_entry() {
        let mut ctl = exploded();
        ctl.filters.annotator = Some(AnnotatorFilter::All);
        ctl.load().await.unwrap();
        ctl.select_index(1);
        ctl.load().await.unwrap();
        assert_eq!(row(ctl.selected_record()).as_deref(), Some("1:bob"));

        // A URL id resolves to the run's first entry.
        ctl.restore(UrlState {
            record_id: Some(RunId::Int(1)),
            filters: ctl.filters().clone(),
            ..UrlState::default()
        });
        ctl.load().await.unwrap();
        assert_eq!(row(ctl.selected_record()).as_deref(), Some("1:amy"));
    }

    #[tokio::test]
    async fn test_apply_annotation_updates_page_record() {
        let mut ctl = controller(2);
        ctl.load().await.unwrap();
        assert_eq!(ctl.annotated_on_page(), 0);
        assert!(ctl.apply_annotation(&RunId::Int(0), "amy", Annotation::new(Judgement::Wrong, "typo")));
        assert_eq!(ctl.annotated_on_page(), 1);
        assert!(!ctl.apply_annotation(&RunId::Int(9), "amy", Annotation::default()));
    }
}
