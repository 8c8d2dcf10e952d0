//! Bidirectional mapping between list state and a query string.
//!
//! Defaults are never written. On read, an absent or malformed parameter
//! falls back to its default; nothing here fails.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::warn;
use url::form_urlencoded;

use super::pagination::DEFAULT_PAGE_SIZE;
use super::sort::{SortField, SortOrder, SortState};
use crate::filters::{AnnotationStatusFilter, AnnotatorFilter, Dimension, FilterState, TimeRange};
use crate::models::{QueueId, RunId};

/// Per-view parameter names for the selected record and the page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlKeys {
    pub record: &'static str,
    pub page: &'static str,
}

impl UrlKeys {
    /// Runs, queue and annotations views.
    pub const RUNS: Self = Self {
        record: "runId",
        page: "page",
    };

    /// Queue browser: the selected queue's task list is paged separately.
    pub const QUEUES: Self = Self {
        record: "taskId",
        page: "queuePage",
    };
}

impl Default for UrlKeys {
    fn default() -> Self {
        Self::RUNS
    }
}

/// Everything a list view persists in its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlState {
    pub filters: FilterState,
    pub sort: SortState,
    pub page: usize,
    pub page_size: usize,
    pub record_id: Option<RunId>,
    pub queue_id: Option<QueueId>,
}

impl Default for UrlState {
    fn default() -> Self {
        Self {
            filters: FilterState::default(),
            sort: SortState::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            record_id: None,
            queue_id: None,
        }
    }
}

impl UrlState {
    /// Serialize to a query string without the leading `?`.
    pub fn to_query(&self, keys: &UrlKeys) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let f = &self.filters;

        if let Some(queue_id) = &self.queue_id {
            query.append_pair("queueId", &queue_id.as_key());
        }
        if let Some(record_id) = &self.record_id {
            query.append_pair(keys.record, &record_id.as_key());
        }
        if self.page > 1 {
            query.append_pair(keys.page, &self.page.to_string());
        }
        if self.page_size != DEFAULT_PAGE_SIZE {
            query.append_pair("page_size", &self.page_size.to_string());
        }
        if let Some(annotator) = &f.annotator {
            query.append_pair("annotator", annotator.as_str());
        }
        if f.status != AnnotationStatusFilter::All {
            query.append_pair("status", f.status.as_str());
        }
        if f.time_range != TimeRange::All {
            query.append_pair("time_range", f.time_range.as_str());
        }
        for (key, value) in [
            ("email", f.user_email()),
            ("task_title", f.task_title.as_str()),
            ("question_title", f.question_title.as_str()),
        ] {
            if !value.is_empty() {
                query.append_pair(key, value);
            }
        }
        for dimension in Dimension::ALL {
            if let Some(set) = f.value_set(dimension) {
                let joined = set.iter().map(String::as_str).collect::<Vec<_>>().join(",");
                query.append_pair(dimension.param(), &joined);
            }
        }
        if self.sort.by != SortField::default() {
            query.append_pair("sort_by", self.sort.by.as_str());
        }
        if self.sort.order != SortOrder::default() {
            query.append_pair("sort_order", self.sort.order.as_str());
        }
        query.finish()
    }

    /// Parse a query string, with or without the leading `?`.
    pub fn from_query(query: &str, keys: &UrlKeys) -> Self {
        let mut state = Self::default();
        let mut legacy_status = None;

        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let f = &mut state.filters;
            match key.as_ref() {
                "queueId" => state.queue_id = Some(value.into()),
                k if k == keys.record => state.record_id = Some(value.into()),
                k if k == keys.page => state.page = parse_or_default(k, value, 1).max(1),
                "page_size" => {
                    state.page_size = parse_or_default("page_size", value, DEFAULT_PAGE_SIZE).max(1)
                }
                "annotator" => f.annotator = Some(AnnotatorFilter::from(value)),
                "status" => f.status = parse_or_default("status", value, AnnotationStatusFilter::All),
                "annotation_filter" => legacy_status = Some(value.to_string()),
                "time_range" => f.time_range = parse_or_default("time_range", value, TimeRange::All),
                "email" => {
                    if let Err(e) = f.set_user_email(value) {
                        warn!("Ignoring email parameter: {}", e);
                    }
                }
                "task_title" => f.task_title = value.to_string(),
                "question_title" => f.question_title = value.to_string(),
                "sort_by" => state.sort.by = parse_or_default("sort_by", value, SortField::default()),
                "sort_order" => {
                    state.sort.order = parse_or_default("sort_order", value, SortOrder::default())
                }
                other => {
                    if let Ok(dimension) = other.parse::<Dimension>() {
                        let values: BTreeSet<String> = value.split(',').map(str::to_string).collect();
                        f.set_values(dimension, values);
                    }
                }
            }
        }

        // `status` wins over the older `annotation_filter` name.
        if state.filters.status == AnnotationStatusFilter::All {
            if let Some(raw) = legacy_status {
                state.filters.status = parse_or_default("annotation_filter", &raw, AnnotationStatusFilter::All);
            }
        }
        state
    }
}

fn parse_or_default<T>(key: &str, value: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Ignoring {} parameter '{}': {}", key, value, e);
            default
        }
    }
}

/// Destination for URL updates. Replaces the current entry rather than
/// pushing a new one, so no reload happens.
pub trait HistorySink: Send {
    fn replace(&mut self, query: &str);
}

/// In-memory history. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent query string, empty if nothing was written.
    pub fn current(&self) -> String {
        self.entries
            .lock()
            .map(|entries| entries.last().cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistorySink for MemoryHistory {
    fn replace(&mut self, query: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(query.to_string());
        }
    }
}
