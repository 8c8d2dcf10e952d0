//! Wire shapes for the runs, queues and annotations endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filters::{AnnotationStatusFilter, AnnotatorFilter, Dimension, TimeRange};
use crate::listing::{ListQuery, SelectionPayload};
use crate::models::{null_as_default, Judgement, QueueDetail, QueueId, Run, RunId};

/// `GET /api/runs` response: one page of runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub current_page: usize,
}

/// `GET /api/queues/{id}` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueuePage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue: QueueDetail,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub current_page: usize,
}

/// `POST /api/queues` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewQueue {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub selection: QueueSelection,
}

/// Either explicit run ids or "everything matching these filters".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueueSelection {
    Runs {
        run_ids: Vec<RunId>,
    },
    AllFiltered {
        select_all_filtered: bool,
        filters: Value,
    },
}

impl From<SelectionPayload> for QueueSelection {
    fn from(payload: SelectionPayload) -> Self {
        match payload {
            SelectionPayload::Ids(run_ids) => Self::Runs { run_ids },
            SelectionPayload::AllMatching(filters) => Self::AllFiltered {
                select_all_filtered: true,
                filters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedQueue {
    pub queue_id: QueueId,
}

/// `POST /api/annotations` body. The backend attributes it to the
/// authenticated viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAnnotation {
    pub run_id: RunId,
    pub judgement: Judgement,
    pub notes: String,
}

/// Query parameters for `GET /api/runs`.
pub fn runs_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = paging_params(query);
    if query.filters.status != AnnotationStatusFilter::All {
        params.push(("annotation_filter", query.filters.status.as_str().to_string()));
    }
    if let AnnotatorFilter::User(name) = &query.annotator {
        params.push(("annotator_user", name.clone()));
    }
    push_text_params(&mut params, query);
    params.push(("sort_by", query.sort.by.as_str().to_string()));
    params.push(("sort_order", query.sort.order.as_str().to_string()));
    if query.filters.time_range != TimeRange::All {
        params.push(("time_range", query.filters.time_range.as_str().to_string()));
    }
    for dimension in Dimension::ALL {
        if let Some(set) = query.filters.value_set(dimension) {
            let joined = set.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            params.push((dimension.param(), joined));
        }
    }
    params
}

/// Query parameters for `GET /api/queues/{id}`.
///
/// The queue endpoint names the annotator `annotator_filter_user` and
/// only understands `unannotated`, never its `empty` alias.
pub fn queue_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = paging_params(query);
    if query.filters.status != AnnotationStatusFilter::All {
        params.push(("annotation_filter", query.filters.status.as_str().to_string()));
    }
    params.push(("annotator_filter_user", query.annotator.as_str().to_string()));
    push_text_params(&mut params, query);
    params
}

fn paging_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    vec![
        ("page", query.page.to_string()),
        ("page_size", query.page_size.to_string()),
    ]
}

fn push_text_params(params: &mut Vec<(&'static str, String)>, query: &ListQuery) {
    for (key, value) in [
        ("user_email", query.filters.user_email()),
        ("task_title", query.filters.task_title.as_str()),
        ("question_title", query.filters.question_title.as_str()),
    ] {
        if !value.is_empty() {
            params.push((key, value.to_string()));
        }
    }
}
