//! Queues and filter lookup data.

use serde::{Deserialize, Serialize};

use super::{null_as_default, QueueId, RecordId, Run};

/// Queue entry in the `/api/queues` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub id: QueueId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "user_name", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Response of `GET /api/queues`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueuesListing {
    #[serde(default, deserialize_with = "null_as_default")]
    pub queues: Vec<QueueSummary>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, rename = "selectedQueueId")]
    pub selected_queue_id: Option<QueueId>,
    #[serde(default, rename = "selectedTaskId")]
    pub selected_task_id: Option<RecordId>,
}

/// Queue body of `GET /api/queues/{id}`: one page of its runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub runs: Vec<Run>,
}

/// Organization or course option for the multi-select pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
}

/// Response of `GET /api/filter_data`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub orgs: Vec<NamedRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub courses: Vec<NamedRef>,
}

impl FilterData {
    /// Organizations whose name contains `term`, case-insensitively.
    pub fn search_orgs(&self, term: &str) -> Vec<&NamedRef> {
        search(&self.orgs, term)
    }

    /// Courses whose name contains `term`, case-insensitively.
    pub fn search_courses(&self, term: &str) -> Vec<&NamedRef> {
        search(&self.courses, term)
    }
}

fn search<'a>(items: &'a [NamedRef], term: &str) -> Vec<&'a NamedRef> {
    let term = term.trim().to_lowercase();
    items
        .iter()
        .filter(|item| term.is_empty() || item.name.to_lowercase().contains(&term))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queues_listing_camel_case_selection() {
        let listing: QueuesListing = serde_json::from_value(json!({
            "queues": [{"id": 3, "name": "Quiz review", "created_by": "Aman"}],
            "user": "Aman",
            "selectedQueueId": "3"
        }))
        .unwrap();
        assert_eq!(listing.queues.len(), 1);
        assert_eq!(listing.selected_queue_id, Some(RecordId::Int(3)));
        assert_eq!(listing.selected_task_id, None);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let data = FilterData {
            orgs: vec![
                NamedRef { id: 1.into(), name: "HyperVerge Academy".into() },
                NamedRef { id: 2.into(), name: "Acme".into() },
            ],
            courses: vec![],
        };
        let found = data.search_orgs("academy");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, RecordId::Int(1));
        assert_eq!(data.search_orgs("  ").len(), 2);
    }
}
