//! Runs: the unit of review work.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{null_as_default, parse_timestamp, Annotation, Judgement, RunId};

/// Decode the annotations map, skipping `null` or malformed entries instead
/// of failing the whole run.
fn lenient_annotations<'de, D>(deserializer: D) -> Result<BTreeMap<String, Annotation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Value> = null_as_default(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| Annotation::deserialize(value).ok().map(|a| (name, a)))
        .collect())
}

/// A single model/task execution as returned by the runs and queue endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Open-ended metadata. Keys the filters read: `type`, `question_type`,
    /// `question_input_type`, `question_purpose`, `org`, `course`,
    /// `user_email`, `task_title`, `question_title`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
    /// Annotations keyed by annotator identity, ordered by name.
    #[serde(default, deserialize_with = "lenient_annotations")]
    pub annotations: BTreeMap<String, Annotation>,
    /// Set on entries of the annotations view, where each row is one
    /// annotator's annotation of a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
}

impl Run {
    pub fn new(id: impl Into<RunId>) -> Self {
        Self {
            id: id.into(),
            start_time: None,
            end_time: None,
            metadata: Map::new(),
            annotations: BTreeMap::new(),
            annotator: None,
        }
    }

    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_annotation(mut self, annotator: &str, annotation: Annotation) -> Self {
        self.annotations.insert(annotator.to_string(), annotation);
        self
    }

    /// Parsed `start_time`, `None` when absent or unparseable.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.as_deref().and_then(parse_timestamp)
    }

    /// Non-empty string metadata value.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Scalar metadata value in canonical string form (numbers and bools
    /// are stringified so they compare against URL-supplied values).
    pub fn meta_key(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(scalar_key)
    }

    /// Field of a nested metadata object, e.g. `org.id`.
    pub fn meta_nested_key(&self, object: &str, field: &str) -> Option<String> {
        self.metadata
            .get(object)
            .and_then(|v| v.get(field))
            .and_then(scalar_key)
    }

    pub fn run_type(&self) -> Option<&str> {
        self.meta_str("type")
    }

    pub fn task_title(&self) -> Option<&str> {
        self.meta_str("task_title")
    }

    pub fn question_title(&self) -> Option<&str> {
        self.meta_str("question_title")
    }

    pub fn user_email(&self) -> Option<&str> {
        self.meta_str("user_email")
    }

    pub fn org_name(&self) -> Option<String> {
        self.meta_nested_key("org", "name").filter(|s| !s.is_empty())
    }

    pub fn course_name(&self) -> Option<String> {
        self.meta_nested_key("course", "name").filter(|s| !s.is_empty())
    }

    pub fn milestone_name(&self) -> Option<String> {
        self.meta_nested_key("milestone", "name").filter(|s| !s.is_empty())
    }

    /// Human-readable name: task title, the question for quiz runs, then
    /// course and milestone, falling back to `Run {id}`. The organization
    /// is appended in parentheses.
    pub fn display_name(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(task) = self.task_title() {
            parts.push(task.to_string());
        }
        if self.run_type() == Some("quiz") {
            if let Some(question) = self.question_title() {
                parts.push(question.to_string());
            }
        }
        if let Some(course) = self.course_name() {
            parts.push(course);
            if let Some(milestone) = self.milestone_name() {
                parts.push(milestone);
            }
        }

        let name = if parts.is_empty() {
            format!("Run {}", self.id)
        } else {
            parts.join(" - ")
        };
        match self.org_name() {
            Some(org) => format!("{name} ({org})"),
            None => name,
        }
    }

    /// Annotation written by `annotator`, if any.
    pub fn annotation_by(&self, annotator: &str) -> Option<&Annotation> {
        self.annotations.get(annotator)
    }

    /// Valid judgement written by `annotator`.
    pub fn judgement_by(&self, annotator: &str) -> Option<Judgement> {
        self.annotation_by(annotator).and_then(|a| a.judgement)
    }

    /// First valid judgement in annotator-name order.
    pub fn first_judgement(&self) -> Option<Judgement> {
        self.annotations.values().find_map(|a| a.judgement)
    }

    /// Record an annotation locally after the backend accepted it.
    pub fn set_annotation(&mut self, annotator: &str, annotation: Annotation) {
        self.annotations.insert(annotator.to_string(), annotation);
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
