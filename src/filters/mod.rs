//! Filter state for run lists and the predicates that evaluate it.
//!
//! A run passes a [`FilterState`] iff it passes every dimension: logical AND
//! across dimensions, logical OR across the chosen values of a multi-select
//! dimension. An empty multi-select set places no constraint.

mod email;
mod predicates;

pub use email::{is_valid_email, validate_email};
pub use predicates::{
    annotation_status, passes_all, passes_email, passes_status, passes_text, passes_time_range,
    passes_values,
};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{ParseValueError, Run};

/// Errors raised while editing filters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error(transparent)]
    Value(#[from] ParseValueError),
}

// ---------------------------------------------------------------------------
// Single-select dimensions
// ---------------------------------------------------------------------------

/// Annotation status filter, evaluated against the filter annotator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AnnotationStatusFilter {
    #[default]
    All,
    Unannotated,
    Annotated,
    Correct,
    Wrong,
}

impl AnnotationStatusFilter {
    pub const ALL: [Self; 5] = [
        Self::All,
        Self::Unannotated,
        Self::Annotated,
        Self::Correct,
        Self::Wrong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unannotated => "unannotated",
            Self::Annotated => "annotated",
            Self::Correct => "correct",
            Self::Wrong => "wrong",
        }
    }

    /// Dropdown label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Unannotated => "Not annotated",
            Self::Annotated => "Annotated",
            Self::Correct => "Correct",
            Self::Wrong => "Wrong",
        }
    }
}

impl FromStr for AnnotationStatusFilter {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "" => Ok(Self::All),
            "unannotated" | "empty" => Ok(Self::Unannotated),
            "annotated" => Ok(Self::Annotated),
            "correct" => Ok(Self::Correct),
            "wrong" => Ok(Self::Wrong),
            _ => Err(ParseValueError::new(
                "annotation status",
                s,
                "all, unannotated, annotated, correct, wrong",
            )),
        }
    }
}

/// Time bucket relative to "now", keyed on a run's `start_time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeRange {
    #[default]
    All,
    Today,
    Yesterday,
    Last7,
    Last30,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7 => "last7",
            Self::Last30 => "last30",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All time",
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::Last7 => "Last 7 days",
            Self::Last30 => "Last 30 days",
        }
    }
}

impl FromStr for TimeRange {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "" => Ok(Self::All),
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "last7" => Ok(Self::Last7),
            "last30" => Ok(Self::Last30),
            _ => Err(ParseValueError::new(
                "time range",
                s,
                "all, today, yesterday, last7, last30",
            )),
        }
    }
}

/// Whose annotations the status filter reads.
///
/// Kept apart from the viewer identity: the viewer decides edit
/// permission, the filter annotator only decides which judgement a row shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotatorFilter {
    All,
    User(String),
}

impl AnnotatorFilter {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::User(name) => name,
        }
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::User(name) => Some(name),
        }
    }
}

impl fmt::Display for AnnotatorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::User(name) => f.write_str(name),
        }
    }
}

impl From<&str> for AnnotatorFilter {
    fn from(s: &str) -> Self {
        match s {
            "all" => Self::All,
            name => Self::User(name.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Multi-select dimensions
// ---------------------------------------------------------------------------

/// Categorical multi-select dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    RunType,
    QuestionType,
    InputType,
    Purpose,
    Org,
    Course,
}

impl Dimension {
    pub const ALL: [Self; 6] = [
        Self::RunType,
        Self::QuestionType,
        Self::InputType,
        Self::Purpose,
        Self::Org,
        Self::Course,
    ];

    /// Query parameter name, shared by the URL and the runs API.
    pub fn param(&self) -> &'static str {
        match self {
            Self::RunType => "run_type",
            Self::QuestionType => "question_type",
            Self::InputType => "question_input_type",
            Self::Purpose => "purpose",
            Self::Org => "org_id",
            Self::Course => "course_id",
        }
    }

    /// The run's value for this dimension, `None` when the metadata key is absent.
    pub fn record_value(&self, run: &Run) -> Option<String> {
        match self {
            Self::RunType => run.meta_key("type"),
            Self::QuestionType => run.meta_key("question_type"),
            Self::InputType => run.meta_key("question_input_type"),
            Self::Purpose => run.meta_key("question_purpose"),
            Self::Org => run.meta_nested_key("org", "id"),
            Self::Course => run.meta_nested_key("course", "id"),
        }
    }
}

impl FromStr for Dimension {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.param() == s)
            .ok_or_else(|| {
                ParseValueError::new(
                    "filter dimension",
                    s,
                    "run_type, question_type, question_input_type, purpose, org_id, course_id",
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Filter state
// ---------------------------------------------------------------------------

/// One user edit to the filter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Status(AnnotationStatusFilter),
    TimeRange(TimeRange),
    /// `None` restores the view default (the viewer).
    Annotator(Option<AnnotatorFilter>),
    /// Replace the chosen values of a dimension.
    Values(Dimension, BTreeSet<String>),
    /// Flip a single checkbox.
    Toggle(Dimension, String),
    UserEmail(String),
    TaskTitle(String),
    QuestionTitle(String),
    /// Reset every dimension except the annotator.
    ClearAll,
}

/// The active filters of a list view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub status: AnnotationStatusFilter,
    pub time_range: TimeRange,
    /// `None` means the view default, which is the viewer.
    pub annotator: Option<AnnotatorFilter>,
    values: BTreeMap<Dimension, BTreeSet<String>>,
    user_email: String,
    pub task_title: String,
    pub question_title: String,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an edit. Invalid input leaves the state untouched.
    pub fn apply(&mut self, change: FilterChange) -> Result<(), FilterError> {
        match change {
            FilterChange::Status(status) => self.status = status,
            FilterChange::TimeRange(range) => self.time_range = range,
            FilterChange::Annotator(annotator) => self.annotator = annotator,
            FilterChange::Values(dimension, values) => self.set_values(dimension, values),
            FilterChange::Toggle(dimension, value) => {
                let value = value.trim();
                if value.is_empty() {
                    return Ok(());
                }
                let set = self.values.entry(dimension).or_default();
                if !set.remove(value) {
                    set.insert(value.to_string());
                }
                if set.is_empty() {
                    self.values.remove(&dimension);
                }
            }
            FilterChange::UserEmail(email) => self.set_user_email(&email)?,
            FilterChange::TaskTitle(title) => self.task_title = title.trim().to_string(),
            FilterChange::QuestionTitle(title) => self.question_title = title.trim().to_string(),
            FilterChange::ClearAll => {
                *self = Self {
                    annotator: self.annotator.take(),
                    ..Self::default()
                };
            }
        }
        Ok(())
    }

    /// Chosen values of a multi-select dimension (empty = unconstrained).
    pub fn values(&self, dimension: Dimension) -> impl Iterator<Item = &str> {
        self.values
            .get(&dimension)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn value_set(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.values.get(&dimension).filter(|set| !set.is_empty())
    }

    pub fn set_values(&mut self, dimension: Dimension, values: BTreeSet<String>) {
        let values: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            self.values.remove(&dimension);
        } else {
            self.values.insert(dimension, values);
        }
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    /// Set the email filter after validating it. Empty clears the filter.
    pub fn set_user_email(&mut self, email: &str) -> Result<(), FilterError> {
        let email = email.trim();
        validate_email(email)?;
        self.user_email = email.to_string();
        Ok(())
    }

    /// Effective annotator given the viewer identity.
    pub fn effective_annotator(&self, viewer: &str) -> AnnotatorFilter {
        self.annotator
            .clone()
            .unwrap_or_else(|| AnnotatorFilter::User(viewer.to_string()))
    }

    /// Does `run` pass every active dimension?
    pub fn matches(&self, run: &Run, ctx: &FilterContext) -> bool {
        passes_all(run, self, ctx)
    }

    /// True when no dimension constrains the list.
    pub fn is_unfiltered(&self) -> bool {
        self.status == AnnotationStatusFilter::All
            && self.time_range == TimeRange::All
            && self.values.is_empty()
            && self.user_email.is_empty()
            && self.task_title.is_empty()
            && self.question_title.is_empty()
    }

    /// Serialized description of the active filters, sent instead of an id
    /// list when a queue is created from "all matching" runs.
    pub fn describe(&self, viewer: &str) -> Value {
        let mut out = Map::new();
        out.insert("annotation_filter".into(), json!(self.status.as_str()));
        out.insert("time_range".into(), json!(self.time_range.as_str()));
        if let Some(user) = self.effective_annotator(viewer).user() {
            out.insert("annotator_user".into(), json!(user));
        }
        for dimension in Dimension::ALL {
            if let Some(set) = self.value_set(dimension) {
                out.insert(dimension.param().into(), json!(set));
            }
        }
        for (key, value) in [
            ("user_email", &self.user_email),
            ("task_title", &self.task_title),
            ("question_title", &self.question_title),
        ] {
            if !value.is_empty() {
                out.insert(key.into(), json!(value));
            }
        }
        Value::Object(out)
    }
}

/// Evaluation context: the clock and whose annotations count.
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub now: DateTime<FixedOffset>,
    pub annotator: AnnotatorFilter,
}

impl FilterContext {
    pub fn new(now: DateTime<FixedOffset>, annotator: AnnotatorFilter) -> Self {
        Self { now, annotator }
    }

    /// Context at the current local time.
    pub fn now(annotator: AnnotatorFilter) -> Self {
        Self::new(Local::now().fixed_offset(), annotator)
    }
}
