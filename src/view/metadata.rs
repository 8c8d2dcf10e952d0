use chrono::FixedOffset;
use serde_json::Value;

use crate::models::{parse_timestamp, Run};

const NOT_AVAILABLE: &str = "N/A";

/// Display a raw timestamp in `offset`. Unparseable input is shown as is.
pub fn format_timestamp(raw: Option<&str>, offset: &FixedOffset) -> String {
    match raw.filter(|s| !s.trim().is_empty()) {
        None => NOT_AVAILABLE.to_string(),
        Some(raw) => parse_timestamp(raw)
            .map(|dt| dt.with_timezone(offset).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}

/// Label/value rows of the metadata panel, in display order.
pub fn metadata_rows(run: &Run, offset: &FixedOffset) -> Vec<(&'static str, String)> {
    let text = |key: &str| run.meta_key(key).filter(|s| !s.is_empty());
    let has_context = match run.metadata.get("question_has_context") {
        Some(Value::Bool(true)) => "Yes",
        _ => "No",
    };

    vec![
        ("Stage", text("stage")),
        ("Type", text("type")),
        ("User", text("user_email")),
        ("Question Title", text("question_title")),
        ("Question Type", text("question_type")),
        ("Purpose", text("question_purpose")),
        ("Input Type", text("question_input_type")),
        ("Has Context", Some(has_context.to_string())),
        ("Organization", run.org_name()),
        ("Course", run.course_name()),
        ("Milestone", run.milestone_name()),
        ("Start Time", Some(format_timestamp(run.start_time.as_deref(), offset))),
        ("End Time", Some(format_timestamp(run.end_time.as_deref(), offset))),
    ]
    .into_iter()
    .map(|(label, value)| (label, value.unwrap_or_else(|| NOT_AVAILABLE.to_string())))
    .collect()
}
