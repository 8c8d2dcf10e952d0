//! Per-dimension predicates. Each returns `true` when the dimension places
//! no constraint on the run.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

use super::{AnnotationStatusFilter, AnnotatorFilter, Dimension, FilterContext, FilterState, TimeRange};
use crate::models::{Judgement, Run};

/// The judgement the status filter sees for `run`.
///
/// A specific annotator reads only that annotator's annotation. "All"
/// reads the first valid judgement in annotator-name order.
pub fn annotation_status(run: &Run, annotator: &AnnotatorFilter) -> Option<Judgement> {
    match annotator {
        AnnotatorFilter::User(name) => run.judgement_by(name),
        AnnotatorFilter::All => run.first_judgement(),
    }
}

pub fn passes_status(run: &Run, status: AnnotationStatusFilter, annotator: &AnnotatorFilter) -> bool {
    let judgement = annotation_status(run, annotator);
    match status {
        AnnotationStatusFilter::All => true,
        AnnotationStatusFilter::Unannotated => judgement.is_none(),
        AnnotationStatusFilter::Annotated => judgement.is_some(),
        AnnotationStatusFilter::Correct => judgement == Some(Judgement::Correct),
        AnnotationStatusFilter::Wrong => judgement == Some(Judgement::Wrong),
    }
}

/// Half-open buckets ending at `now`; midnight is taken in `now`'s offset.
/// Runs without a parseable start time only pass `TimeRange::All`.
pub fn passes_time_range(run: &Run, range: TimeRange, now: &DateTime<FixedOffset>) -> bool {
    if range == TimeRange::All {
        return true;
    }
    let Some(started) = run.started_at() else {
        return false;
    };

    let now_utc = now.with_timezone(&Utc);
    let midnight = local_midnight(now);
    let (from, until) = match range {
        TimeRange::All => return true,
        TimeRange::Today => (midnight, now_utc),
        TimeRange::Yesterday => (midnight - Duration::days(1), midnight),
        TimeRange::Last7 => (midnight - Duration::days(7), now_utc),
        TimeRange::Last30 => (midnight - Duration::days(30), now_utc),
    };
    started >= from && started < until
}

fn local_midnight(now: &DateTime<FixedOffset>) -> DateTime<Utc> {
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(*now.offset())
        .single()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

/// OR across the chosen values; empty set means unconstrained.
pub fn passes_values(run: &Run, dimension: Dimension, chosen: Option<&BTreeSet<String>>) -> bool {
    match chosen {
        None => true,
        Some(set) if set.is_empty() => true,
        Some(set) => dimension
            .record_value(run)
            .is_some_and(|value| set.contains(&value)),
    }
}

/// Case-insensitive equality on the learner email.
pub fn passes_email(run: &Run, email: &str) -> bool {
    if email.is_empty() {
        return true;
    }
    run.user_email()
        .is_some_and(|actual| actual.eq_ignore_ascii_case(email))
}

/// Case-insensitive substring match.
pub fn passes_text(field: Option<&str>, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_lowercase();
    field.is_some_and(|value| value.to_lowercase().contains(&needle))
}

/// AND across every dimension of `filters`.
pub fn passes_all(run: &Run, filters: &FilterState, ctx: &FilterContext) -> bool {
    passes_status(run, filters.status, &ctx.annotator)
        && passes_time_range(run, filters.time_range, &ctx.now)
        && Dimension::ALL
            .into_iter()
            .all(|d| passes_values(run, d, filters.value_set(d)))
        && passes_email(run, filters.user_email())
        && passes_text(run.task_title(), &filters.task_title)
        && passes_text(run.question_title(), &filters.question_title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Annotation;
    use chrono::TimeZone;
    use serde_json::json;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        // 2025-03-10 15:00 at +05:30
        ist().with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()
    }

    fn started(ts: &str) -> Run {
        Run::new("r").with_start_time(ts)
    }

    #[test]
    fn test_status_for_specific_annotator() {
        let run = Run::new(1).with_annotation("amy", Annotation::new(Judgement::Wrong, ""));
        let amy = AnnotatorFilter::User("amy".into());
        let bob = AnnotatorFilter::User("bob".into());

        assert!(passes_status(&run, AnnotationStatusFilter::Wrong, &amy));
        assert!(passes_status(&run, AnnotationStatusFilter::Annotated, &amy));
        assert!(!passes_status(&run, AnnotationStatusFilter::Correct, &amy));
        assert!(passes_status(&run, AnnotationStatusFilter::Unannotated, &bob));
        assert!(passes_status(&run, AnnotationStatusFilter::Wrong, &AnnotatorFilter::All));
    }

    #[test]
    fn test_time_range_buckets_use_local_midnight() {
        // Local midnight is 2025-03-09T18:30Z.
        let today = started("2025-03-09T19:00:00Z");
        let yesterday = started("2025-03-09T18:00:00Z");
        let last_week = started("2025-03-04T12:00:00Z");
        let now = now();

        assert!(passes_time_range(&today, TimeRange::Today, &now));
        assert!(!passes_time_range(&yesterday, TimeRange::Today, &now));
        assert!(passes_time_range(&yesterday, TimeRange::Yesterday, &now));
        assert!(!passes_time_range(&today, TimeRange::Yesterday, &now));
        assert!(passes_time_range(&last_week, TimeRange::Last7, &now));
        assert!(!passes_time_range(&last_week, TimeRange::Yesterday, &now));
        assert!(passes_time_range(&last_week, TimeRange::Last30, &now));
    }

    #[test]
    fn test_missing_start_time_only_passes_all() {
        let run = Run::new("x");
        assert!(passes_time_range(&run, TimeRange::All, &now()));
        assert!(!passes_time_range(&run, TimeRange::Last30, &now()));
    }

    #[test]
    fn test_values_or_within_dimension() {
        let run = Run::new(1).with_metadata("type", json!("quiz"));
        let chosen: BTreeSet<String> = ["quiz".to_string(), "exam".to_string()].into();
        assert!(passes_values(&run, Dimension::RunType, Some(&chosen)));

        let other: BTreeSet<String> = ["exam".to_string()].into();
        assert!(!passes_values(&run, Dimension::RunType, Some(&other)));
        assert!(!passes_values(&run, Dimension::Purpose, Some(&other)));
        assert!(passes_values(&run, Dimension::Purpose, None));
    }

    #[test]
    fn test_email_and_title_matching() {
        let run = Run::new(1)
            .with_metadata("user_email", json!("Learner@Example.com"))
            .with_metadata("task_title", json!("Loops and Arrays"));
        assert!(passes_email(&run, "learner@example.com"));
        assert!(!passes_email(&run, "learner@example.org"));
        assert!(passes_text(run.task_title(), "arrays"));
        assert!(!passes_text(run.question_title(), "arrays"));
        assert!(passes_text(run.question_title(), ""));
    }

    #[test]
    fn test_passes_all_is_conjunction() {
        let run = started("2025-03-10T05:00:00Z")
            .with_metadata("type", json!("quiz"))
            .with_annotation("amy", Annotation::new(Judgement::Correct, ""));
        let ctx = FilterContext::new(now(), AnnotatorFilter::User("amy".into()));

        let mut filters = FilterState::new();
        filters.status = AnnotationStatusFilter::Correct;
        filters.time_range = TimeRange::Today;
        filters.set_values(Dimension::RunType, ["quiz".to_string()].into());
        assert!(passes_all(&run, &filters, &ctx));

        filters.set_values(Dimension::RunType, ["exam".to_string()].into());
        assert!(!passes_all(&run, &filters, &ctx));
    }
}
