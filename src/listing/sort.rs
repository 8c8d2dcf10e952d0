//! Sort comparator keyed by field name.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::{parse_timestamp, ParseValueError, Run};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    #[default]
    Timestamp,
    Name,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Name => "name",
        }
    }
}

impl FromStr for SortField {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(Self::Timestamp),
            "name" => Ok(Self::Name),
            _ => Err(ParseValueError::new("sort field", s, "timestamp, name")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ParseValueError::new("sort order", s, "asc, desc")),
        }
    }
}

/// Active sort. Defaults to newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SortState {
    pub by: SortField,
    pub order: SortOrder,
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.by.as_str(), self.order.as_str())
    }
}

impl SortState {
    pub fn new(by: SortField, order: SortOrder) -> Self {
        Self { by, order }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn compare(&self, a: &Run, b: &Run) -> Ordering {
        compare(a, b, self.by, self.order)
    }

    /// Stable in-place sort.
    pub fn sort(&self, runs: &mut [Run]) {
        runs.sort_by(|a, b| self.compare(a, b));
    }
}

/// Compare two runs on `by`. Runs without a parseable timestamp sort last
/// in both directions.
pub fn compare(a: &Run, b: &Run, by: SortField, order: SortOrder) -> Ordering {
    match by {
        SortField::Timestamp => match (sort_time(a), sort_time(b)) {
            (Some(x), Some(y)) => order.apply(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortField::Name => {
            order.apply(a.display_name().to_lowercase().cmp(&b.display_name().to_lowercase()))
        }
    }
}

/// Annotation entries sort on when the annotation was written, falling
/// back to the run's start time.
fn sort_time(run: &Run) -> Option<DateTime<Utc>> {
    run.annotator
        .as_deref()
        .and_then(|name| run.annotation_by(name))
        .and_then(|a| a.created_at.as_deref())
        .and_then(parse_timestamp)
        .or_else(|| run.started_at())
}
