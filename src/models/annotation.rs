//! Reviewer annotations attached to runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::{null_as_default, ParseValueError};

/// A reviewer's verdict on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Correct,
    Wrong,
}

impl Judgement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Wrong => "wrong",
        }
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Judgement {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(Self::Correct),
            "wrong" => Ok(Self::Wrong),
            _ => Err(ParseValueError::new("judgement", s, "correct, wrong")),
        }
    }
}

/// One annotator's annotation on a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Only `correct`/`wrong` survive decoding; anything else becomes `None`.
    #[serde(default, deserialize_with = "lenient_judgement")]
    pub judgement: Option<Judgement>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// Raw ISO timestamp. Older payloads call this `timestamp`.
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Annotation {
    pub fn new(judgement: Judgement, notes: impl Into<String>) -> Self {
        Self {
            judgement: Some(judgement),
            notes: notes.into(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// True when there is a judgement or non-blank notes to show.
    pub fn has_content(&self) -> bool {
        self.judgement.is_some() || !self.notes.trim().is_empty()
    }
}

fn lenient_judgement<'de, D>(deserializer: D) -> Result<Option<Judgement>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_judgement_decodes_as_absent() {
        let a: Annotation = serde_json::from_str(r#"{"judgement": "maybe", "notes": "x"}"#).unwrap();
        assert_eq!(a.judgement, None);
        assert_eq!(a.notes, "x");

        let a: Annotation = serde_json::from_str(r#"{"judgement": 3}"#).unwrap();
        assert_eq!(a.judgement, None);
    }

    #[test]
    fn test_null_notes_and_timestamp_alias() {
        let a: Annotation = serde_json::from_str(
            r#"{"judgement": "wrong", "notes": null, "timestamp": "2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(a.judgement, Some(Judgement::Wrong));
        assert_eq!(a.notes, "");
        assert_eq!(a.created_at.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_has_content() {
        assert!(!Annotation::default().has_content());
        assert!(Annotation {
            notes: "  see above ".into(),
            ..Default::default()
        }
        .has_content());
    }
}
