//! Side panels: the annotation form and its exclusivity with the metadata panel.

use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{AnnotationWriter, ApiError, NewAnnotation};
use crate::filters::AnnotatorFilter;
use crate::models::{Annotation, Judgement, Run, RunId};

/// How long "Updated" / "Error" stays on the save button.
pub const FEEDBACK_DURATION: Duration = Duration::from_secs(2);

pub const SAVE_LABEL: &str = "Update annotation";

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Annotations by {0} are read-only")]
    ReadOnly(String),

    #[error("Select correct or wrong before saving")]
    NoJudgement,

    #[error("Nothing changed since the last save")]
    NotDirty,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Transient result shown on the save button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFeedback {
    Updated,
    Error,
}

impl SaveFeedback {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated => "Updated",
            Self::Error => "Error",
        }
    }
}

/// Annotation form for one record and one target annotator.
///
/// Editable only when the target annotator is the viewer; otherwise it
/// shows the target's annotation read-only.
#[derive(Debug, Clone)]
pub struct AnnotationPanel {
    run_id: RunId,
    annotator: String,
    editable: bool,
    saved_judgement: Option<Judgement>,
    saved_notes: String,
    judgement: Option<Judgement>,
    notes: String,
    feedback: Option<(SaveFeedback, Instant)>,
}

impl AnnotationPanel {
    /// Open the panel on `run` showing `annotator`'s annotation.
    pub fn open(run: &Run, annotator: &str, viewer: &str) -> Self {
        let existing = run.annotation_by(annotator).cloned().unwrap_or_default();
        Self {
            run_id: run.id.clone(),
            annotator: annotator.to_string(),
            editable: annotator == viewer,
            saved_judgement: existing.judgement,
            saved_notes: existing.notes.clone(),
            judgement: existing.judgement,
            notes: existing.notes,
            feedback: None,
        }
    }

    /// Open the panel for the selected record. Annotation entries target
    /// their own annotator, otherwise the filter annotator, falling back to
    /// the viewer when the filter shows everyone.
    pub fn for_record(run: &Run, filter: &AnnotatorFilter, viewer: &str) -> Self {
        let target = run
            .annotator
            .as_deref()
            .or_else(|| filter.user())
            .unwrap_or(viewer);
        Self::open(run, target, viewer)
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn annotator(&self) -> &str {
        &self.annotator
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn judgement(&self) -> Option<Judgement> {
        self.judgement
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// True when there is anything to show for a read-only annotator.
    pub fn has_annotation(&self) -> bool {
        self.saved_judgement.is_some() || !self.saved_notes.trim().is_empty()
    }

    pub fn set_judgement(&mut self, judgement: Option<Judgement>) -> Result<(), PanelError> {
        self.ensure_editable()?;
        self.judgement = judgement;
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), PanelError> {
        self.ensure_editable()?;
        self.notes = notes.into();
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), PanelError> {
        if self.editable {
            Ok(())
        } else {
            Err(PanelError::ReadOnly(self.annotator.clone()))
        }
    }

    /// Does the pending edit differ from the last saved state?
    ///
    /// With no saved judgement, only setting one counts. Otherwise a changed
    /// judgement or changed notes does.
    pub fn is_dirty(&self) -> bool {
        match self.saved_judgement {
            None => self.judgement.is_some(),
            Some(saved) => self.judgement != Some(saved) || self.notes != self.saved_notes,
        }
    }

    /// Feedback still on screen at `now`.
    pub fn feedback(&self, now: Instant) -> Option<SaveFeedback> {
        self.feedback
            .filter(|(_, at)| now.saturating_duration_since(*at) < FEEDBACK_DURATION)
            .map(|(feedback, _)| feedback)
    }

    /// Drop feedback that has expired.
    pub fn tick(&mut self, now: Instant) {
        if self.feedback(now).is_none() {
            self.feedback = None;
        }
    }

    pub fn can_save(&self, now: Instant) -> bool {
        self.editable && self.judgement.is_some() && self.is_dirty() && self.feedback(now).is_none()
    }

    pub fn button_label(&self, now: Instant) -> &'static str {
        self.feedback(now).map_or(SAVE_LABEL, |f| f.label())
    }

    /// Persist the pending edit. On success returns the annotation to apply
    /// to the in-memory record; on failure the typed notes are kept.
    pub async fn save(&mut self, writer: &dyn AnnotationWriter) -> Result<Annotation, PanelError> {
        self.ensure_editable()?;
        let judgement = self.judgement.ok_or(PanelError::NoJudgement)?;
        if !self.is_dirty() {
            return Err(PanelError::NotDirty);
        }

        let request = NewAnnotation {
            run_id: self.run_id.clone(),
            judgement,
            notes: self.notes.clone(),
        };
        match writer.write_annotation(&request).await {
            Ok(()) => {
                info!("Saved annotation on run {}", self.run_id);
                self.saved_judgement = Some(judgement);
                self.saved_notes = self.notes.clone();
                self.feedback = Some((SaveFeedback::Updated, Instant::now()));
                Ok(Annotation::new(judgement, self.notes.clone()).with_created_at(Utc::now().to_rfc3339()))
            }
            Err(e) => {
                warn!("Failed to save annotation on run {}: {}", self.run_id, e);
                self.feedback = Some((SaveFeedback::Error, Instant::now()));
                Err(PanelError::Api(e))
            }
        }
    }
}

/// Which side panel is open. At most one is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SidePanel {
    #[default]
    Closed,
    Annotation,
    Metadata,
}

impl SidePanel {
    pub fn toggle_annotation(self) -> Self {
        match self {
            Self::Annotation => Self::Closed,
            _ => Self::Annotation,
        }
    }

    pub fn toggle_metadata(self) -> Self {
        match self {
            Self::Metadata => Self::Closed,
            _ => Self::Metadata,
        }
    }

    /// Selecting a record opens the annotation panel unless metadata is showing.
    pub fn on_record_selected(self) -> Self {
        match self {
            Self::Metadata => Self::Metadata,
            _ => Self::Annotation,
        }
    }
}
