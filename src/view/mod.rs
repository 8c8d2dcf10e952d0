//! Rendering of list views and their side panels.
//!
//! Renderers are pure: they read a [`RenderContext`] and return markup.
//! [`HtmlRenderer`] produces HTML fragments, [`TextRenderer`] terminal output.

mod metadata;
mod panel;
mod templates;
mod text;

pub use metadata::{format_timestamp, metadata_rows};
pub use panel::{
    AnnotationPanel, PanelError, SaveFeedback, SidePanel, FEEDBACK_DURATION, SAVE_LABEL,
};
pub use templates::HtmlRenderer;
pub use text::TextRenderer;

use std::time::Instant;

use chrono::{FixedOffset, Offset, Utc};

use crate::listing::ListViewController;
use crate::models::{FilterData, QueueSummary, Run};

/// Which list a controller is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Runs,
    Queue,
    Annotations,
}

impl ViewKind {
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Runs => "All runs",
            Self::Queue => "Queue",
            Self::Annotations => "Annotations",
        }
    }
}

/// Everything a renderer reads.
pub struct RenderContext<'a> {
    pub kind: ViewKind,
    pub controller: &'a ListViewController,
    pub panel: Option<&'a AnnotationPanel>,
    pub side: SidePanel,
    /// Offset used to display timestamps.
    pub offset: FixedOffset,
    pub now: Instant,
}

impl<'a> RenderContext<'a> {
    pub fn new(kind: ViewKind, controller: &'a ListViewController) -> Self {
        Self {
            kind,
            controller,
            panel: None,
            side: SidePanel::Closed,
            offset: Utc.fix(),
            now: Instant::now(),
        }
    }

    pub fn with_panel(mut self, panel: Option<&'a AnnotationPanel>, side: SidePanel) -> Self {
        self.panel = panel;
        self.side = side;
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn title(&self) -> &str {
        self.controller
            .title()
            .unwrap_or_else(|| self.kind.default_title())
    }

    /// `"{title} ({shown})"`, or `"{title} ({shown} of {total})"` when they differ.
    pub fn header(&self) -> String {
        list_header(
            self.title(),
            self.controller.current_page_records().len(),
            self.controller.pagination().total_count(),
        )
    }

    pub fn annotated_label(&self) -> String {
        annotated_label(
            self.controller.annotated_on_page(),
            self.controller.current_page_records().len(),
        )
    }

    pub fn is_selected(&self, run: &Run) -> bool {
        self.controller
            .selected_record()
            .is_some_and(|selected| selected.id == run.id && selected.annotator == run.annotator)
    }
}

/// Rendering capability supplied per view.
pub trait RenderStrategy {
    /// One list row.
    fn render_row(&self, run: &Run, ctx: &RenderContext<'_>) -> String;

    /// The whole view: header, rows, pager, and the open side panel.
    fn render(&self, ctx: &RenderContext<'_>) -> String;

    fn render_queues(&self, queues: &[QueueSummary]) -> String;

    fn render_filter_data(&self, data: &FilterData, search: &str) -> String;
}

pub fn list_header(title: &str, shown: usize, total: usize) -> String {
    if shown == total {
        format!("{} ({})", title, shown)
    } else {
        format!("{} ({} of {})", title, shown, total)
    }
}

pub fn annotated_label(annotated: usize, total: usize) -> String {
    format!("Annotated {}/{}", annotated, total)
}

/// Queue header: name with total and creator. An estimated total reads "up to N".
pub fn queue_header(
    name: &str,
    total: usize,
    estimate: bool,
    created_by: Option<&str>,
) -> (String, Option<String>) {
    let total = if estimate {
        format!("up to {}", total)
    } else {
        total.to_string()
    };
    (
        format!("{} ({})", name, total),
        created_by.map(|user| format!("Created by {}", user)),
    )
}

/// Metadata keys shown as badges, in display order.
const TAG_KEYS: &[&str] = &["question_input_type", "question_type", "question_purpose", "type"];

const DEFAULT_TAG_COLOR: &str = "bg-gray-100 text-gray-800";

/// A metadata value shown as a colored badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBadge {
    pub value: String,
    /// CSS classes; [`TextRenderer`] maps them to terminal colors.
    pub color: &'static str,
}

pub fn tag_color(value: &str) -> &'static str {
    match value {
        "feedback" => "bg-blue-100 text-blue-800",
        "text" => "bg-gray-100 text-gray-800",
        "code" => "bg-emerald-100 text-emerald-800",
        "audio" => "bg-cyan-100 text-cyan-800",
        "subjective" => "bg-green-100 text-green-800",
        "objective" => "bg-teal-100 text-teal-800",
        "practice" => "bg-orange-100 text-orange-800",
        "exam" => "bg-yellow-100 text-yellow-800",
        _ => DEFAULT_TAG_COLOR,
    }
}

pub fn tag_badges(run: &Run) -> Vec<TagBadge> {
    TAG_KEYS
        .iter()
        .filter_map(|key| run.meta_key(key))
        .filter(|value| !value.is_empty())
        .map(|value| TagBadge {
            color: tag_color(&value),
            value,
        })
        .collect()
}
