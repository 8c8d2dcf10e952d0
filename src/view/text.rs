//! Terminal rendering.

use console::{style, Color, Style};

use super::metadata::{format_timestamp, metadata_rows};
use super::panel::SidePanel;
use super::{queue_header, tag_badges, RenderContext, RenderStrategy, ViewKind};
use crate::filters::annotation_status;
use crate::listing::{PageButton, ViewStatus};
use crate::models::{FilterData, Judgement, NamedRef, QueueSummary, Run};

/// Renders plain lines with ANSI styling.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

/// Terminal color for a badge's CSS classes.
fn badge_color(classes: &str) -> Color {
    let hue = classes
        .split_whitespace()
        .find_map(|class| class.strip_prefix("text-"))
        .and_then(|rest| rest.split('-').next())
        .unwrap_or("gray");
    match hue {
        "blue" => Color::Blue,
        "emerald" | "green" => Color::Green,
        "cyan" | "teal" => Color::Cyan,
        "orange" | "yellow" => Color::Yellow,
        _ => Color::White,
    }
}

fn status_marker(judgement: Option<Judgement>) -> String {
    match judgement {
        Some(Judgement::Correct) => style("✓").green().to_string(),
        Some(Judgement::Wrong) => style("✗").red().to_string(),
        None => style("·").dim().to_string(),
    }
}

impl RenderStrategy for TextRenderer {
    fn render_row(&self, run: &Run, ctx: &RenderContext<'_>) -> String {
        let annotator = ctx.controller.filter_annotator();
        let cursor = if ctx.is_selected(run) { ">" } else { " " };
        let checkbox = if ctx.controller.selection().is_selected(&run.id) {
            "[x]"
        } else {
            "[ ]"
        };
        let badges: Vec<String> = tag_badges(run)
            .into_iter()
            .map(|tag| Style::new().fg(badge_color(tag.color)).apply_to(tag.value).to_string())
            .collect();

        let mut line = format!(
            "{} {} {} {:>8}  {}  {}",
            cursor,
            checkbox,
            status_marker(annotation_status(run, &annotator)),
            run.id.as_key(),
            style(run.display_name()).bold(),
            style(format_timestamp(run.start_time.as_deref(), &ctx.offset)).dim()
        );
        if let Some(name) = run.annotator.as_deref() {
            line.push_str(&format!("  @{}", name));
        }
        if !badges.is_empty() {
            line.push_str("  ");
            line.push_str(&badges.join(" "));
        }
        line
    }

    fn render(&self, ctx: &RenderContext<'_>) -> String {
        let controller = ctx.controller;
        let mut out = Vec::new();

        if ctx.kind == ViewKind::Queue {
            let (title, creator) = queue_header(
                ctx.title(),
                controller.pagination().total_count(),
                controller.total_is_estimate(),
                controller.owner(),
            );
            out.push(style(title).bold().to_string());
            if let Some(creator) = creator {
                out.push(style(creator).dim().to_string());
            }
        } else {
            out.push(style(ctx.header()).bold().to_string());
        }
        out.push(ctx.annotated_label());
        if !controller.selection().is_empty() {
            out.push(format!("{} selected", controller.selection().count()));
        }
        out.push(String::new());

        match controller.status() {
            ViewStatus::Error { error, .. } => {
                out.push(style(format!("Error: {}", error)).red().to_string());
                out.push("Run the same command again to retry.".to_string());
            }
            ViewStatus::Loading => out.push(style("Loading...").dim().to_string()),
            _ if controller.current_page_records().is_empty() => {
                out.push("No runs match the current filters.".to_string());
            }
            _ => out.extend(
                controller
                    .current_page_records()
                    .iter()
                    .map(|run| self.render_row(run, ctx)),
            ),
        }

        let summary = controller.pagination_summary();
        if summary.total_pages > 1 {
            let pages: Vec<String> = controller
                .pagination()
                .page_numbers()
                .into_iter()
                .map(|button| match button {
                    PageButton::Page { number, active: true } => {
                        style(format!("[{}]", number)).bold().to_string()
                    }
                    PageButton::Page { number, .. } => number.to_string(),
                    PageButton::Ellipsis => "...".to_string(),
                })
                .collect();
            out.push(String::new());
            out.push(format!(
                "Showing {}-{} of {}   {}",
                summary.start_index,
                summary.end_index,
                summary.total_count,
                pages.join(" ")
            ));
        }

        if let Some(run) = controller.selected_record() {
            match ctx.side {
                SidePanel::Annotation => {
                    if let Some(panel) = ctx.panel {
                        out.push(String::new());
                        out.push(style(format!("Annotation by {}", panel.annotator())).bold().to_string());
                        if !panel.is_editable() && !panel.has_annotation() {
                            out.push(format!("{} has not annotated this run yet", panel.annotator()));
                        } else {
                            out.push(format!(
                                "Judgement: {}",
                                panel.judgement().map(|j| j.as_str()).unwrap_or("none")
                            ));
                            if !panel.notes().is_empty() {
                                out.push(format!("Notes: {}", panel.notes()));
                            }
                            if !panel.is_editable() {
                                out.push(style("read only").dim().to_string());
                            }
                        }
                    }
                }
                SidePanel::Metadata => {
                    out.push(String::new());
                    for (label, value) in metadata_rows(run, &ctx.offset) {
                        out.push(format!("{:<15} {}", style(label).dim(), value));
                    }
                }
                SidePanel::Closed => {}
            }
            if ctx.side != SidePanel::Closed {
                if let Some((index, total)) = controller.position() {
                    out.push(format!("{} of {}", index, total));
                }
            }
        }

        out.join("\n")
    }

    fn render_queues(&self, queues: &[QueueSummary]) -> String {
        if queues.is_empty() {
            return "No queues.".to_string();
        }
        queues
            .iter()
            .map(|queue| {
                format!(
                    "{:>6}  {}  {}  {}",
                    queue.id.as_key(),
                    style(&queue.name).bold(),
                    queue.count.map(|c| format!("({} runs)", c)).unwrap_or_default(),
                    style(queue.created_by.as_deref().unwrap_or("")).dim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_filter_data(&self, data: &FilterData, search: &str) -> String {
        let section = |title: &str, items: Vec<&NamedRef>| {
            let mut lines = vec![style(title).bold().to_string()];
            lines.extend(items.iter().map(|item| format!("  {:>6}  {}", item.id.as_key(), item.name)));
            lines.join("\n")
        };
        format!(
            "{}\n\n{}",
            section("Organizations", data.search_orgs(search)),
            section("Courses", data.search_courses(search))
        )
    }
}
