//! HTML fragments for list views.

use std::fmt::Write;

use super::metadata::{format_timestamp, metadata_rows};
use super::panel::{AnnotationPanel, SidePanel};
use super::{queue_header, tag_badges, RenderContext, RenderStrategy, ViewKind};
use crate::filters::annotation_status;
use crate::listing::{PageButton, UrlState, ViewStatus};
use crate::models::{FilterData, Judgement, NamedRef, QueueSummary, Run};

/// Renders HTML fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl RenderStrategy for HtmlRenderer {
    fn render_row(&self, run: &Run, ctx: &RenderContext<'_>) -> String {
        let annotator = ctx.controller.filter_annotator();
        let icon = status_icon(annotation_status(run, &annotator));
        let selected = if ctx.is_selected(run) { " selected" } else { "" };
        let checked = if ctx.controller.selection().is_selected(&run.id) {
            " checked"
        } else {
            ""
        };
        let badges: String = tag_badges(run)
            .iter()
            .map(|tag| {
                format!(
                    r#"<span class="px-2 py-1 text-xs {} rounded">{}</span>"#,
                    tag.color,
                    html_escape(&tag.value)
                )
            })
            .collect::<Vec<_>>()
            .join("");
        let annotator_line = run
            .annotator
            .as_deref()
            .map(|name| format!(r#"<div class="run-annotator">{}</div>"#, html_escape(name)))
            .unwrap_or_default();

        format!(
            r#"
        <div class="run-row{}" data-run-id="{}">
            <input type="checkbox" class="run-select" value="{}"{}>
            {}
            <div class="run-body">
                <div class="run-name">{}</div>
                {}
                <div class="run-time">{}</div>
                <div class="run-tags">{}</div>
            </div>
        </div>
        "#,
            selected,
            html_escape(&run.id.as_key()),
            html_escape(&run.id.as_key()),
            checked,
            icon,
            html_escape(&run.display_name()),
            annotator_line,
            format_timestamp(run.start_time.as_deref(), &ctx.offset),
            badges
        )
    }

    fn render(&self, ctx: &RenderContext<'_>) -> String {
        let controller = ctx.controller;

        let header = if ctx.kind == ViewKind::Queue {
            let (title, creator) = queue_header(
                ctx.title(),
                controller.pagination().total_count(),
                controller.total_is_estimate(),
                controller.owner(),
            );
            let creator = creator
                .map(|c| format!(r#"<span class="queue-creator">{}</span>"#, html_escape(&c)))
                .unwrap_or_default();
            format!(r#"<h2 id="queueHeader">{}</h2>{}"#, html_escape(&title), creator)
        } else {
            format!(r#"<h2 id="listHeader">{}</h2>"#, html_escape(&ctx.header()))
        };

        let body = match controller.status() {
            ViewStatus::Error { error, failed } => {
                let retry_query = UrlState {
                    filters: failed.filters.clone(),
                    sort: failed.sort,
                    page: failed.page,
                    page_size: failed.page_size,
                    ..controller.url_state()
                }
                .to_query(&controller.url_keys());
                format!(
                    r#"<div class="list-error">
                <p>{}</p>
                <a class="retry" href="?{}">Retry</a>
            </div>"#,
                    html_escape(&error.to_string()),
                    html_escape(&retry_query)
                )
            }
            ViewStatus::Ready if controller.current_page_records().is_empty() => {
                r#"<div class="list-empty">No runs match the current filters.</div>"#.to_string()
            }
            status => {
                let loading = if *status == ViewStatus::Loading {
                    r#"<div class="loading-spinner"></div>"#
                } else {
                    ""
                };
                let rows: String = controller
                    .current_page_records()
                    .iter()
                    .map(|run| self.render_row(run, ctx))
                    .collect();
                format!(r#"{}<div id="runsList">{}</div>"#, loading, rows)
            }
        };

        let selection = if controller.selection().is_empty() {
            String::new()
        } else {
            format!(
                r#"<div class="selection-count">{} selected</div>"#,
                controller.selection().count()
            )
        };

        let side = match (ctx.side, controller.selected_record()) {
            (SidePanel::Annotation, Some(run)) => ctx
                .panel
                .map(|panel| annotation_panel(run, panel, ctx))
                .unwrap_or_default(),
            (SidePanel::Metadata, Some(run)) => metadata_panel(run, ctx),
            _ => String::new(),
        };

        format!(
            r#"
    <section class="run-list">
        <header>
            {}
            <span id="annotatedCount">{}</span>
            {}
        </header>
        {}
        {}
    </section>
    {}
    "#,
            header,
            html_escape(&ctx.annotated_label()),
            selection,
            body,
            pagination(ctx),
            side
        )
    }

    fn render_queues(&self, queues: &[QueueSummary]) -> String {
        let mut rows = String::new();
        for queue in queues {
            let _ = write!(
                rows,
                r#"
        <tr>
            <td><a href="/queues/{}">{}</a></td>
            <td>{}</td>
            <td>{}</td>
            <td>{}</td>
        </tr>
        "#,
                urlencoding::encode(&queue.id.as_key()),
                html_escape(&queue.name),
                queue.count.map(|c| c.to_string()).unwrap_or_default(),
                html_escape(queue.created_by.as_deref().unwrap_or("")),
                html_escape(queue.created_date.as_deref().unwrap_or(""))
            );
        }

        format!(
            r#"
    <table class="queue-listing">
        <thead>
            <tr>
                <th>Queue</th>
                <th>Runs</th>
                <th>Created by</th>
                <th>Created</th>
            </tr>
        </thead>
        <tbody>
            {}
        </tbody>
    </table>
    "#,
            rows
        )
    }

    fn render_filter_data(&self, data: &FilterData, search: &str) -> String {
        format!(
            r#"
    <div class="filter-options">
        <fieldset><legend>Organizations</legend>{}</fieldset>
        <fieldset><legend>Courses</legend>{}</fieldset>
    </div>
    "#,
            option_list("org_id", &data.search_orgs(search)),
            option_list("course_id", &data.search_courses(search))
        )
    }
}

fn option_list(name: &str, items: &[&NamedRef]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                r#"<label><input type="checkbox" name="{}" value="{}"> {}</label>"#,
                name,
                html_escape(&item.id.as_key()),
                html_escape(&item.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_icon(judgement: Option<Judgement>) -> &'static str {
    match judgement {
        Some(Judgement::Correct) => r#"<span class="status status-correct" title="correct">&#10003;</span>"#,
        Some(Judgement::Wrong) => r#"<span class="status status-wrong" title="wrong">&#10007;</span>"#,
        None => r#"<span class="status status-empty" title="not annotated"></span>"#,
    }
}

fn pagination(ctx: &RenderContext<'_>) -> String {
    let controller = ctx.controller;
    let summary = controller.pagination_summary();
    if summary.total_pages <= 1 {
        return String::new();
    }

    let href = |page: usize| {
        let state = UrlState {
            page,
            ..controller.url_state()
        };
        format!("?{}", html_escape(&state.to_query(&controller.url_keys())))
    };

    let mut nav = String::new();
    if summary.has_previous() {
        let _ = write!(
            nav,
            r#"<a href="{}" class="page-link">&laquo; Previous</a> "#,
            href(summary.current_page - 1)
        );
    }
    for button in controller.pagination().page_numbers() {
        match button {
            PageButton::Page { number, active: true } => {
                let _ = write!(nav, r#"<span class="page-link active">{}</span> "#, number);
            }
            PageButton::Page { number, .. } => {
                let _ = write!(nav, r#"<a href="{}" class="page-link">{}</a> "#, href(number), number);
            }
            PageButton::Ellipsis => nav.push_str(r#"<span class="page-gap">...</span> "#),
        }
    }
    if summary.has_next() {
        let _ = write!(
            nav,
            r#"<a href="{}" class="page-link">Next &raquo;</a>"#,
            href(summary.current_page + 1)
        );
    }

    format!(
        r#"<div class="pagination">
            <span class="page-position">Showing {}-{} of {}</span>
            {}
        </div>"#,
        summary.start_index, summary.end_index, summary.total_count, nav
    )
}

fn record_nav(ctx: &RenderContext<'_>) -> String {
    let Some((index, total)) = ctx.controller.position() else {
        return String::new();
    };
    let disabled = |off: bool| if off { " disabled" } else { "" };
    format!(
        r#"<div class="record-nav">
            <button id="prevAnnotationBtn"{}>Previous</button>
            <span id="annotationCounter">{} of {}</span>
            <button id="nextAnnotationBtn"{}>Next</button>
        </div>"#,
        disabled(index <= 1),
        index,
        total,
        disabled(index >= total)
    )
}

fn annotation_panel(run: &Run, panel: &AnnotationPanel, ctx: &RenderContext<'_>) -> String {
    if !panel.is_editable() && !panel.has_annotation() {
        return format!(
            r#"
    <aside id="annotationSidebar">
        <h3>No annotations found</h3>
        <p>{} has not annotated this run yet</p>
        {}
    </aside>
    "#,
            html_escape(panel.annotator()),
            record_nav(ctx)
        );
    }

    let readonly = if panel.is_editable() { "" } else { " disabled" };
    let pressed = |j: Judgement| {
        if panel.judgement() == Some(j) {
            " aria-pressed=\"true\""
        } else {
            ""
        }
    };
    let save = if panel.is_editable() {
        let disabled = if panel.can_save(ctx.now) { "" } else { " disabled" };
        format!(
            r#"<button id="updateAnnotationBtn"{}>{}</button>"#,
            disabled,
            panel.button_label(ctx.now)
        )
    } else {
        String::new()
    };

    format!(
        r#"
    <aside id="annotationSidebar" data-run-id="{}">
        <h3>{}</h3>
        <div class="annotator">{}</div>
        <div class="judgement">
            <button id="correctBtn"{}{}>Correct</button>
            <button id="wrongBtn"{}{}>Wrong</button>
        </div>
        <textarea id="annotationNotes"{}>{}</textarea>
        {}
        {}
    </aside>
    "#,
        html_escape(&run.id.as_key()),
        html_escape(&run.display_name()),
        html_escape(panel.annotator()),
        pressed(Judgement::Correct),
        readonly,
        pressed(Judgement::Wrong),
        readonly,
        readonly,
        html_escape(panel.notes()),
        save,
        record_nav(ctx)
    )
}

fn metadata_panel(run: &Run, ctx: &RenderContext<'_>) -> String {
    let rows: String = metadata_rows(run, &ctx.offset)
        .into_iter()
        .map(|(label, value)| {
            format!(
                r#"<div class="meta-row"><div class="meta-label">{}</div><div class="meta-value">{}</div></div>"#,
                label,
                html_escape(&value)
            )
        })
        .collect();
    format!(
        r#"
    <aside id="metadataSidebar">
        {}
        {}
    </aside>
    "#,
        rows,
        record_nav(ctx)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
