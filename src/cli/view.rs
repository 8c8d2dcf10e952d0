//! List view commands: runs, queue and annotations.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, info};

use super::ViewArgs;
use crate::api::ApiClient;
use crate::config::Settings;
use crate::listing::{
    AnnotationsSource, DataSource, ListViewController, QueueSource, RunsSource,
    SortState, UrlKeys, UrlState, ViewStatus,
};
use crate::models::{QueueId, RunId};
use crate::view::{
    AnnotationPanel, HtmlRenderer, RenderContext, RenderStrategy, SidePanel, TextRenderer, ViewKind,
};

/// Which list to show.
#[derive(Debug, Clone)]
pub enum Target {
    Runs,
    Queue(QueueId),
    Annotations,
}

impl Target {
    fn kind(&self) -> ViewKind {
        match self {
            Self::Runs => ViewKind::Runs,
            Self::Queue(_) => ViewKind::Queue,
            Self::Annotations => ViewKind::Annotations,
        }
    }

    fn keys(&self) -> UrlKeys {
        match self {
            Self::Queue(_) => UrlKeys::QUEUES,
            _ => UrlKeys::RUNS,
        }
    }

    fn source(&self, api: &ApiClient) -> Arc<dyn DataSource> {
        match self {
            Self::Runs => Arc::new(RunsSource::new(api.clone())),
            Self::Queue(id) => Arc::new(QueueSource::new(api.clone(), id.clone())),
            Self::Annotations => Arc::new(AnnotationsSource::new(api.clone())),
        }
    }
}

/// Initial state: the saved query string, then flags on top.
fn initial_state(target: &Target, args: &ViewArgs, settings: &Settings) -> anyhow::Result<UrlState> {
    let keys = target.keys();
    let mut state = match args.state.as_deref() {
        Some(query) => UrlState::from_query(query.trim_start_matches('?'), &keys),
        None => UrlState {
            page_size: settings.page_size,
            ..UrlState::default()
        },
    };

    let changes = args.filters.changes();
    if !changes.is_empty() {
        state.page = 1;
    }
    for change in changes {
        state.filters.apply(change)?;
    }
    if args.sort_by.is_some() || args.sort.is_some() {
        state.sort = SortState::new(
            args.sort_by.unwrap_or(state.sort.by),
            args.sort.unwrap_or(state.sort.order),
        );
        state.page = 1;
    }
    if let Some(page) = args.page {
        state.page = page.max(1);
    }
    if let Some(size) = args.page_size.filter(|&n| n > 0) {
        state.page_size = size;
    }
    if let Some(ref run) = args.run {
        state.record_id = Some(RunId::from(run.as_str()));
    }
    if let Target::Queue(id) = target {
        state.queue_id = Some(id.clone());
    }
    Ok(state)
}

/// Load a view, apply any annotation edit, and print it.
pub async fn run_view(target: Target, args: ViewArgs, settings: &Settings) -> anyhow::Result<()> {
    let api = ApiClient::from_settings(settings)?;
    let state = initial_state(&target, &args, settings)?;

    let mut controller = ListViewController::new(target.source(&api), settings.viewer.clone())
        .with_url_keys(target.keys())
        .select_first_on_load(!matches!(target, Target::Runs));

    let load = controller.initialize(state).await;

    if let Some(ref run) = args.run {
        if controller.select_record(&RunId::from(run.as_str())).is_none() {
            info!("Run {} is not on this page", run);
        }
    }

    let side = if args.metadata {
        SidePanel::Metadata
    } else if controller.selected_record().is_some() {
        SidePanel::Closed.on_record_selected()
    } else {
        SidePanel::Closed
    };

    let mut panel = controller.selected_record().map(|run| {
        AnnotationPanel::for_record(run, &controller.filter_annotator(), controller.viewer())
    });

    if args.judgement.is_some() || args.notes.is_some() {
        let panel = panel
            .as_mut()
            .context("No run is open; pass --run with an ID from the current page")?;
        if let Some(judgement) = args.judgement {
            panel.set_judgement(Some(judgement))?;
        }
        if let Some(ref notes) = args.notes {
            panel.set_notes(notes.clone())?;
        }
        if panel.can_save(Instant::now()) {
            let annotation = panel.save(&api).await?;
            let run_id = panel.run_id().clone();
            controller
                .annotation_saved(&run_id, panel.annotator(), annotation)
                .await;
        } else {
            debug!("Annotation unchanged, nothing to save");
        }
    }

    let ctx = RenderContext::new(target.kind(), &controller)
        .with_panel(panel.as_ref(), side)
        .with_offset(settings.display_offset());
    let output = if args.html {
        HtmlRenderer.render(&ctx)
    } else {
        TextRenderer.render(&ctx)
    };
    println!("{}", output);

    let query = controller.url_query();
    if !query.is_empty() {
        println!();
        println!("--state '{}'", query);
    }

    if let ViewStatus::Error { error, .. } = controller.status() {
        return Err(error.clone().into());
    }
    load.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::FilterArgs;
    use crate::filters::AnnotationStatusFilter;
    use crate::listing::{SortField, SortOrder};

    #[test]
    fn test_flags_override_saved_state() {
        let args = ViewArgs {
            state: Some("?status=correct&page=3&sort_by=name".into()),
            filters: FilterArgs {
                status: Some(AnnotationStatusFilter::Wrong),
                ..Default::default()
            },
            sort: Some(SortOrder::Asc),
            ..Default::default()
        };
        let state = initial_state(&Target::Runs, &args, &Settings::default()).unwrap();
        assert_eq!(state.filters.status, AnnotationStatusFilter::Wrong);
        assert_eq!(state.sort, SortState::new(SortField::Name, SortOrder::Asc));
        assert_eq!(state.page, 1);
    }

    #[test]
    fn test_queue_target_uses_queue_keys() {
        let args = ViewArgs {
            state: Some("taskId=9&queuePage=2".into()),
            ..Default::default()
        };
        let state = initial_state(&Target::Queue(QueueId::from("q1")), &args, &Settings::default()).unwrap();
        assert_eq!(state.record_id, Some(RunId::Int(9)));
        assert_eq!(state.page, 2);
        assert_eq!(state.queue_id, Some(QueueId::from("q1")));
    }
}
