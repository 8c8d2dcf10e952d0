//! Queue management and filter option commands.

use console::style;
use tracing::info;

use super::CreateQueueArgs;
use crate::api::{ApiClient, NewQueue, QueueSelection};
use crate::config::Settings;
use crate::filters::FilterState;
use crate::listing::{SelectionPayload, SelectionTracker};
use crate::models::RunId;
use crate::view::{RenderStrategy, TextRenderer};

pub async fn list_queues(settings: &Settings) -> anyhow::Result<()> {
    let api = ApiClient::from_settings(settings)?;
    let listing = api.list_queues().await?;
    println!("{}", TextRenderer.render_queues(&listing.queues));
    Ok(())
}

pub async fn filter_data(search: &str, settings: &Settings) -> anyhow::Result<()> {
    let api = ApiClient::from_settings(settings)?;
    let data = api.filter_data().await?;
    println!("{}", TextRenderer.render_filter_data(&data, search));
    Ok(())
}

/// Build the selection the new queue is created from.
fn selection(args: &CreateQueueArgs, viewer: &str) -> anyhow::Result<SelectionPayload> {
    let mut tracker = SelectionTracker::new();
    if args.all_matching {
        let mut filters = FilterState::default();
        args.filters.apply_to(&mut filters)?;
        // The backend recomputes the matching set; the count is informational.
        tracker.select_all_matching(0);
        return tracker
            .payload(&filters, viewer)
            .ok_or_else(|| anyhow::anyhow!("Nothing selected"));
    }

    tracker.select_all_on_page(
        args.runs
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(RunId::from),
    );
    tracker
        .payload(&FilterState::default(), viewer)
        .ok_or_else(|| anyhow::anyhow!("No run IDs given"))
}

pub async fn create_queue(args: CreateQueueArgs, settings: &Settings) -> anyhow::Result<()> {
    let payload = selection(&args, &settings.viewer)?;
    let api = ApiClient::from_settings(settings)?;
    let queue = NewQueue {
        name: args.name.clone(),
        description: args.description.clone(),
        selection: QueueSelection::from(payload),
    };
    let id = api.create_queue(&queue).await?;
    info!("Created queue {}", id);
    println!("{} {}", style("Created queue").green(), id);
    Ok(())
}
