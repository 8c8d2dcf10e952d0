//! Command-line interface for runreview.
//!
//! Every list command drives the shared [`ListViewController`] once and
//! prints the rendered view followed by its shareable query string.
//!
//! [`ListViewController`]: crate::listing::ListViewController

mod queue;
mod view;

use std::collections::BTreeSet;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::filters::{
    AnnotationStatusFilter, AnnotatorFilter, Dimension, FilterChange, FilterError, FilterState,
    TimeRange,
};
use crate::listing::{SortField, SortOrder};
use crate::models::{Judgement, QueueId};

#[derive(Parser, Debug)]
#[command(name = "runreview", version, about = "Review, filter and annotate model runs")]
pub struct Cli {
    /// Base URL of the review API
    #[arg(long, global = true, env = "RUNREVIEW_API_URL")]
    pub api_url: Option<String>,

    /// Reviewer identity used for annotations
    #[arg(long, global = true, env = "RUNREVIEW_VIEWER")]
    pub viewer: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Overlay flag values on settings loaded from config files.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref api_url) = self.api_url {
            settings.api_url = api_url.clone();
        }
        if let Some(ref viewer) = self.viewer {
            settings.viewer = viewer.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List runs (server-side paging)
    Runs(ViewArgs),

    /// List review queues
    Queues,

    /// Show one queue
    Queue {
        /// Queue ID
        id: String,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// List annotations, one row per annotator
    Annotations(ViewArgs),

    /// Create a queue from selected runs or from every run matching the filters
    CreateQueue(CreateQueueArgs),

    /// List organizations and courses available as filters
    Filters {
        /// Case-insensitive name search
        #[arg(long, default_value = "")]
        search: String,
    },
}

/// Filter flags shared by every list command.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Annotation status: all, unannotated, annotated, correct, wrong
    #[arg(long)]
    pub status: Option<AnnotationStatusFilter>,

    /// Time range: all, today, yesterday, last7, last30
    #[arg(long)]
    pub time_range: Option<TimeRange>,

    /// Whose annotations the status filter reads ("all" for anyone)
    #[arg(long)]
    pub annotator: Option<String>,

    /// Exact user email
    #[arg(long)]
    pub email: Option<String>,

    /// Task title substring
    #[arg(long)]
    pub task_title: Option<String>,

    /// Question title substring
    #[arg(long)]
    pub question_title: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub run_type: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub question_type: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub input_type: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub purpose: Vec<String>,

    /// Organization IDs
    #[arg(long, value_delimiter = ',')]
    pub org: Vec<String>,

    /// Course IDs
    #[arg(long, value_delimiter = ',')]
    pub course: Vec<String>,
}

impl FilterArgs {
    /// The edits these flags make, in application order.
    pub fn changes(&self) -> Vec<FilterChange> {
        let mut changes = Vec::new();
        if let Some(status) = self.status {
            changes.push(FilterChange::Status(status));
        }
        if let Some(range) = self.time_range {
            changes.push(FilterChange::TimeRange(range));
        }
        if let Some(ref annotator) = self.annotator {
            changes.push(FilterChange::Annotator(Some(AnnotatorFilter::from(annotator.as_str()))));
        }
        if let Some(ref email) = self.email {
            changes.push(FilterChange::UserEmail(email.clone()));
        }
        if let Some(ref title) = self.task_title {
            changes.push(FilterChange::TaskTitle(title.clone()));
        }
        if let Some(ref title) = self.question_title {
            changes.push(FilterChange::QuestionTitle(title.clone()));
        }
        let dimensions = [
            (Dimension::RunType, &self.run_type),
            (Dimension::QuestionType, &self.question_type),
            (Dimension::InputType, &self.input_type),
            (Dimension::Purpose, &self.purpose),
            (Dimension::Org, &self.org),
            (Dimension::Course, &self.course),
        ];
        for (dimension, values) in dimensions {
            if !values.is_empty() {
                let values: BTreeSet<String> = values
                    .iter()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                changes.push(FilterChange::Values(dimension, values));
            }
        }
        changes
    }

    /// Apply the flags on top of `filters`. Stops at the first invalid value.
    pub fn apply_to(&self, filters: &mut FilterState) -> Result<(), FilterError> {
        for change in self.changes() {
            filters.apply(change)?;
        }
        Ok(())
    }
}

/// Flags shared by the list views.
#[derive(Args, Debug, Default, Clone)]
pub struct ViewArgs {
    /// Saved view as a query string (as printed after each listing)
    #[arg(long)]
    pub state: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Page number
    #[arg(long)]
    pub page: Option<usize>,

    /// Rows per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Sort key: timestamp, name
    #[arg(long)]
    pub sort_by: Option<SortField>,

    /// Sort direction: asc, desc
    #[arg(long)]
    pub sort: Option<SortOrder>,

    /// Open the detail panel on this run
    #[arg(long)]
    pub run: Option<String>,

    /// Set your judgement on the open run: correct, wrong
    #[arg(long)]
    pub judgement: Option<Judgement>,

    /// Set your notes on the open run
    #[arg(long)]
    pub notes: Option<String>,

    /// Show the metadata panel instead of the annotation panel
    #[arg(long)]
    pub metadata: bool,

    /// Render HTML instead of terminal output
    #[arg(long)]
    pub html: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CreateQueueArgs {
    /// Queue name
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Run IDs to include
    #[arg(long, value_delimiter = ',', conflicts_with = "all_matching", required_unless_present = "all_matching")]
    pub runs: Vec<String>,

    /// Include every run matching the filter flags
    #[arg(long)]
    pub all_matching: bool,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    match cli.command {
        Commands::Runs(args) => view::run_view(view::Target::Runs, args, &settings).await,
        Commands::Queue { id, view: args } => {
            view::run_view(view::Target::Queue(QueueId::from(id)), args, &settings).await
        }
        Commands::Annotations(args) => view::run_view(view::Target::Annotations, args, &settings).await,
        Commands::Queues => queue::list_queues(&settings).await,
        Commands::CreateQueue(args) => queue::create_queue(args, &settings).await,
        Commands::Filters { search } => queue::filter_data(&search, &settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_filter_flags_become_changes() {
        let cli = Cli::parse_from([
            "runreview",
            "runs",
            "--status",
            "wrong",
            "--annotator",
            "all",
            "--run-type",
            "quiz,assignment",
            "--email",
            "a@b.io",
        ]);
        let Commands::Runs(args) = cli.command else {
            panic!("expected runs");
        };
        let mut filters = FilterState::default();
        args.filters.apply_to(&mut filters).unwrap();
        assert_eq!(filters.status, AnnotationStatusFilter::Wrong);
        assert_eq!(filters.annotator, Some(AnnotatorFilter::All));
        assert_eq!(
            filters.values(Dimension::RunType).collect::<Vec<_>>(),
            vec!["assignment", "quiz"]
        );
        assert_eq!(filters.user_email(), "a@b.io");
    }

    #[test]
    fn test_time_range_flag_values() {
        let cli = Cli::parse_from(["runreview", "runs", "--time-range", "last7"]);
        let Commands::Runs(args) = cli.command else {
            panic!("expected runs");
        };
        assert_eq!(args.filters.time_range, Some(TimeRange::Last7));

        // The help text lists exactly the accepted spellings.
        let help = Cli::command()
            .find_subcommand("runs")
            .and_then(|cmd| cmd.get_arguments().find(|a| a.get_id() == "time_range").cloned())
            .and_then(|arg| arg.get_help().map(ToString::to_string))
            .unwrap();
        for value in help.trim_start_matches("Time range: ").split(", ") {
            assert!(value.parse::<TimeRange>().is_ok(), "{value}");
        }
        assert!(Cli::try_parse_from(["runreview", "runs", "--time-range", "last7days"]).is_err());
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let args = FilterArgs {
            email: Some("nope".into()),
            ..Default::default()
        };
        let mut filters = FilterState::default();
        assert_eq!(
            args.apply_to(&mut filters),
            Err(FilterError::InvalidEmail("nope".into()))
        );
    }

    #[test]
    fn test_create_queue_requires_runs_or_all() {
        assert!(Cli::try_parse_from(["runreview", "create-queue", "--name", "Q"]).is_err());
        assert!(Cli::try_parse_from(["runreview", "create-queue", "--name", "Q", "--all-matching"]).is_ok());
    }
}
