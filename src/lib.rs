//! runreview: review queues of model runs.
//!
//! The library holds the list-view state machine shared by the runs, queue
//! and annotations views (filters, sort, pagination, selection and URL state),
//! the REST client for the review backend, and the renderers.

pub mod api;
pub mod cli;
pub mod config;
pub mod filters;
pub mod listing;
pub mod models;
pub mod view;

pub use api::{ApiClient, ApiError};
pub use config::{Config, Settings};
pub use listing::{DataSource, ListViewController};
