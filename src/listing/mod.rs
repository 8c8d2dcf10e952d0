//! Filtered, sorted, paginated and selectable list views.
//!
//! [`ListViewController`] owns the state of one view and drives a
//! [`DataSource`]; the remaining modules are the pieces it composes.

mod controller;
mod pagination;
mod selection;
mod sort;
mod source;
mod url_state;

pub use controller::{ListViewController, LoadTicket, ViewStatus};
pub use pagination::{page_numbers, PageButton, PaginationState, PaginationSummary, DEFAULT_PAGE_SIZE};
pub use selection::{SelectionError, SelectionPayload, SelectionTracker};
pub use sort::{compare, SortField, SortOrder, SortState};
pub use source::{
    explode_annotations, local_page, AnnotationsSource, DataSource, ListQuery, LocalSource,
    PageResult, PagingMode, QueueSource, RunsSource, ANNOTATIONS_FETCH_SIZE,
};
pub use url_state::{HistorySink, MemoryHistory, UrlKeys, UrlState};
