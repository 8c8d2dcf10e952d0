//! Pagination window shared by client-local and server-driven lists.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Numbered buttons shown around the current page.
const MAX_VISIBLE_PAGES: usize = 5;

/// Invariant: `1 <= current_page <= max(1, total_pages)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    current_page: usize,
    page_size: usize,
    total_count: usize,
    total_pages: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            total_count: 0,
            total_pages: 1,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Requested page before totals are known, e.g. from a URL. Until totals
    /// arrive, that page counts as the last page.
    pub fn with_page(mut self, page: usize) -> Self {
        self.current_page = page.max(1);
        self
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Derive totals from a known record count and clamp the current page.
    pub fn set_total_count(&mut self, total_count: usize) {
        self.total_count = total_count;
        self.total_pages = total_count.div_ceil(self.page_size).max(1);
        self.clamp();
    }

    /// Adopt totals reported by the server for one page.
    pub fn set_server_totals(&mut self, total_count: usize, total_pages: usize, current_page: usize) {
        self.total_count = total_count;
        self.total_pages = total_pages.max(1);
        self.current_page = current_page.max(1);
        self.clamp();
    }

    /// Page count for display: never below the current page.
    fn shown_pages(&self) -> usize {
        self.total_pages.max(self.current_page)
    }

    fn clamp(&mut self) {
        self.current_page = self.current_page.clamp(1, self.total_pages.max(1));
    }

    /// Is `page` a valid navigation target other than the current page?
    pub fn can_go_to(&self, page: usize) -> bool {
        page >= 1 && page <= self.total_pages && page != self.current_page
    }

    /// Move to `page`. Returns `false` and leaves state unchanged when out of range.
    pub fn go_to(&mut self, page: usize) -> bool {
        if !self.can_go_to(page) {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn offset(&self) -> usize {
        (self.current_page - 1) * self.page_size
    }

    /// The current page's window over a fully materialized list.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }

    pub fn summary(&self) -> PaginationSummary {
        let (start_index, end_index) = if self.total_count == 0 {
            (0, 0)
        } else {
            let start = (self.offset() + 1).min(self.total_count);
            let end = (self.current_page * self.page_size).min(self.total_count);
            (start, end)
        };
        PaginationSummary {
            current_page: self.current_page,
            total_pages: self.shown_pages(),
            total_count: self.total_count,
            start_index,
            end_index,
        }
    }

    pub fn page_numbers(&self) -> Vec<PageButton> {
        page_numbers(self.current_page, self.shown_pages())
    }
}

/// What the pager footer shows. Indices are 1-based and inclusive, 0 when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationSummary {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub start_index: usize,
    pub end_index: usize,
}

impl PaginationSummary {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageButton {
    Page { number: usize, active: bool },
    Ellipsis,
}

/// At most five numbered pages centred on `current`, plus the first and
/// last page with ellipses where pages are skipped. Empty for a single page.
pub fn page_numbers(current: usize, total_pages: usize) -> Vec<PageButton> {
    if total_pages <= 1 {
        return Vec::new();
    }

    let mut start = current.saturating_sub(MAX_VISIBLE_PAGES / 2).max(1);
    let end = (start + MAX_VISIBLE_PAGES - 1).min(total_pages);
    if end - start + 1 < MAX_VISIBLE_PAGES {
        start = (end + 1).saturating_sub(MAX_VISIBLE_PAGES).max(1);
    }

    let page = |number| PageButton::Page {
        number,
        active: number == current,
    };
    let mut buttons = Vec::new();
    if start > 1 {
        buttons.push(page(1));
        if start > 2 {
            buttons.push(PageButton::Ellipsis);
        }
    }
    buttons.extend((start..=end).map(page));
    if end < total_pages {
        if end < total_pages - 1 {
            buttons.push(PageButton::Ellipsis);
        }
        buttons.push(page(total_pages));
    }
    buttons
}
