//! Page-number pagination shared by every content source.
//!
//! Out-of-range requests are clamped rather than rejected: pages below 1
//! become 1, pages past the end become the last page.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_RELATED_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;

/// A requested page, already normalized to positive numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    pub fn new(page: i64, per_page: u32) -> Self {
        let page = u32::try_from(page.max(1)).unwrap_or(u32::MAX);
        Self {
            page,
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn first(per_page: u32) -> Self {
        Self::new(1, per_page)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    /// Resolve `request` against a result set of `total_items`.
    pub fn resolve(request: PageRequest, total_items: u64) -> Self {
        let per_page = request.per_page();
        let total_pages = u32::try_from(total_items.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);
        let current_page = request.page().min(total_pages);
        Self {
            current_page,
            total_pages,
            total_items,
            items_per_page: per_page,
            has_next_page: current_page < total_pages,
            has_previous_page: current_page > 1,
        }
    }

    /// Index of the first item on the current page.
    pub fn offset(&self) -> usize {
        (self.current_page as usize - 1) * self.items_per_page as usize
    }

    pub fn window<T>(&self, items: &[T]) -> std::ops::Range<usize> {
        let start = self.offset().min(items.len());
        let end = (start + self.items_per_page as usize).min(items.len());
        start..end
    }
}

/// Clamp a caller-supplied limit into `1..=max`.
pub fn clamp_limit(requested: usize, max: usize) -> usize {
    requested.clamp(1, max.max(1))
}
