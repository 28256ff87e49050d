//! Pagination types shared by all repository contracts
//!
//! Listing and search operations return a [`Page`] of results for a
//! [`PageRequest`]. Implementations must keep ordering stable across
//! requests with identical inputs, so that walking pages never skips or
//! repeats entries while the underlying data is unchanged.

use serde::{Deserialize, Serialize};

/// Maximum page size accepted from callers
pub const MAX_PAGE_SIZE: u32 = 200;

/// Default page size when none is given
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A request for one page of results
///
/// Pages are zero-based. The size is clamped to [`MAX_PAGE_SIZE`] at
/// construction so a caller cannot request unbounded result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index
    pub page: u32,
    /// Number of items per page
    pub size: u32,
}

impl PageRequest {
    /// Creates a page request, clamping the size to the allowed range
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Requests the first page with the default size
    pub fn first() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }

    /// Returns the number of items to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of results together with paging metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page
    pub items: Vec<T>,
    /// Zero-based index of this page
    pub page: u32,
    /// Requested page size
    pub size: u32,
    /// Total number of items across all pages
    pub total_items: u64,
}

impl<T> Page<T> {
    /// Creates a page from items and the originating request
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page,
            size: request.size,
            total_items,
        }
    }

    /// Creates an empty page for the given request
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    /// Total number of pages for the recorded size
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.size))
    }

    /// True if a page with a higher index exists
    pub fn has_next(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages()
    }

    /// Maps the items, keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_items: self.total_items,
        }
    }
}
