//! Pagination viewport over primary rows.

use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_size: usize,
    page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 0,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages for `len` rows; an empty table still has one page.
    pub fn page_count(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    /// Pull the current page back in range after the row count shrank.
    /// Returns `true` if the page moved.
    pub fn clamp(&mut self, len: usize) -> bool {
        let last = self.page_count(len) - 1;
        if self.page > last {
            self.page = last;
            true
        } else {
            false
        }
    }

    pub fn next_page(&mut self, len: usize) -> bool {
        if self.page + 1 < self.page_count(len) {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.page = 0;
    }

    /// Index range of the current page within `len` rows.
    pub fn range(&self, len: usize) -> Range<usize> {
        let start = (self.page * self.page_size).min(len);
        let end = (start + self.page_size).min(len);
        start..end
    }

    pub fn visible<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        &rows[self.range(rows.len())]
    }

    /// Identities of the visible rows, in display order.
    pub fn visible_ids<T, F>(&self, rows: &[T], key: F) -> Vec<String>
    where
        F: Fn(&T) -> &str,
    {
        self.visible(rows).iter().map(|row| key(row).to_string()).collect()
    }
}
