//! Page boundaries over a ranked result list

use std::ops::Range;

/// One page of a result list
///
/// `start` is clamped to the last page and aligned to a page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndex {
    /// Offset of the first item on the page
    pub start: usize,
    /// Items per page
    pub per_page: usize,
    /// Items in the whole list
    pub total: usize,
}

impl PageIndex {
    /// Compute the page containing `start`
    pub fn new(total: usize, per_page: usize, start: usize) -> Self {
        let per_page = per_page.max(1);
        let last_start = if total == 0 {
            0
        } else {
            (total - 1) / per_page * per_page
        };
        let start = start.min(last_start) / per_page * per_page;
        PageIndex {
            start,
            per_page,
            total,
        }
    }

    /// Item offsets on this page
    pub fn range(&self) -> Range<usize> {
        self.start..(self.start + self.per_page).min(self.total)
    }

    /// Number of pages, at least one
    pub fn num_pages(&self) -> usize {
        ((self.total + self.per_page - 1) / self.per_page).max(1)
    }

    /// 1-based page number
    pub fn current_page(&self) -> usize {
        self.start / self.per_page + 1
    }

    /// Start of the previous page
    pub fn prev_start(&self) -> Option<usize> {
        self.start.checked_sub(self.per_page)
    }

    /// Start of the next page
    pub fn next_start(&self) -> Option<usize> {
        let next = self.start + self.per_page;
        (next < self.total).then_some(next)
    }

    /// Counter shown next to the first item (1-based)
    pub fn first_counter(&self) -> usize {
        self.start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligns_and_clamps() {
        let page = PageIndex::new(95, 30, 47);
        assert_eq!(page.start, 30);
        assert_eq!(page.range(), 30..60);
        assert_eq!(page.current_page(), 2);

        let page = PageIndex::new(95, 30, 1_000);
        assert_eq!(page.start, 90);
        assert_eq!(page.range(), 90..95);
        assert_eq!(page.next_start(), None);
        assert_eq!(page.prev_start(), Some(60));
        assert_eq!(page.num_pages(), 4);
    }

    #[test]
    fn test_empty_list() {
        let page = PageIndex::new(0, 30, 60);
        assert_eq!(page.start, 0);
        assert!(page.range().is_empty());
        assert_eq!(page.num_pages(), 1);
        assert_eq!(page.first_counter(), 1);
    }

    #[test]
    fn test_zero_page_size_treated_as_one() {
        let page = PageIndex::new(3, 0, 2);
        assert_eq!(page.range(), 2..3);
    }
}
