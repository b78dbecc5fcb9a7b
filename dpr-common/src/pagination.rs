//! Pagination over filtered and ranked result lists

use serde::Serialize;

/// Patterns shown per page in the exploration view
pub const EXPLORE_PAGE_SIZE: usize = 20;

/// Recommendations shown per page after a quiz
pub const RECOMMENDATION_PAGE_SIZE: usize = 18;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Index of the first entry on the page
    pub offset: usize,
}

impl Pagination {
    /// Calculate pagination from total results and the requested page
    ///
    /// The page is clamped to `[1, total_pages]`.
    ///
    /// # Examples
    /// ```
    /// use dpr_common::pagination::Pagination;
    ///
    /// // 45 results at 20 per page = 3 pages (20 + 20 + 5)
    /// let p = Pagination::new(45, 20, 2);
    /// assert_eq!(p.page, 2);
    /// assert_eq!(p.total_pages, 3);
    /// assert_eq!(p.offset, 20);
    ///
    /// // Requesting out-of-bounds page gets clamped
    /// let p = Pagination::new(45, 20, 99);
    /// assert_eq!(p.page, 3);
    /// assert_eq!(p.offset, 40);
    /// ```
    pub fn new(total_results: usize, page_size: usize, requested_page: usize) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_results.div_ceil(page_size);
        let page = requested_page.max(1).min(total_pages.max(1));
        Self {
            page,
            page_size,
            total_pages,
            offset: (page - 1) * page_size,
        }
    }

    /// The slice of `items` falling on this page
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = (self.offset + self.page_size).min(items.len());
        &items[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = Pagination::new(250, 100, 2);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = Pagination::new(150, 100, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = Pagination::new(0, EXPLORE_PAGE_SIZE, 1);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
        assert!(p.slice::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_slice_last_partial_page() {
        let items: Vec<usize> = (0..40).collect();
        let p = Pagination::new(items.len(), RECOMMENDATION_PAGE_SIZE, 3);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.slice(&items), &[36, 37, 38, 39]);
    }
}
