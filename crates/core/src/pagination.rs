//! Page-number pagination for admin listings.

use serde::Serialize;

/// Default page size.
pub const DEFAULT_LIMIT: u64 = 10;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u64 = 100;

/// Pagination metadata returned alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number.
    pub current_page: u64,
    /// Number of pages (0 when there are no items).
    pub total_pages: u64,
    /// Page size.
    pub limit: u64,
    /// Total number of matching items.
    pub total: u64,
}

impl Pagination {
    /// Normalize a requested page and limit: page >= 1, 1 <= limit <= [`MAX_LIMIT`].
    #[must_use]
    pub fn normalize(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (page, limit)
    }

    /// Row offset of `page`.
    #[must_use]
    pub const fn offset(page: u64, limit: u64) -> u64 {
        (page - 1) * limit
    }

    /// Build metadata for a page of `total` items.
    #[must_use]
    pub const fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            current_page: page,
            total_pages: total.div_ceil(limit),
            limit,
            total,
        }
    }
}

/// A page of items.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Page metadata.
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_clamps() {
        assert_eq!(Pagination::normalize(None, None), (1, DEFAULT_LIMIT));
        assert_eq!(Pagination::normalize(Some(0), Some(0)), (1, 1));
        assert_eq!(Pagination::normalize(Some(3), Some(1000)), (3, MAX_LIMIT));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(2, 10, 11).total_pages, 2);
        assert_eq!(Pagination::offset(3, 10), 20);
    }
}
