//! Page/limit/skip arithmetic and the paginated list envelope.

use serde::Serialize;

/// Requested page window. `skip == (current_page - 1) * limit` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl Pagination {
    /// Build a window; zero page or limit is raised to 1.
    pub fn new(current_page: u64, limit: u64) -> Self {
        let current_page = current_page.max(1);
        let limit = limit.max(1);
        Self {
            current_page,
            limit,
            skip: (current_page - 1).saturating_mul(limit),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total_page: u64,
    pub current_page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl PaginationMeta {
    pub fn new(window: &Pagination, total: u64) -> Self {
        Self {
            total_page: total.div_ceil(window.limit),
            current_page: window.current_page,
            limit: window.limit,
            skip: window.skip,
        }
    }
}

/// Rows plus the metadata needed to page through them.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_invariant() {
        for page in 1..=5u64 {
            for limit in 1..=7u64 {
                let window = Pagination::new(page, limit);
                assert_eq!(window.skip, (page - 1) * limit);
            }
        }
    }

    #[test]
    fn test_zero_is_raised() {
        let window = Pagination::new(0, 0);
        assert_eq!(window.current_page, 1);
        assert_eq!(window.limit, 1);
        assert_eq!(window.skip, 0);
    }

    #[test]
    fn test_total_page() {
        let window = Pagination::new(2, 10);
        assert_eq!(PaginationMeta::new(&window, 0).total_page, 0);
        assert_eq!(PaginationMeta::new(&window, 10).total_page, 1);
        assert_eq!(PaginationMeta::new(&window, 11).total_page, 2);

        let json = serde_json::to_value(PaginationMeta::new(&window, 25)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "totalPage": 3, "currentPage": 2, "limit": 10, "skip": 10 })
        );
    }
}
