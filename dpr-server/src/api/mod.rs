//! HTTP API handlers for dpr-server

pub mod explore;
pub mod health;
pub mod quiz;
pub mod saved;

use serde::Serialize;

pub use explore::explore_routes;
pub use health::health_routes;
pub use quiz::quiz_routes;
pub use saved::saved_routes;

fn default_page() -> usize {
    1
}

/// Page metadata shared by paginated responses
#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub total_results: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl From<(usize, dpr_common::pagination::Pagination)> for PageInfo {
    fn from((total_results, p): (usize, dpr_common::pagination::Pagination)) -> Self {
        Self {
            total_results,
            page: p.page,
            page_size: p.page_size,
            total_pages: p.total_pages,
        }
    }
}
