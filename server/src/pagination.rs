use serde::{Deserialize, Serialize};

/// `?page=&limit=` query parameters shared by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A resolved page: 1-based page number, clamped limit, and row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
    pub offset: u32,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u32, max_limit: u32) -> Page {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        Page {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl PageInfo {
    pub fn new(page: Page, total: i64) -> Self {
        let limit = i64::from(page.limit);
        Self {
            page: page.page,
            limit: page.limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_clamps_and_offsets() {
        let q = PageQuery {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(
            q.resolve(20, 100),
            Page {
                page: 3,
                limit: 100,
                offset: 200
            }
        );
        assert_eq!(PageQuery::default().resolve(20, 100).offset, 0);
        assert_eq!(PageInfo::new(PageQuery::default().resolve(20, 100), 41).pages, 3);
    }
}
