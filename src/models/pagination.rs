use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Page-number pagination: `?page=` (1-based) and `?page_size=`
/// (default 10, capped at 100).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    pub fn envelope(&self, count: i64, results: Value) -> Value {
        json!({
            "count": count,
            "page": self.page(),
            "page_size": self.limit(),
            "results": results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let q = PageQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 10);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn page_size_is_clamped() {
        let q = PageQuery { page: Some(3), page_size: Some(500) };
        assert_eq!(q.limit(), 100);
        assert_eq!(q.offset(), 200);

        let q = PageQuery { page: Some(0), page_size: Some(0) };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 1);
    }
}
