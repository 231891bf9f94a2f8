//! Page/page_size query handling and the response headers that go with it.

use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::domain::errors::ApiError;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    pub fn resolve(params: &PageParams, default_page_size: i64) -> Result<Self, ApiError> {
        let page = params.page.unwrap_or(1);
        let page_size = params.page_size.unwrap_or(default_page_size);

        if page < 1 {
            return Err(ApiError::Validation(
                "page must be greater than or equal to 1".to_string(),
            ));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(ApiError::Validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(Pagination { page, page_size })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// X-Total-Count / X-Total-Pages / X-Current-Page / X-Page-Size.
    pub fn headers(&self, total: i64) -> HeaderMap {
        let total_pages = if total == 0 {
            0
        } else {
            (total + self.page_size - 1) / self.page_size
        };

        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("x-total-count", total),
            ("x-total-pages", total_pages),
            ("x-current-page", self.page),
            ("x-page-size", self.page_size),
        ] {
            if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let pagination = Pagination::resolve(&PageParams::default(), 50).unwrap();
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.page_size, 50);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let params = PageParams {
            page: Some(0),
            page_size: None,
        };
        assert!(Pagination::resolve(&params, 50).is_err());

        let params = PageParams {
            page: None,
            page_size: Some(101),
        };
        assert!(Pagination::resolve(&params, 50).is_err());
    }

    #[test]
    fn test_headers_round_total_pages_up() {
        let pagination = Pagination {
            page: 2,
            page_size: 10,
        };
        let headers = pagination.headers(25);
        assert_eq!(headers.get("x-total-count").unwrap(), "25");
        assert_eq!(headers.get("x-total-pages").unwrap(), "3");
        assert_eq!(headers.get("x-current-page").unwrap(), "2");
        assert_eq!(headers.get("x-page-size").unwrap(), "10");
    }
}
