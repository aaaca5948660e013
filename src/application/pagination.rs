//! Offset pagination for the jobs list endpoint. The store's cursor-based
//! pagination is unnecessary here: the spec calls for plain
//! `page`/`page_size` query parameters with a hard upper bound.

use crate::application::error::AppError;

pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub page_size: i64,
}

impl PageParams {
    pub fn validate(page: i64, page_size: i64) -> Result<Self, AppError> {
        if page < 1 {
            return Err(AppError::validation("page must be >= 1"));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::validation("page_size must be <= 100"));
        }
        Ok(Self { page, page_size })
    }
}
