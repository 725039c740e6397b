use serde::{Deserialize, Serialize};

use super::{error::Error, form::Form};
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Requested window: 1-based `page` of `limit` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn from_form(form: &Form) -> Result<Self, Error> {
        let page = form.get_number::<i64>("page")?.unwrap_or(1).max(1);
        let limit = form
            .get_number::<i64>("limit")?
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        if page.checked_mul(limit).is_none() {
            return Err(Error::field("page", "Invalid page."));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, pagination: Pagination) -> Self {
        if rows.is_empty() {
            return Self::no_rows(pagination);
        }

        let page_count = (total_rows + pagination.limit - 1) / pagination.limit;
        let next = (pagination.page < page_count).then_some(pagination.page + 1);
        let previous = (pagination.page > 1).then_some(pagination.page - 1);

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn no_rows(pagination: Pagination) -> Self {
        Self {
            count: 0,
            next: None,
            previous: (pagination.page > 1).then_some(pagination.page - 1),
            results: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_query() {
        let pagination = Pagination::from_form(&Form::default()).unwrap();
        assert_eq!(pagination, Pagination::default());
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn limit_is_capped_and_page_clamped() {
        let form = Form::from_query("page=0&limit=1000").unwrap();
        let pagination = Pagination::from_form(&form).unwrap();

        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn page_too_large_for_an_offset_is_rejected() {
        let form = Form::from_query("page=9223372036854775807&limit=100").unwrap();
        let error = Pagination::from_form(&form).unwrap_err();

        assert_eq!(error.code(), 400);
        assert!(error.fields().unwrap().contains_key("page"));

        let form = Form::from_query("page=92233720368547758&limit=100").unwrap();
        let pagination = Pagination::from_form(&form).unwrap();
        assert_eq!(pagination.offset(), 9_223_372_036_854_775_700);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let pagination = Pagination { page: 2, limit: 6 };
        let page = PageContext::from_rows(vec![1, 2, 3, 4, 5, 6], 15, pagination);

        assert_eq!(pagination.offset(), 6);
        assert_eq!(page.count, 15);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PageContext::from_rows(vec![1, 2, 3], 15, Pagination { page: 3, limit: 6 });
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));

        let page = PageContext::from_rows(vec![1, 2], 2, Pagination::default());
        assert_eq!(page.next, None);
        assert_eq!(page.previous, None);
    }

    #[test]
    fn empty_page_reports_no_rows() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, Pagination::default());
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }
}
