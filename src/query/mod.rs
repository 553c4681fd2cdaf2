pub mod expr;
pub mod filter;

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::db::{self, Recipe};
use crate::error::QueryError;
use filter::{Filter, NumericField, Predicate, TextField};

pub const MAX_LIMIT: usize = 100;

/// Raw filter strings exactly as the caller received them.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub title: Option<String>,
    pub cuisine: Option<String>,
    pub total_time: Option<String>,
    pub rating: Option<String>,
    pub calories: Option<String>,
}

impl SearchParams {
    /// Fields whose text is empty or doesn't parse are left unfiltered.
    pub fn predicate(&self) -> Predicate {
        let text = |field, raw: &Option<String>| raw.as_deref().and_then(|s| Filter::text(field, s));
        let numeric =
            |field, raw: &Option<String>| raw.as_deref().and_then(|s| Filter::numeric(field, s));

        Predicate::all()
            .and(text(TextField::Title, &self.title))
            .and(text(TextField::Cuisine, &self.cuisine))
            .and(numeric(NumericField::TotalTime, &self.total_time))
            .and(numeric(NumericField::Rating, &self.rating))
            .and(numeric(NumericField::Calories, &self.calories))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    limit: usize,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Result<Self, QueryError> {
        if page < 1 {
            return Err(QueryError::InvalidPage(page));
        }
        if limit < 1 || limit > MAX_LIMIT as i64 {
            return Err(QueryError::InvalidLimit {
                got: limit,
                max: MAX_LIMIT,
            });
        }
        Ok(Pagination {
            page: usize::try_from(page).unwrap_or(usize::MAX),
            limit: limit as usize,
        })
    }

    pub fn offset(&self) -> usize {
        (self.page - 1)
            .saturating_mul(self.limit)
            .min(i64::MAX as usize)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub data: Vec<Recipe>,
}

/// Unfiltered listing in catalog order.
pub fn list(conn: &Connection, pagination: Pagination) -> Result<PageResult, QueryError> {
    run(conn, &Predicate::all(), pagination)
}

pub fn search(
    conn: &Connection,
    params: &SearchParams,
    pagination: Pagination,
) -> Result<PageResult, QueryError> {
    run(conn, &params.predicate(), pagination)
}

// Count and fetch are separate reads: under concurrent writes `total` may not
// match the window exactly.
fn run(
    conn: &Connection,
    predicate: &Predicate,
    pagination: Pagination,
) -> Result<PageResult, QueryError> {
    let total = db::count(conn, predicate)?;
    let data = db::fetch_page(conn, predicate, pagination.offset(), pagination.limit)?;
    debug!(
        filters = predicate.filters().len(),
        total,
        returned = data.len(),
        page = pagination.page,
        "search"
    );
    Ok(PageResult {
        page: pagination.page,
        limit: pagination.limit,
        total,
        total_pages: total.div_ceil(pagination.limit),
        data,
    })
}
