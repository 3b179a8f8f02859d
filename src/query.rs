//! Search-and-paginate pipeline over fully materialized record lists.
//!
//! Collections are small enough to fetch whole, so filtering and slicing happen in memory.
//! [`paginate`] is pure: the same records, term, and page always produce the same page.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Schema-less document as stored in the document database.
pub type Record = Map<String, Value>;

/// Errors raised while validating pagination input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A pagination parameter was missing a usable value.
    #[error("{0}")]
    InvalidArgument(String),
}

/// Filtered, sliced view of a collection plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    /// Records on the requested page, in input order.
    pub results: Vec<Record>,
    /// Number of records that matched the search term.
    pub total_results: usize,
    /// `ceil(total_results / page_size)`.
    pub total_pages: usize,
}

/// Validated page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    /// Optional substring filter.
    pub search_term: Option<String>,
    /// One-based page index.
    pub page: usize,
    /// Number of records per page.
    pub page_size: usize,
}

impl PageParams {
    /// Parse raw query-string values.
    ///
    /// Absent values fall back to page 1 and `default_page_size`. Values that are not positive
    /// integers are rejected. Page sizes above `max_page_size` are clamped. An empty search term
    /// is dropped; any other term is kept verbatim, surrounding whitespace included.
    pub fn parse(
        search_term: Option<String>,
        page: Option<&str>,
        page_size: Option<&str>,
        default_page_size: usize,
        max_page_size: usize,
    ) -> Result<Self, QueryError> {
        let page = parse_positive("page", page, 1)?;
        let page_size = parse_positive("page_size", page_size, default_page_size)?;
        Ok(Self {
            search_term: search_term.filter(|term| !term.is_empty()),
            page,
            page_size: page_size.min(max_page_size.max(1)),
        })
    }
}

fn parse_positive(name: &str, raw: Option<&str>, default: usize) -> Result<usize, QueryError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(QueryError::InvalidArgument(format!(
            "{name} must be an integer greater than or equal to 1"
        ))),
    }
}

/// Read a field as a string, falling back to `default` when it is missing or not scalar.
///
/// Dotted keys descend into nested maps (`address.city`). Numbers and booleans are rendered
/// with their JSON representation.
pub fn get_string(record: &Record, key: &str, default: &str) -> String {
    let mut segments = key.split('.');
    let Some(first) = segments.next() else {
        return default.to_string();
    };
    let mut current = record.get(first);
    for segment in segments {
        current = current.and_then(|value| value.as_object()?.get(segment));
    }

    match current {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => default.to_string(),
    }
}

/// Build a selector reading `key` with an empty-string default.
pub fn field_selector(key: impl Into<String>) -> impl Fn(&Record) -> String + Send + Sync {
    let key = key.into();
    move |record| get_string(record, &key, "")
}

/// Filter `records` by a case-insensitive substring match and return the requested page.
///
/// A record matches when the lower-cased term occurs in the output of at least one selector.
/// An absent or empty term keeps every record. The term is not trimmed. Pages beyond the last one come back empty.
pub fn paginate<F>(
    records: Vec<Record>,
    search_term: Option<&str>,
    field_selectors: &[F],
    page: usize,
    page_size: usize,
) -> Result<PageResult, QueryError>
where
    F: Fn(&Record) -> String,
{
    if page < 1 {
        return Err(QueryError::InvalidArgument(
            "page must be greater than or equal to 1".into(),
        ));
    }
    if page_size < 1 {
        return Err(QueryError::InvalidArgument(
            "page_size must be greater than or equal to 1".into(),
        ));
    }

    let needle = search_term
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    let filtered: Vec<Record> = match needle {
        Some(needle) => records
            .into_iter()
            .filter(|record| {
                field_selectors
                    .iter()
                    .any(|select| select(record).to_lowercase().contains(&needle))
            })
            .collect(),
        None => records,
    };

    let total_results = filtered.len();
    let total_pages = total_results.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size);

    let results = filtered
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();

    Ok(PageResult {
        results,
        total_results,
        total_pages,
    })
}
