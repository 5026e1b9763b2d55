//! Page/limit parsing shared by the list endpoints.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PaginationConfig;

/// Raw list query parameters.
///
/// Kept as strings so non-numeric input is reported as a validation error
/// rather than silently coerced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    /// Case-insensitive substring filter on `name`
    pub name: Option<String>,
}

impl ListQuery {
    pub fn window(&self, config: &PaginationConfig) -> Result<PageWindow, PaginationError> {
        PageWindow::parse(self.page.as_deref(), self.limit.as_deref(), config)
    }

    /// The name filter, ignoring blank values
    pub fn name_filter(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("{field} must be an integer")]
    NotANumber { field: &'static str },
}

impl PaginationError {
    pub fn field(&self) -> &'static str {
        match self {
            PaginationError::NotANumber { field } => field,
        }
    }
}

/// A validated page window: `page >= 1`, `1 <= limit <= max_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
}

impl PageWindow {
    pub fn parse(
        page: Option<&str>,
        limit: Option<&str>,
        config: &PaginationConfig,
    ) -> Result<Self, PaginationError> {
        let page = parse_param(page, "page")?.unwrap_or(1).max(1);
        let max_limit = config.max_limit.max(1);
        let limit = parse_param(limit, "limit")?
            .unwrap_or(config.default_limit)
            .clamp(1, max_limit);

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_param(value: Option<&str>, field: &'static str) -> Result<Option<i64>, PaginationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<i64>()
            .map(Some)
            .map_err(|_| PaginationError::NotANumber { field }),
    }
}

/// Paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, window: PageWindow) -> Self {
        Self {
            data,
            total,
            page: window.page,
            limit: window.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig::default()
    }

    #[test]
    fn test_defaults() {
        let window = PageWindow::parse(None, None, &config()).unwrap();
        assert_eq!(window, PageWindow { page: 1, limit: 10 });
        assert_eq!(window.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let window = PageWindow::parse(Some("2"), Some("5"), &config()).unwrap();
        assert_eq!(window.offset(), 5);
    }

    #[test]
    fn test_clamping() {
        let window = PageWindow::parse(Some("-3"), Some("0"), &config()).unwrap();
        assert_eq!(window, PageWindow { page: 1, limit: 1 });

        let window = PageWindow::parse(Some("1"), Some("5000"), &config()).unwrap();
        assert_eq!(window.limit, 100);
    }

    #[test]
    fn test_blank_uses_default() {
        let window = PageWindow::parse(Some(""), Some(" "), &config()).unwrap();
        assert_eq!(window, PageWindow { page: 1, limit: 10 });
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = PageWindow::parse(Some("two"), None, &config()).unwrap_err();
        assert_eq!(err.field(), "page");

        let err = PageWindow::parse(None, Some("1.5"), &config()).unwrap_err();
        assert_eq!(err, PaginationError::NotANumber { field: "limit" });
    }

    #[test]
    fn test_name_filter_ignores_blank() {
        let query = ListQuery {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.name_filter(), None);

        let query = ListQuery {
            name: Some(" Phone ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.name_filter(), Some("Phone"));
    }
}
