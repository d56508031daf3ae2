use crate::errors::{AppError, AppResult};

pub const SORT_DIRECTION_TOKENS: &[&str] = &["asc", "desc", "ascending", "descending", "1", "-1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    CompletedAt,
    Sequence,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::CompletedAt => "completed_at",
            Self::Sequence => "sequence",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created_at" => Some(Self::CreatedAt),
            "completed_at" => Some(Self::CompletedAt),
            "sequence" => Some(Self::Sequence),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" | "ascending" | "1" => Some(Self::Ascending),
            "desc" | "descending" | "-1" => Some(Self::Descending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub per_page: i64,
    pub page: i64,
}

impl PageWindow {
    pub fn offset(self) -> i64 {
        // page >= 1 is enforced at parse time; the multiply saturates so an
        // absurd window can never panic or wrap to a negative OFFSET.
        self.per_page.saturating_mul(self.page - 1)
    }

    pub fn limit(self) -> i64 {
        self.per_page
    }

    pub fn page_count(self, total_count: i64) -> i64 {
        if total_count == 0 {
            0
        } else {
            (total_count + self.per_page - 1) / self.per_page
        }
    }

    pub fn is_last_page(self, total_count: i64) -> bool {
        total_count == 0 || self.page == self.page_count(total_count)
    }
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub window: PageWindow,
    // Field order matters for multi-field sorts, so directives keep the
    // order they were supplied in.
    pub sort: Vec<(SortField, SortDirection)>,
}

impl QueryPlan {
    pub fn order_by_clause(&self) -> String {
        self.sort
            .iter()
            .map(|(field, direction)| format!("{} {}", field.column(), direction.sql_keyword()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Builds a query plan from raw query parameters. `perPage` and `page` are
/// required positive integers; sort directives are collected in supplied
/// order; unrecognized keys are ignored.
pub fn plan_query(raw: &[(String, String)], max_per_page: i64) -> AppResult<QueryPlan> {
    let mut per_page = None;
    let mut page = None;
    let mut sort = Vec::new();

    for (key, value) in raw {
        match key.as_str() {
            "perPage" => per_page = Some(parse_positive("perPage", value)?),
            "page" => page = Some(parse_positive("page", value)?),
            other => {
                if let Some(field) = SortField::parse(other) {
                    let direction = SortDirection::parse(value).ok_or_else(|| {
                        AppError::Validation(format!(
                            "Sort direction '{}' for '{}' must be one of: {}.",
                            value,
                            other,
                            SORT_DIRECTION_TOKENS.join(", ")
                        ))
                    })?;
                    sort.push((field, direction));
                }
            }
        }
    }

    let per_page = per_page
        .ok_or_else(|| AppError::Validation("'perPage' query parameter is required".to_string()))?;
    let page = page
        .ok_or_else(|| AppError::Validation("'page' query parameter is required".to_string()))?;
    if per_page > max_per_page {
        return Err(AppError::Validation(format!(
            "'perPage' may not exceed {}",
            max_per_page
        )));
    }
    if per_page.checked_mul(page - 1).is_none() {
        return Err(AppError::Validation("'page' is out of range".to_string()));
    }

    if sort.is_empty() {
        sort.push((SortField::CreatedAt, SortDirection::Ascending));
    }

    Ok(QueryPlan {
        window: PageWindow { per_page, page },
        sort,
    })
}

fn parse_positive(name: &str, raw: &str) -> AppResult<i64> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("'{}' must be a positive integer", name)))?;
    if value < 1 {
        return Err(AppError::Validation(format!(
            "'{}' must be a positive integer",
            name
        )));
    }
    Ok(value)
}
