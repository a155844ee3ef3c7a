//! Query filters
//!
//! A [`SearchFilter`] is a list of `(field, op, value)` triples plus paging
//! controls. It renders to query parameters in two styles:
//!
//! - [`SearchFilter::query`]: `num__gte=3`
//! - [`SearchFilter::filter_query`]: `filter[num.gte]=3`
//!
//! `EQ` and `EXACT` use the bare field name in both. List values are joined
//! with commas.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters in a stable order.
pub type QueryParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    #[serde(rename = "equals")]
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    Exact,
    IExact,
    IContains,
    IStartsWith,
    Is,
    In,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "equals",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Contains => "contains",
            FilterOp::StartsWith => "startswith",
            FilterOp::Exact => "exact",
            FilterOp::IExact => "iexact",
            FilterOp::IContains => "icontains",
            FilterOp::IStartsWith => "istartswith",
            FilterOp::Is => "is",
            FilterOp::In => "in",
        }
    }

    /// Ops rendered with the bare field name
    fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq | FilterOp::Exact)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    fn rendered_value(&self) -> String {
        match &self.value {
            Value::Array(values) => values
                .iter()
                .map(render_scalar)
                .collect::<Vec<_>>()
                .join(","),
            other => render_scalar(other),
        }
    }
}

/// Filters plus paging controls for list endpoints.
///
/// # Examples
///
/// ```
/// use core_service::filter::{FilterOp, SearchFilter};
/// use serde_json::json;
///
/// let filter = SearchFilter::new()
///     .filter("owner_type", FilterOp::Eq, "User")
///     .filter("lst", FilterOp::In, json!([1, 2, 3]))
///     .with_limit(10);
///
/// let query = filter.query();
/// assert_eq!(query["owner_type"], "User");
/// assert_eq!(query["lst__in"], "1,2,3");
/// assert_eq!(query["limit"], "10");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub filters: Vec<FieldFilter>,
    pub fields: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::new(field, op, value));
        self
    }

    pub fn add_filter(&mut self, filter: FieldFilter) {
        self.filters.push(filter);
    }

    pub fn has_filter(&self, field: &str) -> bool {
        self.filters.iter().any(|f| f.field == field)
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Double-underscore style: `field__op=value`.
    pub fn query(&self) -> QueryParams {
        self.render(|filter| {
            if filter.op.is_equality() {
                filter.field.clone()
            } else {
                format!("{}__{}", filter.field, filter.op)
            }
        })
    }

    /// Bracket style: `filter[field.op]=value`.
    pub fn filter_query(&self) -> QueryParams {
        self.render(|filter| {
            if filter.op.is_equality() {
                format!("filter[{}]", filter.field)
            } else {
                format!("filter[{}.{}]", filter.field, filter.op)
            }
        })
    }

    fn render(&self, key: impl Fn(&FieldFilter) -> String) -> QueryParams {
        let mut query: QueryParams = self
            .filters
            .iter()
            .map(|filter| (key(filter), filter.rendered_value()))
            .collect();

        if !self.fields.is_empty() {
            query.insert("fields".to_string(), self.fields.join(","));
        }
        let controls = [
            ("limit", self.limit),
            ("offset", self.offset),
            ("page", self.page),
            ("size", self.size),
        ];
        for (name, value) in controls {
            if let Some(value) = value {
                query.insert(name.to_string(), value.to_string());
            }
        }
        query
    }
}

/// Query-string rendering of a JSON value: strings unquoted, containers
/// as compact JSON.
pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SearchFilter {
        SearchFilter::new()
            .filter("owner_type", FilterOp::Eq, "User")
            .filter("num", FilterOp::Gte, 3)
            .filter("lst", FilterOp::In, json!([1, 2, 3]))
    }

    #[test]
    fn test_double_underscore_query() {
        let query = sample().query();
        assert_eq!(query.len(), 3);
        assert_eq!(query["owner_type"], "User");
        assert_eq!(query["num__gte"], "3");
        assert_eq!(query["lst__in"], "1,2,3");
    }

    #[test]
    fn test_bracket_query() {
        let query = sample().filter_query();
        assert_eq!(query.len(), 3);
        assert_eq!(query["filter[owner_type]"], "User");
        assert_eq!(query["filter[num.gte]"], "3");
        assert_eq!(query["filter[lst.in]"], "1,2,3");
    }

    #[test]
    fn test_exact_uses_bare_field() {
        let filter = SearchFilter::new().filter("name", FilterOp::Exact, "abc");
        assert_eq!(filter.query()["name"], "abc");
        assert_eq!(filter.filter_query()["filter[name]"], "abc");
    }

    #[test]
    fn test_paging_controls_appended() {
        let query = SearchFilter::new()
            .with_fields(["id", "name"])
            .with_limit(20)
            .with_offset(40)
            .filter_query();
        assert_eq!(query["fields"], "id,name");
        assert_eq!(query["limit"], "20");
        assert_eq!(query["offset"], "40");
        assert!(!query.contains_key("page"));
        assert!(!query.contains_key("size"));
    }

    #[test]
    fn test_has_filter() {
        let mut filter = sample();
        assert!(filter.has_filter("num"));
        assert!(!filter.has_filter("missing"));

        filter.add_filter(FieldFilter::new("missing", FilterOp::IContains, "x"));
        assert!(filter.has_filter("missing"));
        assert_eq!(filter.query()["missing__icontains"], "x");
    }
}
