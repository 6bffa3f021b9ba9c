//! Structured `$filter`/`$select`/`$expand`/`$orderby` construction.
//!
//! Field names are `&'static str` so only column names compiled into the
//! client can reach the query text. Values are bound as typed literals and
//! rendered by a single encoder; callers never splice raw strings into a
//! filter expression.

use std::fmt;

use shared::domain::{BoxId, PipelineId};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

impl FilterValue {
    fn write_literal(&self, out: &mut String) {
        match self {
            FilterValue::Int(value) => out.push_str(&value.to_string()),
            FilterValue::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
            FilterValue::Text(value) => {
                out.push('\'');
                for ch in value.chars() {
                    if ch == '\'' {
                        out.push_str("''");
                    } else {
                        out.push(ch);
                    }
                }
                out.push('\'');
            }
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<PipelineId> for FilterValue {
    fn from(value: PipelineId) -> Self {
        FilterValue::Int(value.0)
    }
}

impl From<BoxId> for FilterValue {
    fn from(value: BoxId) -> Self {
        FilterValue::Int(value.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn keyword(self) -> &'static str {
        match self {
            Comparison::Eq => "eq",
            Comparison::Ne => "ne",
            Comparison::Lt => "lt",
            Comparison::Le => "le",
            Comparison::Gt => "gt",
            Comparison::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        field: &'static str,
        op: Comparison,
        value: FilterValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn compare(field: &'static str, op: Comparison, value: impl Into<FilterValue>) -> Self {
        Filter::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &'static str, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    fn write(&self, out: &mut String, nested: bool) {
        match self {
            Filter::Compare { field, op, value } => {
                out.push_str(field);
                out.push(' ');
                out.push_str(op.keyword());
                out.push(' ');
                value.write_literal(out);
            }
            Filter::And(parts) => Self::write_group(parts, " and ", out, nested),
            Filter::Or(parts) => Self::write_group(parts, " or ", out, nested),
        }
    }

    fn write_group(parts: &[Filter], joiner: &str, out: &mut String, nested: bool) {
        let wrap = nested && parts.len() > 1;
        if wrap {
            out.push('(');
        }
        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                out.push_str(joiner);
            }
            part.write(out, true);
        }
        if wrap {
            out.push(')');
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out, false);
        f.write_str(&out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: &'static str) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: &'static str) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    select: Vec<&'static str>,
    filter: Option<Filter>,
    expand: Vec<&'static str>,
    order_by: Vec<OrderBy>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, fields: &[&'static str]) -> Self {
        self.select.extend_from_slice(fields);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn expand(mut self, field: &'static str) -> Self {
        self.expand.push(field);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Query-string pairs in a stable order. Percent-encoding is left to the
    /// HTTP client.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.to_string()));
        }
        if !self.expand.is_empty() {
            pairs.push(("$expand", self.expand.join(",")));
        }
        if !self.order_by.is_empty() {
            let rendered = self
                .order_by
                .iter()
                .map(|order| {
                    if order.descending {
                        format!("{} desc", order.field)
                    } else {
                        order.field.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("$orderby", rendered));
        }
        pairs
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
