//! Filter/selection expressions for REST collection reads.
//!
//! Parameters are appended in insertion order and encoded by `url`, so
//! `Query::new().eq("skill_id", "abc").select("id")` becomes
//! `skill_id=eq.abc&select=id`.

use std::fmt::Display;

use url::Url;

/// An ordered list of query parameters for a collection request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return (`select=a,b` or `select=*`).
    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns)
    }

    /// Equality filter, encoded as `column=eq.value`.
    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.param(column, format!("eq.{value}"))
    }

    /// Sort order, e.g. `subject_code,skill_code`.
    pub fn order(self, columns: &str) -> Self {
        self.param("order", columns)
    }

    pub fn limit(self, n: usize) -> Self {
        self.param("limit", n.to_string())
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Append the parameters to `url`'s query string.
    pub(crate) fn apply(&self, url: &mut Url) {
        if self.params.is_empty() {
            return;
        }
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &self.params {
            pairs.append_pair(key, value);
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        f.write_str(&encoded)
    }
}
