//! Query templates and the per-row query builder.

use crate::error::VariableError;
use crate::variables::VariableSet;

/// Template variable holding the alternation of visible identities.
pub const IDS_VARIABLE: &str = "ids";
/// Template variable holding a single row identity.
pub const IDENTITY_VARIABLE: &str = "identity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFormat {
    /// One result row per series, value in `Value #<refId>`
    Table,
    TimeSeries,
}

/// A concrete query ready to be sent to a datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub ref_id: String,
    pub expr: String,
    pub instant: bool,
    pub format: QueryFormat,
}

/// A query with `$variable` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTemplate {
    pub ref_id: &'static str,
    pub expr: &'static str,
    pub instant: bool,
}

impl QueryTemplate {
    pub const fn instant(ref_id: &'static str, expr: &'static str) -> Self {
        Self {
            ref_id,
            expr,
            instant: true,
        }
    }

    pub fn render(&self, variables: &VariableSet) -> Result<QuerySpec, VariableError> {
        Ok(QuerySpec {
            ref_id: self.ref_id.to_string(),
            expr: variables.interpolate(self.expr)?,
            instant: self.instant,
            format: QueryFormat::Table,
        })
    }
}

/// Escape `value` so that it matches literally inside a double-quoted
/// PromQL regex matcher.
pub fn regex_literal(value: &str) -> String {
    string_literal(&regex::escape(value))
}

/// Escape `value` for a double-quoted PromQL string.
pub fn string_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `id1|id2|...` in caller order, each identity matched literally.
pub fn identity_alternation(identities: &[String]) -> String {
    identities
        .iter()
        .map(|id| regex_literal(id))
        .collect::<Vec<_>>()
        .join("|")
}

/// Build the secondary queries for a batch of visible identities.
///
/// An empty batch yields no queries: a regex over nothing is either
/// match-all or match-none depending on the backend, and neither is wanted.
pub fn build_row_queries(
    templates: &[QueryTemplate],
    identities: &[String],
    variables: &VariableSet,
) -> Result<Vec<QuerySpec>, VariableError> {
    if identities.is_empty() {
        return Ok(Vec::new());
    }

    let scoped = variables.scoped(IDS_VARIABLE, identity_alternation(identities));
    templates.iter().map(|t| t.render(&scoped)).collect()
}

pub fn build_primary_query(
    template: &QueryTemplate,
    variables: &VariableSet,
) -> Result<QuerySpec, VariableError> {
    template.render(variables)
}
