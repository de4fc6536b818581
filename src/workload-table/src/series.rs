//! Lookup helpers over query results keyed by refId.
//!
//! Every helper is a linear scan. Result sets are bounded by the page size,
//! so no index is kept.

use std::collections::BTreeMap;

/// Results of one query batch: refId -> result rows of that query.
pub type SecondaryResults = BTreeMap<String, Vec<SeriesResult>>;

/// One row of a table-formatted query result.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesResult {
    /// refId of the query that produced this row
    pub ref_id: String,
    /// Label name-value pairs of the series
    pub labels: BTreeMap<String, String>,
    /// Sample value, `None` when the datasource sent something unparsable
    pub value: Option<f64>,
}

impl SeriesResult {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            labels: BTreeMap::new(),
            value: None,
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(|s| s.as_str())
    }

    /// Field access in table-format naming: `Value #<refId>` is the sample
    /// value, any other name is a label.
    pub fn field(&self, name: &str) -> Option<String> {
        if name == value_field(&self.ref_id) {
            self.value.map(|v| v.to_string())
        } else {
            self.label(name).map(str::to_string)
        }
    }
}

/// Name of the value column of a table-formatted result.
pub fn value_field(ref_id: &str) -> String {
    format!("Value #{ref_id}")
}

/// Predicate matching series whose `label` equals `value`.
pub fn label_equals<'a>(label: &'a str, value: &'a str) -> impl Fn(&SeriesResult) -> bool + 'a {
    move |series| series.label(label) == Some(value)
}

pub fn find_one<'a, P>(cache: &'a SecondaryResults, ref_id: &str, pred: P) -> Option<&'a SeriesResult>
where
    P: Fn(&SeriesResult) -> bool,
{
    cache.get(ref_id)?.iter().find(|series| pred(*series))
}

pub fn find_all<'a, P>(cache: &'a SecondaryResults, ref_id: &str, pred: P) -> Vec<&'a SeriesResult>
where
    P: Fn(&SeriesResult) -> bool,
{
    cache
        .get(ref_id)
        .map(|rows| rows.iter().filter(|series| pred(*series)).collect())
        .unwrap_or_default()
}

/// Sample value of the first matching series.
///
/// A miss and a present-but-unparsable sample are both `None`; callers pick
/// their own default.
pub fn value_of<P>(cache: &SecondaryResults, ref_id: &str, pred: P) -> Option<f64>
where
    P: Fn(&SeriesResult) -> bool,
{
    find_one(cache, ref_id, pred)?.value
}

/// Label of the first matching series.
pub fn label_of<'a, P>(
    cache: &'a SecondaryResults,
    ref_id: &str,
    pred: P,
    label: &str,
) -> Option<&'a str>
where
    P: Fn(&SeriesResult) -> bool,
{
    find_one(cache, ref_id, pred)?.label(label)
}
