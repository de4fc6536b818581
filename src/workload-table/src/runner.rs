//! Query execution against Prometheus-compatible datasources.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;

use common::config::Configuration;

use crate::error::QueryError;
use crate::orchestrator::FetchTicket;
use crate::query::QuerySpec;
use crate::series::{SecondaryResults, SeriesResult};
use crate::time_range::TimeRange;

/// Longest body excerpt carried in a [`QueryError::Status`].
const ERROR_BODY_LIMIT: usize = 256;

/// Reference to a configured datasource by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceRef {
    pub name: String,
}

impl DatasourceRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Executes a batch of queries and returns one result entry per refId.
///
/// Implementations impose no ordering between concurrent calls and never
/// retry; a failure is returned as-is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(
        &self,
        queries: &[QuerySpec],
        range: &TimeRange,
        datasource: &DatasourceRef,
    ) -> Result<SecondaryResults, QueryError>;
}

/// Execute the queries of a fetch ticket.
pub async fn run_fetch(
    runner: &dyn QueryRunner,
    ticket: &FetchTicket,
    range: &TimeRange,
) -> Result<SecondaryResults, QueryError> {
    runner.run(&ticket.queries, range, &ticket.datasource).await
}

/// [`QueryRunner`] over the Prometheus HTTP API.
#[derive(Debug, Clone)]
pub struct PrometheusRunner {
    http: reqwest::Client,
    datasources: HashMap<String, String>,
    step: Duration,
}

impl PrometheusRunner {
    pub fn new(
        http: reqwest::Client,
        datasources: HashMap<String, String>,
        step: Duration,
    ) -> Self {
        Self {
            http,
            datasources,
            step,
        }
    }

    pub fn from_config(config: &Configuration) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(config.query.timeout)
            .build()?;

        // A name declared twice resolves to its first entry.
        let registry = &config.datasources;
        let datasources = registry
            .sources
            .iter()
            .filter_map(|ds| {
                registry
                    .url_for(&ds.name)
                    .map(|url| (ds.name.clone(), url.trim_end_matches('/').to_string()))
            })
            .collect();

        Ok(Self::new(http, datasources, config.query.step))
    }

    fn base_url(&self, datasource: &DatasourceRef) -> Result<&str, QueryError> {
        self.datasources
            .get(&datasource.name)
            .map(|s| s.as_str())
            .ok_or_else(|| QueryError::UnknownDatasource(datasource.name.clone()))
    }

    async fn run_one(
        &self,
        base_url: &str,
        query: &QuerySpec,
        range: &TimeRange,
    ) -> Result<(String, Vec<SeriesResult>), QueryError> {
        let (path, params) = request_params(query, range, self.step);
        let url = format!("{base_url}{path}");

        tracing::trace!(ref_id = %query.ref_id, expr = %query.expr, "Executing query");
        let response = self.http.get(&url).query(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let rows = parse_prometheus_response(&query.ref_id, &body).map_err(|err| match err {
            QueryError::Decode { .. } if !status.is_success() => QueryError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            },
            other => other,
        })?;

        Ok((query.ref_id.clone(), rows))
    }
}

#[async_trait]
impl QueryRunner for PrometheusRunner {
    async fn run(
        &self,
        queries: &[QuerySpec],
        range: &TimeRange,
        datasource: &DatasourceRef,
    ) -> Result<SecondaryResults, QueryError> {
        let base_url = self.base_url(datasource)?;

        let results = try_join_all(queries.iter().map(|q| self.run_one(base_url, q, range))).await?;

        tracing::debug!(
            datasource = %datasource.name,
            queries = queries.len(),
            rows = results.iter().map(|(_, rows)| rows.len()).sum::<usize>(),
            "Query batch completed"
        );
        Ok(results.into_iter().collect())
    }
}

/// Endpoint path and query parameters for one query.
///
/// Instant queries are evaluated at the end of the range.
pub fn request_params(
    query: &QuerySpec,
    range: &TimeRange,
    step: Duration,
) -> (&'static str, Vec<(&'static str, String)>) {
    if query.instant {
        (
            "/api/v1/query",
            vec![
                ("query", query.expr.clone()),
                ("time", range.to_secs().to_string()),
            ],
        )
    } else {
        (
            "/api/v1/query_range",
            vec![
                ("query", query.expr.clone()),
                ("start", range.from_secs().to_string()),
                ("end", range.to_secs().to_string()),
                ("step", step.as_secs_f64().max(1.0).to_string()),
            ],
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    data: Option<ApiData>,
    error_type: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ApiData {
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
    Scalar((f64, String)),
    String((f64, String)),
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    values: Vec<(f64, String)>,
}

/// Turn a Prometheus HTTP API response body into table rows tagged with
/// `ref_id`. Matrix results keep the last sample of each series.
pub fn parse_prometheus_response(ref_id: &str, body: &str) -> Result<Vec<SeriesResult>, QueryError> {
    let response: ApiResponse = serde_json::from_str(body).map_err(|e| QueryError::Decode {
        ref_id: ref_id.to_string(),
        reason: e.to_string(),
    })?;

    if response.status != "success" {
        return Err(QueryError::Api {
            ref_id: ref_id.to_string(),
            error_type: response.error_type.unwrap_or_else(|| "unknown".to_string()),
            error: response.error.unwrap_or_default(),
        });
    }

    let data = response.data.ok_or_else(|| QueryError::Decode {
        ref_id: ref_id.to_string(),
        reason: "missing data".to_string(),
    })?;

    let row = |labels: BTreeMap<String, String>, value: Option<&str>| SeriesResult {
        ref_id: ref_id.to_string(),
        labels,
        value: value.and_then(|v| v.parse::<f64>().ok()),
    };

    let rows = match data {
        ApiData::Vector(samples) => samples
            .into_iter()
            .map(|s| row(s.metric, Some(&s.value.1)))
            .collect(),
        ApiData::Matrix(series) => series
            .into_iter()
            .map(|s| {
                let last = s.values.last().map(|(_, v)| v.as_str());
                row(s.metric, last)
            })
            .collect(),
        ApiData::Scalar((_, value)) => vec![row(BTreeMap::new(), Some(&value))],
        ApiData::String((_, value)) => {
            vec![row(BTreeMap::from([("value".to_string(), value)]), None)]
        }
    };

    Ok(rows)
}
