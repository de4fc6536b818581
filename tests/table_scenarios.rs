//! End-to-end table scenarios driven through a fake query runner.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use workload_table::variables::{CLUSTER_VARIABLE, DATASOURCE_VARIABLE};
use workload_table::{
    DatasourceRef, FetchOutcome, QueryError, QueryRunner, QuerySpec, SecondaryResults,
    SeriesResult, TableOrchestrator, TablePhase, TimeRange, Variable, VariableKind, VariableSet,
    WorkloadSpec, run_fetch,
};
use workload_table::{ColumnSource, ColumnSpec, PrimaryRow};

/// Answers each refId with one series per known workload named in the
/// query's `daemonset=~"..."` matcher.
struct FakeRunner {
    values: HashMap<&'static str, Vec<(&'static str, f64)>>,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeRunner {
    fn daemon_sets() -> Self {
        Self {
            values: HashMap::from([
                ("replicas", vec![("a", 5.0), ("b", 2.0), ("c", 1.0)]),
                ("replicas_ready", vec![("a", 3.0), ("b", 2.0), ("c", 0.0)]),
            ]),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::daemon_sets()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryRunner for FakeRunner {
    async fn run(
        &self,
        queries: &[QuerySpec],
        _range: &TimeRange,
        _datasource: &DatasourceRef,
    ) -> Result<SecondaryResults, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(QueryError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }

        Ok(queries
            .iter()
            .map(|query| {
                let requested = requested_identities(&query.expr);
                let series = self
                    .values
                    .get(query.ref_id.as_str())
                    .into_iter()
                    .flatten()
                    .filter(|(id, _)| requested.contains(id))
                    .map(|(id, value)| {
                        SeriesResult::new(query.ref_id.clone())
                            .with_label("daemonset", *id)
                            .with_value(*value)
                    })
                    .collect();
                (query.ref_id.clone(), series)
            })
            .collect())
    }
}

fn requested_identities(expr: &str) -> Vec<&str> {
    expr.split_once(r#"daemonset=~""#)
        .and_then(|(_, rest)| rest.split_once('"'))
        .map(|(alternation, _)| alternation.split('|').collect())
        .unwrap_or_default()
}

fn vars() -> VariableSet {
    VariableSet::new()
        .with(Variable::new(
            DATASOURCE_VARIABLE,
            "Datasource",
            VariableKind::Query,
            "prometheus",
        ))
        .with(Variable::new(
            CLUSTER_VARIABLE,
            "Cluster",
            VariableKind::Query,
            "prod",
        ))
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn table() -> TableOrchestrator {
    let rows = ["a", "b", "c"]
        .into_iter()
        .map(|identity| PrimaryRow {
            cluster: "prod".to_string(),
            identity: identity.to_string(),
            namespace: "kube-system".to_string(),
        })
        .collect();
    let mut table = TableOrchestrator::new(Arc::new(WorkloadSpec::daemon_sets()));
    table.set_primary(rows);
    table
}

fn range() -> TimeRange {
    TimeRange::last(Duration::from_secs(300))
}

fn replicas_cell(table: &TableOrchestrator, identity: &str) -> String {
    let column = ColumnSpec::new("REPLICAS", ColumnSource::Derived("replicas"), 25);
    table
        .render()
        .rows
        .iter()
        .find(|row| row.row.identity == identity)
        .map(|row| row.cell(&column))
        .unwrap_or_default()
}

#[tokio::test]
async fn visible_rows_are_decorated_after_fetch() {
    let runner = FakeRunner::daemon_sets();
    let mut table = table();
    assert_eq!(table.phase(), TablePhase::PrimaryLoaded);

    let ticket = table
        .on_visible_rows_changed(&ids(&["a", "b"]), &vars())
        .expect("first viewport fetches");
    assert_eq!(table.phase(), TablePhase::SecondaryPending);
    assert_eq!(ticket.signature.as_str(), "a|b");

    let result = run_fetch(&runner, &ticket, &range()).await;
    assert_eq!(table.complete_fetch(&ticket, result), FetchOutcome::Applied);
    assert_eq!(table.phase(), TablePhase::Merged);

    assert_eq!(replicas_cell(&table, "a"), "3/5");
    assert_eq!(replicas_cell(&table, "b"), "2/2");
    // Off-screen rows render the empty sentinel.
    assert_eq!(replicas_cell(&table, "c"), "0/0");
}

#[tokio::test]
async fn reordered_viewport_reuses_results() {
    let runner = FakeRunner::daemon_sets();
    let mut table = table();

    let ticket = table
        .on_visible_rows_changed(&ids(&["a", "b"]), &vars())
        .expect("first viewport fetches");
    let result = run_fetch(&runner, &ticket, &range()).await;
    table.complete_fetch(&ticket, result);

    assert!(table.on_visible_rows_changed(&ids(&["b", "a"]), &vars()).is_none());
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn late_result_of_older_viewport_is_discarded() {
    let runner = FakeRunner::daemon_sets();
    let mut table = table();

    let first = table
        .on_visible_rows_changed(&ids(&["a"]), &vars())
        .expect("first viewport fetches");
    let second = table
        .on_visible_rows_changed(&ids(&["b", "c"]), &vars())
        .expect("second viewport fetches");
    assert_eq!(table.in_flight(), 2);

    let second_result = run_fetch(&runner, &second, &range()).await;
    let first_result = run_fetch(&runner, &first, &range()).await;

    assert_eq!(table.complete_fetch(&second, second_result), FetchOutcome::Applied);
    assert_eq!(table.complete_fetch(&first, first_result), FetchOutcome::Stale);

    assert_eq!(table.applied_signature().map(|s| s.as_str()), Some("b|c"));
    assert_eq!(replicas_cell(&table, "b"), "2/2");
    assert_eq!(replicas_cell(&table, "a"), "0/0");
    assert_eq!(table.phase(), TablePhase::Merged);
}

#[test]
fn empty_viewport_never_fetches() {
    let mut table = table();
    assert!(table.on_visible_rows_changed(&[], &vars()).is_none());
    assert_eq!(table.in_flight(), 0);
    assert!(table.requested_signature().is_none());
}

#[test]
fn expanding_twice_returns_the_same_view() {
    let mut table = table();
    let first = table.expand("a").expect("row exists");
    let second = table.expand("a").expect("row exists");
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(table.expanded_count(), 1);
    assert!(table.expand("missing").is_none());
}

#[tokio::test]
async fn failed_fetch_keeps_previous_results_and_allows_retry() {
    let good = FakeRunner::daemon_sets();
    let bad = FakeRunner::failing();
    let mut table = table();

    let ticket = table
        .on_visible_rows_changed(&ids(&["a"]), &vars())
        .expect("first viewport fetches");
    let result = run_fetch(&good, &ticket, &range()).await;
    table.complete_fetch(&ticket, result);

    let ticket = table
        .on_visible_rows_changed(&ids(&["a", "b"]), &vars())
        .expect("new viewport fetches");
    let result = run_fetch(&bad, &ticket, &range()).await;
    assert_eq!(table.complete_fetch(&ticket, result), FetchOutcome::Failed);

    let view = table.render();
    assert!(view.error.is_some_and(|e| e.contains("502")));
    assert_eq!(replicas_cell(&table, "a"), "3/5");

    let retry = table
        .on_visible_rows_changed(&ids(&["a", "b"]), &vars())
        .expect("same viewport is retried after a failure");
    let result = run_fetch(&good, &retry, &range()).await;
    assert_eq!(table.complete_fetch(&retry, result), FetchOutcome::Applied);
    assert_eq!(replicas_cell(&table, "b"), "2/2");
    assert!(table.render().error.is_none());
}

#[tokio::test]
async fn invalidate_refetches_and_fences_inflight_tickets() {
    let runner = FakeRunner::daemon_sets();
    let mut table = table();

    let ticket = table
        .on_visible_rows_changed(&ids(&["a"]), &vars())
        .expect("first viewport fetches");
    table.invalidate();

    let result = run_fetch(&runner, &ticket, &range()).await;
    assert_eq!(table.complete_fetch(&ticket, result), FetchOutcome::Stale);

    let ticket = table
        .on_visible_rows_changed(&ids(&["a"]), &vars())
        .expect("same viewport fetches again after invalidation");
    let result = run_fetch(&runner, &ticket, &range()).await;
    assert_eq!(table.complete_fetch(&ticket, result), FetchOutcome::Applied);
    assert_eq!(replicas_cell(&table, "a"), "3/5");
}

#[test]
fn unresolved_datasource_skips_fetch() {
    let mut table = table();
    let vars = VariableSet::new().with(Variable::new(
        CLUSTER_VARIABLE,
        "Cluster",
        VariableKind::Query,
        "prod",
    ));
    assert!(table.on_visible_rows_changed(&ids(&["a"]), &vars).is_none());
    assert!(table.requested_signature().is_none());
}

#[tokio::test]
async fn failed_newest_fetch_does_not_hide_an_older_viewport() {
    let good = FakeRunner::daemon_sets();
    let bad = FakeRunner::failing();
    let mut table = table();

    let first = table
        .on_visible_rows_changed(&ids(&["a"]), &vars())
        .expect("first viewport fetches");
    let result = run_fetch(&good, &first, &range()).await;
    table.complete_fetch(&first, result);

    let second = table
        .on_visible_rows_changed(&ids(&["b"]), &vars())
        .expect("second viewport fetches");
    let third = table
        .on_visible_rows_changed(&ids(&["c"]), &vars())
        .expect("third viewport fetches");

    let result = run_fetch(&bad, &third, &range()).await;
    assert_eq!(table.complete_fetch(&third, result), FetchOutcome::Failed);
    let result = run_fetch(&good, &second, &range()).await;
    assert_eq!(table.complete_fetch(&second, result), FetchOutcome::Applied);
    assert_eq!(replicas_cell(&table, "a"), "0/0");

    let back = table
        .on_visible_rows_changed(&ids(&["a"]), &vars())
        .expect("returning to the first viewport fetches again");
    let result = run_fetch(&good, &back, &range()).await;
    assert_eq!(table.complete_fetch(&back, result), FetchOutcome::Applied);
    assert_eq!(replicas_cell(&table, "a"), "3/5");
    assert_eq!(good.calls(), 3);
}
