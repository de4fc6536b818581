//! The visible-row table engine.
//!
//! A [`TableOrchestrator`] owns the primary rows of one workload table, the
//! latest secondary results and the expanded-row cache. The host reports the
//! identities on screen through [`TableOrchestrator::on_visible_rows_changed`]
//! and gets back a [`FetchTicket`] when a secondary fetch is needed. The
//! ticket is executed elsewhere and its result handed back through
//! [`TableOrchestrator::complete_fetch`].
//!
//! Every ticket carries a sequence number. A result older than the one
//! currently applied is dropped, so a slow fetch can never overwrite newer
//! data.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::QueryError;
use crate::expanded::{ExpandedRowBuilder, ExpandedRowCache, ExpandedView};
use crate::query::{QuerySpec, build_row_queries};
use crate::runner::DatasourceRef;
use crate::series::{SecondaryResults, SeriesResult};
use crate::variables::{DATASOURCE_VARIABLE, VariableSet, resolve};
use crate::workload::{ColumnSource, ColumnSpec, FieldValue, WorkloadSpec};

/// One workload instance discovered by the primary query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryRow {
    pub cluster: String,
    pub identity: String,
    pub namespace: String,
}

/// Build primary rows from the primary query result.
///
/// Series without the identity label are skipped. Duplicate identities are
/// kept in order; lookups resolve them to the first matching series.
pub fn rows_from_series(
    results: &[SeriesResult],
    spec: &WorkloadSpec,
    fallback_cluster: &str,
) -> Vec<PrimaryRow> {
    results
        .iter()
        .filter_map(|series| {
            let identity = series.label(spec.identity_label)?;
            Some(PrimaryRow {
                cluster: series
                    .label("cluster")
                    .unwrap_or(fallback_cluster)
                    .to_string(),
                identity: identity.to_string(),
                namespace: series.label("namespace").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Order-independent key of a visible identity set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn from_identities(identities: &[String]) -> Self {
        let sorted: BTreeSet<&str> = identities.iter().map(String::as_str).collect();
        Self(sorted.into_iter().collect::<Vec<_>>().join("|"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A secondary fetch the host must execute and hand back.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub seq: u64,
    pub signature: Signature,
    /// Identities in the order the host reported them
    pub identities: Vec<String>,
    pub queries: Vec<QuerySpec>,
    pub datasource: DatasourceRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePhase {
    /// No primary data yet
    Empty,
    /// Primary rows present, no secondary data applied
    PrimaryLoaded,
    /// At least one secondary fetch in flight
    SecondaryPending,
    /// Secondary results applied
    Merged,
}

impl fmt::Display for TablePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::PrimaryLoaded => "loaded",
            Self::SecondaryPending => "fetching",
            Self::Merged => "merged",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result replaced the secondary cache
    Applied,
    /// A newer result was already applied or the table was invalidated
    Stale,
    /// The fetch failed; the previous cache is kept
    Failed,
}

/// A primary row with its derived fields projected from the secondary cache.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedRow {
    pub row: PrimaryRow,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl DecoratedRow {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Display text of one column.
    pub fn cell(&self, column: &ColumnSpec) -> String {
        match column.source {
            ColumnSource::Identity => self.row.identity.clone(),
            ColumnSource::Namespace => self.row.namespace.clone(),
            ColumnSource::Cluster => self.row.cluster.clone(),
            ColumnSource::Derived(name) => self
                .field(name)
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub phase: TablePhase,
    pub rows: Vec<DecoratedRow>,
    pub error: Option<String>,
}

pub struct TableOrchestrator {
    spec: Arc<WorkloadSpec>,
    primary: Option<Vec<PrimaryRow>>,
    primary_error: Option<String>,
    secondary: SecondaryResults,
    /// Signature of the most recently issued fetch
    requested: Option<Signature>,
    /// Sequence and signature of the result in `secondary`
    applied: Option<(u64, Signature)>,
    /// Signature of every ticket not yet completed, by sequence
    in_flight: BTreeMap<u64, Signature>,
    next_seq: u64,
    /// Tickets at or below this sequence were issued before the last
    /// invalidation
    fence: u64,
    fetch_error: Option<String>,
    builder: ExpandedRowBuilder,
    expanded: ExpandedRowCache,
}

impl TableOrchestrator {
    pub fn new(spec: Arc<WorkloadSpec>) -> Self {
        Self {
            builder: ExpandedRowBuilder::new(spec.clone()),
            spec,
            primary: None,
            primary_error: None,
            secondary: SecondaryResults::new(),
            requested: None,
            applied: None,
            in_flight: BTreeMap::new(),
            next_seq: 0,
            fence: 0,
            fetch_error: None,
            expanded: ExpandedRowCache::default(),
        }
    }

    pub fn spec(&self) -> &WorkloadSpec {
        &self.spec
    }

    pub fn rows(&self) -> &[PrimaryRow] {
        self.primary.as_deref().unwrap_or_default()
    }

    pub fn secondary(&self) -> &SecondaryResults {
        &self.secondary
    }

    pub fn requested_signature(&self) -> Option<&Signature> {
        self.requested.as_ref()
    }

    pub fn applied_signature(&self) -> Option<&Signature> {
        self.applied.as_ref().map(|(_, signature)| signature)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn phase(&self) -> TablePhase {
        if self.primary.is_none() {
            TablePhase::Empty
        } else if !self.in_flight.is_empty() {
            TablePhase::SecondaryPending
        } else if self.applied.is_some() {
            TablePhase::Merged
        } else {
            TablePhase::PrimaryLoaded
        }
    }

    /// Replace the primary rows. Secondary data and expanded views are kept;
    /// they are keyed by identity and stay valid for rows that survive.
    pub fn set_primary(&mut self, rows: Vec<PrimaryRow>) {
        tracing::debug!(kind = %self.spec.kind, rows = rows.len(), "Primary rows loaded");
        self.primary = Some(rows);
        self.primary_error = None;
    }

    pub fn set_primary_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(kind = %self.spec.kind, error = %message, "Primary query failed");
        self.primary_error = Some(message);
    }

    /// Report the identities currently on screen.
    ///
    /// Returns a ticket when a secondary fetch is needed: the set is not
    /// empty, differs from the last requested set and every scope variable
    /// resolves.
    pub fn on_visible_rows_changed(
        &mut self,
        identities: &[String],
        variables: &VariableSet,
    ) -> Option<FetchTicket> {
        if identities.is_empty() {
            return None;
        }

        let signature = Signature::from_identities(identities);
        if self.requested.as_ref() == Some(&signature) {
            tracing::trace!(%signature, "Visible rows unchanged");
            return None;
        }

        let Some(datasource) =
            resolve(variables, DATASOURCE_VARIABLE).filter(|name| !name.is_empty())
        else {
            tracing::debug!(%signature, "Datasource unresolved, skipping secondary fetch");
            return None;
        };

        let queries = match build_row_queries(&self.spec.row_queries, identities, variables) {
            Ok(queries) => queries,
            Err(error) => {
                tracing::debug!(%signature, %error, "Cannot build row queries, skipping secondary fetch");
                return None;
            }
        };

        self.next_seq += 1;
        let seq = self.next_seq;
        self.requested = Some(signature.clone());
        self.in_flight.insert(seq, signature.clone());

        tracing::debug!(kind = %self.spec.kind, seq, %signature, "Issuing secondary fetch");
        Some(FetchTicket {
            seq,
            signature,
            identities: identities.to_vec(),
            queries,
            datasource: DatasourceRef::new(datasource),
        })
    }

    /// Hand back the result of a ticket.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<SecondaryResults, QueryError>,
    ) -> FetchOutcome {
        self.in_flight.remove(&ticket.seq);

        let superseded = self
            .applied
            .as_ref()
            .is_some_and(|(applied, _)| ticket.seq < *applied);
        if ticket.seq <= self.fence || superseded {
            tracing::debug!(seq = ticket.seq, signature = %ticket.signature, "Discarding stale secondary result");
            return FetchOutcome::Stale;
        }

        match result {
            Ok(results) => {
                self.secondary = results;
                self.applied = Some((ticket.seq, ticket.signature.clone()));
                self.fetch_error = None;
                FetchOutcome::Applied
            }
            Err(error) => {
                tracing::warn!(seq = ticket.seq, signature = %ticket.signature, %error, "Secondary fetch failed");
                self.fetch_error = Some(error.to_string());
                // Let the failed viewport trigger the fetch again.
                self.requested = self.newest_live_signature();
                FetchOutcome::Failed
            }
        }
    }

    /// Signature of the newest ticket that is still in flight or applied.
    /// Tickets issued before the last invalidation do not count.
    fn newest_live_signature(&self) -> Option<Signature> {
        let in_flight = self
            .in_flight
            .range(self.fence + 1..)
            .next_back()
            .map(|(seq, signature)| (*seq, signature));
        let applied = self
            .applied
            .as_ref()
            .map(|(seq, signature)| (*seq, signature));

        let newest = match (in_flight, applied) {
            (Some(pending), Some(done)) if done.0 > pending.0 => Some(done),
            (pending, done) => pending.or(done),
        };
        newest.map(|(_, signature)| signature.clone())
    }

    /// Forget what was fetched so the next viewport report fetches again.
    /// Results of tickets already issued are discarded. Expanded views reload
    /// the next time they are shown.
    ///
    /// The cached values stay on screen until a new result replaces them, so
    /// the phase reads `PrimaryLoaded` (or `SecondaryPending`) while
    /// `render()` still shows the previous values.
    pub fn invalidate(&mut self) {
        self.requested = None;
        self.applied = None;
        self.fence = self.next_seq;
        self.fetch_error = None;
        for view in self.expanded.views() {
            view.borrow_mut().reload();
        }
    }

    pub fn render(&self) -> TableView {
        let rows = self
            .rows()
            .iter()
            .map(|row| DecoratedRow {
                row: row.clone(),
                fields: self
                    .spec
                    .derived
                    .iter()
                    .map(|field| {
                        let value = (field.extract)(&self.secondary, row, self.spec.identity_label);
                        (field.name, value)
                    })
                    .collect(),
            })
            .collect();

        TableView {
            phase: self.phase(),
            rows,
            error: self.primary_error.clone().or_else(|| self.fetch_error.clone()),
        }
    }

    /// The expanded view of a row, built on first use. `None` if no primary
    /// row has this identity.
    pub fn expand(&mut self, identity: &str) -> Option<Rc<RefCell<ExpandedView>>> {
        if let Some(view) = self.expanded.get(identity) {
            return Some(view);
        }

        let row = self.rows().iter().find(|row| row.identity == identity)?;
        let view = self.builder.build(row);
        tracing::debug!(kind = %self.spec.kind, identity, "Expanded view created");
        Some(self.expanded.get_or_insert(identity, view))
    }

    pub fn expanded_view(&self, identity: &str) -> Option<Rc<RefCell<ExpandedView>>> {
        self.expanded.get(identity)
    }

    pub fn expanded_count(&self) -> usize {
        self.expanded.len()
    }
}
