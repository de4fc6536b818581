//! Per-row detail views.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::orchestrator::PrimaryRow;
use crate::query::{IDENTITY_VARIABLE, QuerySpec, string_literal};
use crate::series::{SecondaryResults, value_of};
use crate::variables::{CLUSTER_VARIABLE, NAMESPACE_VARIABLE, VariableSet};
use crate::workload::{PanelTemplate, WorkloadSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum ExpandedData {
    NotLoaded,
    Loading,
    Loaded(SecondaryResults),
    Error(String),
}

/// Detail view of a single row, fetched on its own when shown.
#[derive(Debug, Clone)]
pub struct ExpandedView {
    key: String,
    row: PrimaryRow,
    link: String,
    panels: Vec<PanelTemplate>,
    data: ExpandedData,
}

impl ExpandedView {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn row(&self) -> &PrimaryRow {
        &self.row
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn panels(&self) -> &[PanelTemplate] {
        &self.panels
    }

    pub fn data(&self) -> &ExpandedData {
        &self.data
    }

    /// Queries to load this view, scoped to its row.
    ///
    /// Only a view that is not loaded yet returns queries; it moves to
    /// `Loading` until [`set_data`](Self::set_data) or
    /// [`set_error`](Self::set_error) is called.
    pub fn pending_queries(&mut self, variables: &VariableSet) -> Option<Vec<QuerySpec>> {
        if self.data != ExpandedData::NotLoaded {
            return None;
        }

        let mut scoped = variables
            .scoped(IDENTITY_VARIABLE, string_literal(&self.row.identity))
            .scoped(NAMESPACE_VARIABLE, string_literal(&self.row.namespace));
        if !self.row.cluster.is_empty() {
            scoped = scoped.scoped(CLUSTER_VARIABLE, string_literal(&self.row.cluster));
        }

        let queries: Result<Vec<_>, _> = self
            .panels
            .iter()
            .map(|panel| panel.query.render(&scoped))
            .collect();

        match queries {
            Ok(queries) => {
                self.data = ExpandedData::Loading;
                Some(queries)
            }
            Err(error) => {
                tracing::debug!(identity = %self.key, %error, "Cannot build expanded row queries");
                self.data = ExpandedData::Error(error.to_string());
                None
            }
        }
    }

    pub fn set_data(&mut self, results: SecondaryResults) {
        self.data = ExpandedData::Loaded(results);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.data = ExpandedData::Error(message.into());
    }

    /// Drop loaded data so the next [`pending_queries`](Self::pending_queries)
    /// fetches again.
    pub fn reload(&mut self) {
        self.data = ExpandedData::NotLoaded;
    }

    /// Title and value of every panel, `None` until loaded or on a miss.
    pub fn panel_values(&self) -> Vec<(&'static str, Option<f64>)> {
        self.panels
            .iter()
            .map(|panel| {
                let value = match &self.data {
                    ExpandedData::Loaded(results) => {
                        value_of(results, panel.query.ref_id, |_| true)
                    }
                    _ => None,
                };
                (panel.title, value)
            })
            .collect()
    }
}

/// Builds expanded views for one workload kind. Building never fetches.
#[derive(Debug, Clone)]
pub struct ExpandedRowBuilder {
    spec: Arc<WorkloadSpec>,
}

impl ExpandedRowBuilder {
    pub fn new(spec: Arc<WorkloadSpec>) -> Self {
        Self { spec }
    }

    pub fn build(&self, row: &PrimaryRow) -> ExpandedView {
        ExpandedView {
            key: row.identity.clone(),
            row: row.clone(),
            link: self.spec.link_path(row),
            panels: self.spec.panels.clone(),
            data: ExpandedData::NotLoaded,
        }
    }
}

/// Expanded views by row identity. Entries live as long as the table.
#[derive(Debug, Default)]
pub struct ExpandedRowCache {
    views: HashMap<String, Rc<RefCell<ExpandedView>>>,
}

impl ExpandedRowCache {
    pub fn get(&self, identity: &str) -> Option<Rc<RefCell<ExpandedView>>> {
        self.views.get(identity).cloned()
    }

    /// The cached view for `identity`, inserting `view` if there is none.
    pub fn get_or_insert(&mut self, identity: &str, view: ExpandedView) -> Rc<RefCell<ExpandedView>> {
        self.views
            .entry(identity.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(view)))
            .clone()
    }

    pub fn views(&self) -> impl Iterator<Item = &Rc<RefCell<ExpandedView>>> {
        self.views.values()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
