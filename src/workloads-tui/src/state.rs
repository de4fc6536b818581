//! Application state management

use std::time::{Duration, SystemTime};

use workload_table::WorkloadKind;

/// One tab per workload kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tab {
    DaemonSets,
    Jobs,
    StatefulSets,
}

impl Tab {
    pub fn all() -> Vec<Tab> {
        vec![Tab::DaemonSets, Tab::Jobs, Tab::StatefulSets]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::DaemonSets => "DaemonSets",
            Tab::Jobs => "Jobs",
            Tab::StatefulSets => "StatefulSets",
        }
    }

    pub fn shortcut(&self) -> char {
        match self {
            Tab::DaemonSets => '1',
            Tab::Jobs => '2',
            Tab::StatefulSets => '3',
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        match self {
            Tab::DaemonSets => WorkloadKind::DaemonSet,
            Tab::Jobs => WorkloadKind::Job,
            Tab::StatefulSets => WorkloadKind::StatefulSet,
        }
    }
}

/// State shared by the tab bar, the status bar and the app loop
#[derive(Clone, Debug)]
pub struct AppState {
    pub active_tab: Tab,
    pub available_tabs: Vec<Tab>,
    /// Datasource the tables query
    pub datasource: String,
    pub cluster: String,
    pub namespace: String,
    /// Phase of the active table, as shown in the status bar
    pub table_phase: String,
    pub last_error: Option<String>,
    pub last_error_at: Option<SystemTime>,
    pub last_refresh_at: Option<SystemTime>,
    pub refresh_interval: Duration,
}

impl AppState {
    pub fn new(
        datasource: impl Into<String>,
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            active_tab: Tab::DaemonSets,
            available_tabs: Tab::all(),
            datasource: datasource.into(),
            cluster: cluster.into(),
            namespace: namespace.into(),
            table_phase: String::new(),
            last_error: None,
            last_error_at: None,
            last_refresh_at: None,
            refresh_interval,
        }
    }

    /// Set the latest user-visible error with timestamp.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.last_error_at = Some(SystemTime::now());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.last_error_at = None;
    }

    pub fn mark_refreshed(&mut self) {
        self.last_refresh_at = Some(SystemTime::now());
    }

    pub fn active_index(&self) -> usize {
        self.available_tabs
            .iter()
            .position(|t| t == &self.active_tab)
            .unwrap_or(0)
    }

    /// Switch to the next tab (wraps around)
    pub fn next_tab(&mut self) {
        if self.available_tabs.is_empty() {
            return;
        }
        let next = (self.active_index() + 1) % self.available_tabs.len();
        self.active_tab = self.available_tabs[next];
    }

    /// Switch to the previous tab (wraps around)
    pub fn prev_tab(&mut self) {
        if self.available_tabs.is_empty() {
            return;
        }
        let current = self.active_index();
        let prev = if current == 0 {
            self.available_tabs.len() - 1
        } else {
            current - 1
        };
        self.active_tab = self.available_tabs[prev];
    }

    pub fn switch_tab(&mut self, index: usize) {
        if let Some(tab) = self.available_tabs.get(index) {
            self.active_tab = *tab;
        }
    }
}
