//! Workload tab: a paginated table whose visible rows drive the detail
//! queries, with an optional expanded-row pane.
//!
//! The panel never runs queries itself. It queues requests which the app
//! polls with the `take_pending_*` methods, and it receives the results
//! through the `set_*_result` methods.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use workload_table::orchestrator::rows_from_series;
use workload_table::query::build_primary_query;
use workload_table::variables::{CLUSTER_VARIABLE, DATASOURCE_VARIABLE, SEARCH_VARIABLE};
use workload_table::{
    DatasourceRef, FetchOutcome, FetchTicket, Pagination, QueryError, QuerySpec,
    SecondaryResults, TableOrchestrator, TablePhase, VariableSet, WorkloadKind, WorkloadSpec,
    resolve,
};

use super::Component;
use super::expanded_row;
use crate::action::Action;
use crate::state::AppState;

/// A primary query the app should run. Results are matched by generation so
/// an answer to a superseded request is ignored.
#[derive(Debug, Clone)]
pub struct PrimaryRequest {
    pub generation: u64,
    pub query: QuerySpec,
    pub datasource: DatasourceRef,
}

#[derive(Debug, Clone)]
pub struct ExpandedRequest {
    pub identity: String,
    pub queries: Vec<QuerySpec>,
    pub datasource: DatasourceRef,
}

pub struct WorkloadTablePanel {
    orchestrator: TableOrchestrator,
    variables: VariableSet,
    pagination: Pagination,
    /// Selected row within the current page
    selected: usize,
    expanded: Option<String>,
    /// Search text being edited, `None` when not editing
    search_input: Option<String>,
    primary_generation: u64,
    pending_primary: Option<PrimaryRequest>,
    pending_secondary: Vec<FetchTicket>,
    pending_expanded: Option<ExpandedRequest>,
}

impl WorkloadTablePanel {
    /// A panel with its own variables. The first primary load is queued
    /// immediately.
    pub fn new(spec: WorkloadSpec, variables: VariableSet, page_size: usize) -> Self {
        let mut panel = Self {
            orchestrator: TableOrchestrator::new(Arc::new(spec)),
            variables,
            pagination: Pagination::new(page_size),
            selected: 0,
            expanded: None,
            search_input: None,
            primary_generation: 0,
            pending_primary: None,
            pending_secondary: Vec::new(),
            pending_expanded: None,
        };
        panel.request_primary();
        panel
    }

    pub fn kind(&self) -> WorkloadKind {
        self.orchestrator.spec().kind
    }

    pub fn orchestrator(&self) -> &TableOrchestrator {
        &self.orchestrator
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn phase(&self) -> TablePhase {
        self.orchestrator.phase()
    }

    pub fn expanded_identity(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        self.search_input.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_primary.is_some()
            || !self.pending_secondary.is_empty()
            || self.pending_expanded.is_some()
    }

    pub fn take_pending_primary(&mut self) -> Option<PrimaryRequest> {
        self.pending_primary.take()
    }

    pub fn take_pending_secondary(&mut self) -> Vec<FetchTicket> {
        std::mem::take(&mut self.pending_secondary)
    }

    pub fn take_pending_expanded(&mut self) -> Option<ExpandedRequest> {
        self.pending_expanded.take()
    }

    fn datasource(&self) -> Option<DatasourceRef> {
        resolve(&self.variables, DATASOURCE_VARIABLE)
            .filter(|name| !name.is_empty())
            .map(DatasourceRef::new)
    }

    /// Queue a primary load, superseding any request still outstanding.
    pub fn request_primary(&mut self) {
        self.primary_generation += 1;

        let Some(datasource) = self.datasource() else {
            self.orchestrator
                .set_primary_error("No datasource matches the configured pattern");
            return;
        };

        match build_primary_query(&self.orchestrator.spec().primary, &self.variables) {
            Ok(query) => {
                self.pending_primary = Some(PrimaryRequest {
                    generation: self.primary_generation,
                    query,
                    datasource,
                });
            }
            Err(error) => self.orchestrator.set_primary_error(error.to_string()),
        }
    }

    /// Apply a primary result. Returns `false` if the request was superseded.
    pub fn set_primary_result(
        &mut self,
        generation: u64,
        result: Result<SecondaryResults, QueryError>,
    ) -> bool {
        if generation != self.primary_generation {
            tracing::debug!(kind = %self.kind(), generation, "Ignoring superseded primary result");
            return false;
        }

        match result {
            Ok(results) => {
                let rows = {
                    let spec = self.orchestrator.spec();
                    let series = results
                        .get(spec.primary.ref_id)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    let cluster = resolve(&self.variables, CLUSTER_VARIABLE).unwrap_or_default();
                    rows_from_series(series, spec, &cluster)
                };
                self.orchestrator.set_primary(rows);
                self.pagination.clamp(self.orchestrator.rows().len());
                self.clamp_selection();
                self.report_visible();
                self.request_expanded();
            }
            Err(error) => self.orchestrator.set_primary_error(error.to_string()),
        }
        true
    }

    /// Tell the table which identities are on screen.
    pub fn report_visible(&mut self) {
        let ids = self
            .pagination
            .visible_ids(self.orchestrator.rows(), |row| row.identity.as_str());
        if let Some(ticket) = self.orchestrator.on_visible_rows_changed(&ids, &self.variables) {
            self.pending_secondary.push(ticket);
        }
    }

    pub fn set_secondary_result(
        &mut self,
        ticket: &FetchTicket,
        result: Result<SecondaryResults, QueryError>,
    ) -> FetchOutcome {
        self.orchestrator.complete_fetch(ticket, result)
    }

    pub fn set_expanded_result(
        &mut self,
        identity: &str,
        result: Result<SecondaryResults, QueryError>,
    ) {
        let Some(view) = self.orchestrator.expanded_view(identity) else {
            return;
        };
        let mut view = view.borrow_mut();
        match result {
            Ok(results) => view.set_data(results),
            Err(error) => view.set_error(error.to_string()),
        }
    }

    /// Drop everything fetched and reload from the primary query.
    pub fn refresh(&mut self) {
        self.orchestrator.invalidate();
        self.request_primary();
    }

    /// Change a scope variable. Returns `true` if the table reloads.
    pub fn set_variable(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.variables.set(name, value) {
            Ok(true) => {
                self.pagination.reset();
                self.selected = 0;
                self.expanded = None;
                self.refresh();
                true
            }
            Ok(false) => false,
            Err(error) => {
                tracing::warn!(kind = %self.kind(), %error, "Cannot set variable");
                false
            }
        }
    }

    fn visible_len(&self) -> usize {
        self.pagination.visible(self.orchestrator.rows()).len()
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.visible_len().saturating_sub(1));
    }

    fn selected_identity(&self) -> Option<String> {
        self.pagination
            .visible(self.orchestrator.rows())
            .get(self.selected)
            .map(|row| row.identity.clone())
    }

    fn scroll(&mut self, down: bool) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        self.selected = match (down, self.selected) {
            (true, s) => (s + 1) % len,
            (false, 0) => len - 1,
            (false, s) => s - 1,
        };
    }

    fn change_page(&mut self, forward: bool) {
        let len = self.orchestrator.rows().len();
        let moved = if forward {
            self.pagination.next_page(len)
        } else {
            self.pagination.prev_page()
        };
        if moved {
            self.selected = 0;
            self.report_visible();
        }
    }

    fn toggle_expanded(&mut self) {
        let Some(identity) = self.selected_identity() else {
            return;
        };
        if self.expanded.as_deref() == Some(identity.as_str()) {
            self.expanded = None;
        } else {
            self.expanded = Some(identity);
            self.request_expanded();
        }
    }

    /// Queue the detail queries of the expanded row if it has not loaded.
    fn request_expanded(&mut self) {
        let Some(identity) = self.expanded.clone() else {
            return;
        };
        let Some(view) = self.orchestrator.expand(&identity) else {
            self.expanded = None;
            return;
        };
        let Some(datasource) = self.datasource() else {
            return;
        };

        let queries = view.borrow_mut().pending_queries(&self.variables);
        if let Some(queries) = queries {
            self.pending_expanded = Some(ExpandedRequest {
                identity,
                queries,
                datasource,
            });
        }
    }

    fn title(&self) -> String {
        let spec = self.orchestrator.spec();
        let len = self.orchestrator.rows().len();
        let mut title = format!(
            "{} - page {}/{} ({} rows)",
            spec.title,
            self.pagination.page() + 1,
            self.pagination.page_count(len),
            len
        );

        if let Some(input) = &self.search_input {
            title.push_str(&format!(" search: {input}_"));
        } else if let Some(search) = resolve(&self.variables, SEARCH_VARIABLE).filter(|s| !s.is_empty()) {
            title.push_str(&format!(" search={search}"));
        }
        title
    }

    fn render_table(&self, frame: &mut Frame, area: Rect) {
        let spec = self.orchestrator.spec();
        let view = self.orchestrator.render();
        let block = Block::default().borders(Borders::ALL).title(self.title());

        if view.rows.is_empty() {
            let (message, color) = match (&view.error, view.phase) {
                (Some(error), _) => (format!("Error: {error}"), Color::Red),
                (None, TablePhase::Empty) => ("Loading...".to_string(), Color::Yellow),
                (None, _) => ("No workloads found".to_string(), Color::DarkGray),
            };
            let paragraph = Paragraph::new(message)
                .style(Style::default().fg(color))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let [table_area, error_area] = if view.error.is_some() {
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area)
        } else {
            Layout::vertical([Constraint::Min(0), Constraint::Length(0)]).areas(area)
        };

        let header = Row::new(spec.columns.iter().map(|column| Cell::from(column.header))).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let visible = self.pagination.visible(&view.rows);
        let rows = visible.iter().map(|row| {
            let style = if self.expanded.as_deref() == Some(row.row.identity.as_str()) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Row::new(spec.columns.iter().map(|column| Cell::from(row.cell(column)))).style(style)
        });

        let widths: Vec<Constraint> = spec
            .columns
            .iter()
            .map(|column| Constraint::Percentage(column.width))
            .collect();

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let mut state = TableState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(table, table_area, &mut state);

        if let Some(error) = &view.error {
            frame.render_widget(
                Paragraph::new(format!("Error: {error}")).style(Style::default().fg(Color::Red)),
                error_area,
            );
        }
    }
}

impl Component for WorkloadTablePanel {
    fn handle_key_event(&mut self, key: KeyEvent) -> Option<Action> {
        let input = self.search_input.as_mut()?;
        match key.code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                let value = self.search_input.take().unwrap_or_default();
                self.set_variable(SEARCH_VARIABLE, value);
            }
            KeyCode::Esc => self.search_input = None,
            _ => {}
        }
        Some(Action::None)
    }

    fn update(&mut self, action: &Action, _state: &mut AppState) {
        match action {
            Action::ScrollUp => self.scroll(false),
            Action::ScrollDown => self.scroll(true),
            Action::NextPage => self.change_page(true),
            Action::PrevPage => self.change_page(false),
            Action::Select => self.toggle_expanded(),
            Action::Back => self.expanded = None,
            Action::Refresh => self.refresh(),
            Action::Search => {
                self.search_input =
                    Some(resolve(&self.variables, SEARCH_VARIABLE).unwrap_or_default());
            }
            Action::Quit
            | Action::SwitchTab(_)
            | Action::NextTab
            | Action::PrevTab
            | Action::None => {}
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect, _state: &AppState) {
        let expanded = self
            .expanded
            .as_deref()
            .and_then(|identity| self.orchestrator.expanded_view(identity));

        match expanded {
            Some(view) => {
                let [table_area, detail_area] =
                    Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
                        .areas(area);
                self.render_table(frame, table_area);
                expanded_row::render(frame, detail_area, &view.borrow());
            }
            None => self.render_table(frame, area),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use workload_table::variables::NAMESPACE_VARIABLE;
    use workload_table::{SeriesResult, Variable, VariableKind};

    use super::*;
    use crate::test_helpers::assert_buffer_contains;

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
            .with(Variable::new(
                NAMESPACE_VARIABLE,
                "Namespace",
                VariableKind::Text,
                ".*",
            ))
            .with(Variable::new(
                SEARCH_VARIABLE,
                "Search",
                VariableKind::Text,
                "",
            ))
    }

    fn state() -> AppState {
        AppState::new("prometheus", "prod", ".*", Duration::from_secs(30))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn primary(names: &[&str]) -> SecondaryResults {
        SecondaryResults::from([(
            "daemonsets".to_string(),
            names
                .iter()
                .map(|name| {
                    SeriesResult::new("daemonsets")
                        .with_label("daemonset", *name)
                        .with_label("namespace", "kube-system")
                        .with_value(1.0)
                })
                .collect(),
        )])
    }

    /// A daemon set panel with its primary rows loaded.
    fn loaded(names: &[&str], page_size: usize) -> WorkloadTablePanel {
        let mut panel = WorkloadTablePanel::new(WorkloadSpec::daemon_sets(), vars(), page_size);
        let request = panel.take_pending_primary().unwrap();
        assert!(panel.set_primary_result(request.generation, Ok(primary(names))));
        panel
    }

    #[test]
    fn new_panel_queues_primary_load() {
        let mut panel = WorkloadTablePanel::new(WorkloadSpec::daemon_sets(), vars(), 10);
        assert!(panel.has_pending());

        let request = panel.take_pending_primary().unwrap();
        assert_eq!(request.datasource.name, "prometheus");
        assert!(request.query.expr.contains(r#"cluster="prod""#));
        assert_eq!(panel.phase(), TablePhase::Empty);
        assert!(!panel.has_pending());
    }

    #[test]
    fn unresolved_datasource_is_a_primary_error() {
        let mut vars = vars();
        vars.set(DATASOURCE_VARIABLE, "").unwrap();
        let mut panel = WorkloadTablePanel::new(WorkloadSpec::jobs(), vars, 10);
        assert!(panel.take_pending_primary().is_none());
        assert!(panel.orchestrator().render().error.is_some());
    }

    #[test]
    fn primary_rows_queue_fetch_for_first_page() {
        let mut panel = loaded(&["a", "b", "c"], 2);
        assert_eq!(panel.phase(), TablePhase::SecondaryPending);

        let tickets = panel.take_pending_secondary();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].identities, vec!["a", "b"]);
    }

    #[test]
    fn paging_requests_the_new_page() {
        let mut panel = loaded(&["a", "b", "c"], 2);
        panel.take_pending_secondary();

        panel.update(&Action::NextPage, &mut state());
        let tickets = panel.take_pending_secondary();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].identities, vec!["c"]);

        // Last page: nothing moves, nothing is fetched
        panel.update(&Action::NextPage, &mut state());
        assert!(panel.take_pending_secondary().is_empty());
    }

    #[test]
    fn superseded_primary_result_is_ignored() {
        let mut panel = WorkloadTablePanel::new(WorkloadSpec::daemon_sets(), vars(), 10);
        let old = panel.take_pending_primary().unwrap();
        panel.refresh();
        let new = panel.take_pending_primary().unwrap();

        assert!(!panel.set_primary_result(old.generation, Ok(primary(&["stale"]))));
        assert!(panel.orchestrator().rows().is_empty());
        assert!(panel.set_primary_result(new.generation, Ok(primary(&["fresh"]))));
        assert_eq!(panel.orchestrator().rows()[0].identity, "fresh");
    }

    #[test]
    fn shrinking_result_clamps_page() {
        let mut panel = loaded(&["a", "b", "c", "d", "e"], 2);
        panel.update(&Action::NextPage, &mut state());
        panel.update(&Action::NextPage, &mut state());
        assert_eq!(panel.pagination().page(), 2);

        panel.refresh();
        let request = panel.take_pending_primary().unwrap();
        panel.set_primary_result(request.generation, Ok(primary(&["a"])));
        assert_eq!(panel.pagination().page(), 0);
    }

    #[test]
    fn search_edits_reload_with_new_variable() {
        let mut panel = loaded(&["a"], 10);
        panel.take_pending_secondary();

        panel.update(&Action::Search, &mut state());
        assert!(panel.is_editing());
        for c in "node".chars() {
            assert_eq!(panel.handle_key_event(press(KeyCode::Char(c))), Some(Action::None));
        }
        panel.handle_key_event(press(KeyCode::Enter));

        assert!(!panel.is_editing());
        assert_eq!(
            resolve(panel.variables(), SEARCH_VARIABLE).as_deref(),
            Some("node")
        );
        let request = panel.take_pending_primary().unwrap();
        assert!(request.query.expr.contains(".*node.*"));
    }

    #[test]
    fn keys_pass_through_when_not_editing() {
        let mut panel = loaded(&["a"], 10);
        assert_eq!(panel.handle_key_event(press(KeyCode::Char('q'))), None);
    }

    #[test]
    fn select_expands_and_queues_detail_fetch() {
        let mut panel = loaded(&["a", "b"], 10);
        panel.update(&Action::ScrollDown, &mut state());
        panel.update(&Action::Select, &mut state());

        assert_eq!(panel.expanded_identity(), Some("b"));
        let request = panel.take_pending_expanded().unwrap();
        assert_eq!(request.identity, "b");
        assert!(request.queries[0].expr.contains(r#"daemonset="b""#));

        // Reopening a loaded view does not fetch again
        panel.set_expanded_result("b", Ok(SecondaryResults::new()));
        panel.update(&Action::Back, &mut state());
        panel.update(&Action::Select, &mut state());
        assert!(panel.take_pending_expanded().is_none());

        // Select on the expanded row collapses it
        panel.update(&Action::Select, &mut state());
        assert_eq!(panel.expanded_identity(), None);
    }

    #[test]
    fn render_shows_merged_rows() {
        let mut panel = loaded(&["node-exporter", "kube-proxy"], 10);
        let ticket = panel.take_pending_secondary().remove(0);
        let outcome = panel.set_secondary_result(
            &ticket,
            Ok(SecondaryResults::from([(
                "replicas".to_string(),
                vec![
                    SeriesResult::new("replicas")
                        .with_label("daemonset", "node-exporter")
                        .with_value(3.0),
                ],
            )])),
        );
        assert_eq!(outcome, FetchOutcome::Applied);

        let mut terminal = Terminal::new(TestBackend::new(100, 10)).unwrap();
        terminal
            .draw(|frame| panel.render(frame, frame.area(), &state()))
            .unwrap();

        assert_buffer_contains(&terminal, "DaemonSets - page 1/1 (2 rows)");
        assert_buffer_contains(&terminal, "DAEMONSET");
        assert_buffer_contains(&terminal, "node-exporter");
        assert_buffer_contains(&terminal, "0/3");
        assert_buffer_contains(&terminal, "0/0");
    }

    #[test]
    fn render_shows_primary_error() {
        let mut panel = WorkloadTablePanel::new(WorkloadSpec::jobs(), vars(), 10);
        let request = panel.take_pending_primary().unwrap();
        panel.set_primary_result(
            request.generation,
            Err(QueryError::Status {
                status: 503,
                body: "unavailable".to_string(),
            }),
        );

        let mut terminal = Terminal::new(TestBackend::new(100, 6)).unwrap();
        terminal
            .draw(|frame| panel.render(frame, frame.area(), &state()))
            .unwrap();
        assert_buffer_contains(&terminal, "Error: Datasource returned HTTP 503");
    }

    #[test]
    fn render_shows_expanded_pane() {
        let mut panel = loaded(&["a"], 10);
        panel.update(&Action::Select, &mut state());

        let mut terminal = Terminal::new(TestBackend::new(120, 12)).unwrap();
        terminal
            .draw(|frame| panel.render(frame, frame.area(), &state()))
            .unwrap();
        assert_buffer_contains(&terminal, "a (kube-system)");
        assert_buffer_contains(&terminal, "Loading...");
    }
}
