//! Main TUI application: owns the event loop, the terminal and the fetch
//! tasks.
//!
//! Tables live on the loop task and are never shared. Queries run on spawned
//! tasks that only own the runner and their request, and report back over a
//! channel that the loop drains between events.

use std::sync::Arc;

use anyhow::Context;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use tokio::sync::mpsc;

use common::config::Configuration;
use workload_table::variables::{
    CLUSTER_VARIABLE, DATASOURCE_VARIABLE, NAMESPACE_VARIABLE, top_level,
};
use workload_table::{
    FetchOutcome, FetchTicket, QueryError, QueryRunner, SecondaryResults, TimeRange, resolve,
    run_fetch,
};

use crate::action::{Action, map_key_to_action};
use crate::components::Component;
use crate::components::status_bar::StatusBar;
use crate::components::tabs::TabBar;
use crate::components::workload_table::WorkloadTablePanel;
use crate::event::{Event, EventHandler};
use crate::state::AppState;
use crate::terminal::Tui;

/// A finished query, addressed to the panel of tab `tab`.
#[derive(Debug)]
pub enum FetchMessage {
    Primary {
        tab: usize,
        generation: u64,
        result: Result<SecondaryResults, QueryError>,
    },
    Secondary {
        tab: usize,
        ticket: FetchTicket,
        result: Result<SecondaryResults, QueryError>,
    },
    Expanded {
        tab: usize,
        identity: String,
        result: Result<SecondaryResults, QueryError>,
    },
}

pub struct App {
    runner: Arc<dyn QueryRunner>,
    lookback: std::time::Duration,
    range: TimeRange,
    running: bool,
    pub state: AppState,
    tab_bar: TabBar,
    status_bar: StatusBar,
    panels: Vec<WorkloadTablePanel>,
    tx: mpsc::UnboundedSender<FetchMessage>,
    rx: mpsc::UnboundedReceiver<FetchMessage>,
}

impl App {
    /// Build one panel per tab, each with its own variable set.
    pub fn new(config: &Configuration, runner: Arc<dyn QueryRunner>) -> anyhow::Result<Self> {
        let variables = top_level(config).context("Failed to resolve datasource")?;

        let state = AppState::new(
            resolve(&variables, DATASOURCE_VARIABLE).unwrap_or_default(),
            resolve(&variables, CLUSTER_VARIABLE).unwrap_or_default(),
            resolve(&variables, NAMESPACE_VARIABLE).unwrap_or_default(),
            config.table.refresh_interval,
        );

        let panels = state
            .available_tabs
            .iter()
            .map(|tab| {
                WorkloadTablePanel::new(
                    tab.kind().spec(),
                    variables.clone(),
                    config.table.page_size,
                )
            })
            .collect();

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            runner,
            lookback: config.query.lookback,
            range: TimeRange::last(config.query.lookback),
            running: true,
            state,
            tab_bar: TabBar::new(),
            status_bar: StatusBar::new(),
            panels,
            tx,
            rx,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_panel(&self) -> &WorkloadTablePanel {
        &self.panels[self.state.active_index()]
    }

    fn active_panel_mut(&mut self) -> &mut WorkloadTablePanel {
        let index = self.state.active_index();
        &mut self.panels[index]
    }

    /// Run the main event loop until quit.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut tui = Tui::new()?;
        tui.init()?;

        let result = self.event_loop(&mut tui).await;

        tui.exit()?;
        result
    }

    async fn event_loop(&mut self, tui: &mut Tui) -> anyhow::Result<()> {
        let mut events = EventHandler::new(self.state.refresh_interval);
        self.dispatch_pending();

        while self.running {
            tokio::select! {
                event = events.next() => match event? {
                    Event::Key(key) => {
                        let action = match self.active_panel_mut().handle_key_event(key) {
                            Some(action) => action,
                            None => map_key_to_action(key),
                        };
                        self.handle_action(action);
                    }
                    Event::Tick => self.handle_action(Action::Refresh),
                    Event::Render => {
                        tui.terminal.draw(|frame| self.render(frame))?;
                    }
                },
                Some(message) = self.rx.recv() => self.handle_message(message),
            }
            self.dispatch_pending();
        }

        Ok(())
    }

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::SwitchTab(idx) => self.state.switch_tab(idx),
            Action::NextTab => self.state.next_tab(),
            Action::PrevTab => self.state.prev_tab(),
            Action::Refresh => {
                self.range = TimeRange::last(self.lookback);
                self.state.clear_error();
                self.dispatch_to_active(&action);
            }
            Action::ScrollUp
            | Action::ScrollDown
            | Action::NextPage
            | Action::PrevPage
            | Action::Select
            | Action::Back
            | Action::Search => self.dispatch_to_active(&action),
            Action::None => {}
        }
        self.sync_state();
    }

    fn dispatch_to_active(&mut self, action: &Action) {
        let index = self.state.active_index();
        self.panels[index].update(action, &mut self.state);
    }

    /// Apply a finished query to its panel.
    pub fn handle_message(&mut self, message: FetchMessage) {
        match message {
            FetchMessage::Primary {
                tab,
                generation,
                result,
            } => {
                let failed = result.as_ref().err().map(ToString::to_string);
                let Some(panel) = self.panels.get_mut(tab) else {
                    return;
                };
                if panel.set_primary_result(generation, result) {
                    match failed {
                        Some(error) => self.state.set_error(error),
                        None => self.state.mark_refreshed(),
                    }
                }
            }
            FetchMessage::Secondary {
                tab,
                ticket,
                result,
            } => {
                let failed = result.as_ref().err().map(ToString::to_string);
                let Some(panel) = self.panels.get_mut(tab) else {
                    return;
                };
                if panel.set_secondary_result(&ticket, result) == FetchOutcome::Failed {
                    if let Some(error) = failed {
                        self.state.set_error(error);
                    }
                }
            }
            FetchMessage::Expanded {
                tab,
                identity,
                result,
            } => {
                if let Some(panel) = self.panels.get_mut(tab) {
                    panel.set_expanded_result(&identity, result);
                }
            }
        }
        self.sync_state();
    }

    /// Start the queries the active panel has queued. Other tabs keep theirs
    /// until they are shown.
    pub fn dispatch_pending(&mut self) {
        let tab = self.state.active_index();
        let range = self.range;
        let panel = &mut self.panels[tab];
        if !panel.has_pending() {
            return;
        }

        if let Some(request) = panel.take_pending_primary() {
            let runner = self.runner.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = runner
                    .run(std::slice::from_ref(&request.query), &range, &request.datasource)
                    .await;
                let _ = tx.send(FetchMessage::Primary {
                    tab,
                    generation: request.generation,
                    result,
                });
            });
        }

        for ticket in panel.take_pending_secondary() {
            let runner = self.runner.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = run_fetch(runner.as_ref(), &ticket, &range).await;
                let _ = tx.send(FetchMessage::Secondary {
                    tab,
                    ticket,
                    result,
                });
            });
        }

        if let Some(request) = panel.take_pending_expanded() {
            let runner = self.runner.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let result = runner
                    .run(&request.queries, &range, &request.datasource)
                    .await;
                let _ = tx.send(FetchMessage::Expanded {
                    tab,
                    identity: request.identity,
                    result,
                });
            });
        }
    }

    /// Wait for the next finished query. Used by tests to drive the loop.
    pub async fn next_message(&mut self) -> Option<FetchMessage> {
        self.rx.recv().await
    }

    fn sync_state(&mut self) {
        self.state.table_phase = self.active_panel().phase().to_string();
    }

    fn render(&self, frame: &mut Frame) {
        let [tabs, body, status] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.tab_bar.render(frame, tabs, &self.state);
        self.active_panel().render(frame, body, &self.state);
        self.status_bar.render(frame, status, &self.state);
    }
}
