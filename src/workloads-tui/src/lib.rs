//! Terminal host for the workload tables.

pub mod action;
pub mod app;
pub mod components;
pub mod event;
pub mod state;
pub mod terminal;

pub use app::App;

#[cfg(test)]
pub mod test_helpers;
