//! Async event handler for the TUI.
//!
//! Multiplexes crossterm input, the auto-refresh timer and the render timer
//! into a single [`Event`] stream using `tokio::select!`.

use std::time::Duration;

use crossterm::event::{EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub enum Event {
    Key(KeyEvent),
    /// Auto-refresh interval elapsed
    Tick,
    /// Periodic render signal (~30 fps)
    Render,
}

pub struct EventHandler {
    crossterm_stream: EventStream,
    tick_interval: tokio::time::Interval,
    render_interval: tokio::time::Interval,
}

impl EventHandler {
    /// The first tick fires one full `tick_rate` after creation; startup
    /// loads are issued by the app itself.
    pub fn new(tick_rate: Duration) -> Self {
        let render_rate = Duration::from_millis(33);
        let tick_rate = tick_rate.max(Duration::from_secs(1));

        let mut tick_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + tick_rate, tick_rate);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            crossterm_stream: EventStream::new(),
            tick_interval,
            render_interval: tokio::time::interval(render_rate),
        }
    }

    /// Wait for the next event. Cancel safe.
    pub async fn next(&mut self) -> anyhow::Result<Event> {
        loop {
            tokio::select! {
                maybe_event = self.crossterm_stream.next() => {
                    match maybe_event {
                        Some(Ok(crossterm::event::Event::Key(key))) => {
                            // Press only; Windows also reports Release and Repeat
                            if key.kind == KeyEventKind::Press {
                                return Ok(Event::Key(key));
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        _ => {}
                    }
                }
                _ = self.tick_interval.tick() => {
                    return Ok(Event::Tick);
                }
                _ = self.render_interval.tick() => {
                    return Ok(Event::Render);
                }
            }
        }
    }
}
