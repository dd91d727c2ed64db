//! TUI runtime: owns the terminal, runs the event loop, executes effects.
//!
//! This is the "Elm runtime" boundary: all side effects happen here. The
//! reducer stays pure and produces effects; this module executes them.
//!
//! ## Inbox Pattern
//!
//! Async work sends `UiEvent`s to the inbox channel; the loop drains the
//! inbox each frame, blocking only in `crossterm::event::poll` with a
//! tick-derived deadline. The server status monitor is bridged into the
//! inbox by a forwarder task at startup.

use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use futures_util::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use redraft_core::client::{CompletionClient, CompletionRequest};
use redraft_core::config::Config;
use redraft_core::server::status::StatusEvent;
use tokio::sync::mpsc;
use tracing::debug;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::{render, terminal, update};

/// Tick cadence while the spinner is animating or a stream is running.
const BUSY_TICK: Duration = Duration::from_millis(100);

/// Tick cadence when nothing is happening.
const IDLE_TICK: Duration = Duration::from_millis(250);

type UiEventSender = mpsc::UnboundedSender<UiEvent>;
type UiEventReceiver = mpsc::UnboundedReceiver<UiEvent>;

/// Full-screen TUI runtime.
///
/// Owns the terminal and state. The caller is responsible for the server
/// process lifecycle; the runtime only talks to it over HTTP.
pub struct TuiRuntime {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub state: AppState,
    client: CompletionClient,
    inbox_tx: UiEventSender,
    inbox_rx: UiEventReceiver,
    last_tick: Instant,
}

impl TuiRuntime {
    /// Creates the runtime and takes over the terminal.
    ///
    /// `status_rx` is the server monitor's channel; it is forwarded into
    /// the inbox so status updates flow through the reducer like any other
    /// event.
    pub fn new(
        config: Config,
        base_url: &str,
        status_rx: mpsc::Receiver<StatusEvent>,
    ) -> Result<Self> {
        terminal::install_panic_hook();
        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        forward_status_events(status_rx, inbox_tx.clone());

        Ok(Self {
            terminal,
            state: AppState::new(config),
            client: CompletionClient::new(base_url),
            inbox_tx,
            inbox_rx,
            last_tick: Instant::now(),
        })
    }

    /// Runs the main event loop until quit, then restores the terminal.
    pub fn run(&mut self) -> Result<()> {
        let result = self.event_loop();
        let restore = terminal::restore_terminal();
        result.and(restore)
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.should_quit {
            let events = self.collect_events()?;

            for event in events {
                if !matches!(event, UiEvent::Tick) {
                    dirty = true;
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if !self.state.should_quit && (dirty || self.state.is_busy()) {
                let mut output_area = Rect::default();
                self.terminal.draw(|frame| {
                    output_area = render::render(&self.state, frame);
                })?;
                // Refresh scroll dimensions from what was actually drawn.
                let inner_width = output_area.width.saturating_sub(2).max(1) as usize;
                let inner_height = output_area.height.saturating_sub(2) as usize;
                let line_count = render::output_line_count(&self.state, inner_width);
                self.state
                    .output_scroll
                    .update_layout(line_count, inner_height);
                dirty = false;
            }
        }

        Ok(())
    }

    /// Collects events from the inbox and the terminal.
    ///
    /// Blocks only in `event::poll`, for at most the time until the next
    /// tick is due, so async events are picked up promptly without a busy
    /// loop.
    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        while let Ok(ev) = self.inbox_rx.try_recv() {
            events.push(ev);
        }

        let tick_interval = if self.state.is_busy() {
            BUSY_TICK
        } else {
            IDLE_TICK
        };
        let poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            // Drain any remaining buffered input without blocking.
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => {
                self.state.should_quit = true;
            }
            UiEffect::StartCompletion { prompt } => {
                let request = CompletionRequest {
                    prompt,
                    temperature: self.state.config.temperature,
                    n_predict: self.state.config.n_predict,
                };
                spawn_completion(self.client.clone(), request, self.inbox_tx.clone());
            }
        }
    }
}

/// Forwards status events into the inbox, followed by `StatusClosed` when
/// the monitor channel closes.
fn forward_status_events(mut status_rx: mpsc::Receiver<StatusEvent>, tx: UiEventSender) {
    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            if tx.send(UiEvent::Status(status)).is_err() {
                return;
            }
        }
        let _ = tx.send(UiEvent::StatusClosed);
    });
}

/// Runs one completion and streams its chunks into the inbox.
fn spawn_completion(client: CompletionClient, request: CompletionRequest, tx: UiEventSender) {
    tokio::spawn(async move {
        let mut stream = match client.complete(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.send(UiEvent::StreamFailed {
                    error: e.to_string(),
                });
                return;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if tx.send(UiEvent::Chunk(chunk)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(UiEvent::StreamFailed {
                        error: e.to_string(),
                    });
                    return;
                }
            }
        }
        debug!("Completion stream finished");
        let _ = tx.send(UiEvent::StreamClosed);
    });
}
