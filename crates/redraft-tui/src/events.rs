//! UI event types.
//!
//! All external inputs are converted to `UiEvent` before being processed by
//! the reducer: terminal input, server status updates, and completion chunks.
//! Async work follows the inbox pattern: tasks send their events straight to
//! the runtime's inbox channel and the runtime drains it each frame.

use crossterm::event::Event as CrosstermEvent;
use redraft_core::client::CompletionChunk;
use redraft_core::server::status::StatusEvent;

/// Unified event enum for the TUI.
#[derive(Debug)]
pub enum UiEvent {
    /// Raw terminal input (keys, resize).
    Terminal(CrosstermEvent),

    /// Periodic tick for spinner animation and render cadence.
    Tick,

    /// Server status update from the readiness monitor.
    Status(StatusEvent),

    /// The status channel closed; the monitor session is over.
    StatusClosed,

    /// One streamed fragment of the running completion.
    Chunk(CompletionChunk),

    /// The completion stream ended normally.
    StreamClosed,

    /// The completion failed to start or broke mid-stream.
    StreamFailed { error: String },
}
