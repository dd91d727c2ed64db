//! UI effect types.
//!
//! Effects are commands returned by the reducer for the runtime to execute.
//! The reducer stays pure: it mutates state and returns effects, never
//! performs I/O or spawns tasks directly.

/// Effects returned by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    /// Quit the application.
    Quit,

    /// Start a streaming completion for the assembled prompt.
    StartCompletion { prompt: String },
}
