//! Pure reducer: `(state, event) -> effects`.
//!
//! All state mutation happens here. The runtime executes the returned
//! effects; the renderer reads the state afterwards.

use crossterm::event::{Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use redraft_core::client::CompletionChunk;
use redraft_core::server::status::{StatusEvent, StatusKind};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::{AppState, Focus, Phase};

pub fn update(state: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Terminal(term_event) => handle_terminal_event(state, &term_event),
        UiEvent::Tick => {
            if state.is_busy() {
                state.spinner_frame = state.spinner_frame.wrapping_add(1);
            }
            Vec::new()
        }
        UiEvent::Status(status) => handle_status_event(state, status),
        UiEvent::StatusClosed => {
            if state.phase == Phase::Starting {
                state.phase = Phase::Failed {
                    message: "llama-server stopped before becoming ready".to_string(),
                };
                return vec![UiEffect::Quit];
            }
            Vec::new()
        }
        UiEvent::Chunk(chunk) => handle_chunk(state, &chunk),
        UiEvent::StreamClosed => {
            if state.phase == Phase::Inferring {
                state.phase = Phase::Ready;
                state.status = "Ready".to_string();
            }
            Vec::new()
        }
        UiEvent::StreamFailed { error } => {
            // Recoverable: the server is still up, the user can retry.
            if state.phase == Phase::Inferring {
                state.phase = Phase::Ready;
            }
            state.status = error;
            Vec::new()
        }
    }
}

fn handle_status_event(state: &mut AppState, status: StatusEvent) -> Vec<UiEffect> {
    match status.kind {
        StatusKind::Progress => {
            state.status = status.message;
        }
        StatusKind::Ready => {
            if state.phase == Phase::Starting {
                state.phase = Phase::Ready;
            }
            state.status = status.message;
        }
        StatusKind::Error => {
            // Fatal: the caller stops the server and reports the message
            // once the terminal is restored.
            state.status.clone_from(&status.message);
            state.phase = Phase::Failed {
                message: status.message,
            };
            return vec![UiEffect::Quit];
        }
    }
    Vec::new()
}

fn handle_chunk(state: &mut AppState, chunk: &CompletionChunk) -> Vec<UiEffect> {
    if state.phase == Phase::Inferring {
        state.output.push_str(&chunk.content);
    }
    Vec::new()
}

fn handle_terminal_event(state: &mut AppState, event: &CrosstermEvent) -> Vec<UiEffect> {
    let CrosstermEvent::Key(key) = event else {
        return Vec::new();
    };
    if key.kind != KeyEventKind::Press {
        return Vec::new();
    }
    handle_key(state, key)
}

fn handle_key(state: &mut AppState, key: &KeyEvent) -> Vec<UiEffect> {
    let is_ctrl_c =
        key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
    if is_ctrl_c || key.code == KeyCode::Esc {
        return vec![UiEffect::Quit];
    }

    match key.code {
        KeyCode::Tab => {
            state.focus = state.focus.next();
            Vec::new()
        }
        KeyCode::BackTab => {
            state.focus = state.focus.previous();
            Vec::new()
        }
        KeyCode::Enter if state.focus == Focus::Submit => submit(state),
        KeyCode::Enter if state.focus == Focus::Instruction => {
            state.focus = Focus::Submit;
            Vec::new()
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            match state.focus {
                Focus::Input => state.input.clear(),
                Focus::Instruction => state.instruction.clear(),
                Focus::Submit => {}
            }
            Vec::new()
        }
        KeyCode::PageUp => {
            state.output_scroll.page_up();
            Vec::new()
        }
        KeyCode::PageDown => {
            state.output_scroll.page_down();
            Vec::new()
        }
        _ => {
            match state.focus {
                Focus::Input => state.input.handle_key(key),
                Focus::Instruction => state.instruction.handle_key(key),
                Focus::Submit => {}
            }
            Vec::new()
        }
    }
}

fn submit(state: &mut AppState) -> Vec<UiEffect> {
    if !state.can_submit() {
        return Vec::new();
    }

    let text = state.input.value();
    let prompt = format!("{}: {}", state.instruction.value(), text);

    state.phase = Phase::Inferring;
    state.status = "Inferring".to_string();
    state.output.clear();
    state.output_scroll.scroll_to_bottom();
    state.submitted = Some(text);

    vec![UiEffect::StartCompletion { prompt }]
}
