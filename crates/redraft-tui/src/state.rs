//! Application state for the editing session.
//!
//! The reducer in [`crate::update`] is the sole mutator; the runtime and
//! renderer only read.

use redraft_core::config::Config;

use crate::input::{TextArea, TextField};

/// Spinner frames for the status line.
pub const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

/// Lifecycle of the editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the server to become ready. Input is editable but
    /// submission is gated.
    Starting,
    /// Server is up; submissions are allowed.
    Ready,
    /// A completion is streaming; further submissions are gated.
    Inferring,
    /// The server failed. The session ends and the message becomes the
    /// process error.
    Failed { message: String },
}

/// Scroll mode for the output pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollMode {
    /// Stick to the bottom as new content streams in.
    FollowLatest,
    /// User scrolled manually; offset is a line index from the top.
    Anchored { offset: usize },
}

/// Scroll state for the output pane.
///
/// The line count and viewport height are cached from the last render;
/// the reducer only switches modes.
#[derive(Debug, Clone)]
pub struct ScrollState {
    pub mode: ScrollMode,
    cached_line_count: usize,
    viewport_height: usize,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            mode: ScrollMode::FollowLatest,
            cached_line_count: 0,
            viewport_height: 0,
        }
    }
}

impl ScrollState {
    pub fn is_following(&self) -> bool {
        matches!(self.mode, ScrollMode::FollowLatest)
    }

    /// Current offset for rendering, clamped to the valid range.
    pub fn offset(&self) -> usize {
        let max_offset = self.cached_line_count.saturating_sub(self.viewport_height);
        match &self.mode {
            ScrollMode::FollowLatest => max_offset,
            ScrollMode::Anchored { offset } => (*offset).min(max_offset),
        }
    }

    /// Scrolls up by one page and anchors.
    pub fn page_up(&mut self) {
        let page = self.viewport_height.max(1);
        self.mode = ScrollMode::Anchored {
            offset: self.offset().saturating_sub(page),
        };
    }

    /// Scrolls down by one page; reaching the bottom resumes following.
    pub fn page_down(&mut self) {
        if self.is_following() {
            return;
        }
        let page = self.viewport_height.max(1);
        let max_offset = self.cached_line_count.saturating_sub(self.viewport_height);
        let new_offset = (self.offset() + page).min(max_offset);
        self.mode = if new_offset >= max_offset {
            ScrollMode::FollowLatest
        } else {
            ScrollMode::Anchored { offset: new_offset }
        };
    }

    pub fn scroll_to_bottom(&mut self) {
        self.mode = ScrollMode::FollowLatest;
    }

    /// Refreshes the cached dimensions after a render.
    pub fn update_layout(&mut self, line_count: usize, viewport_height: usize) {
        self.cached_line_count = line_count;
        self.viewport_height = viewport_height;
    }
}

/// Which form element receives input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Instruction,
    Submit,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Input => Focus::Instruction,
            Focus::Instruction => Focus::Submit,
            Focus::Submit => Focus::Input,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Focus::Input => Focus::Submit,
            Focus::Instruction => Focus::Input,
            Focus::Submit => Focus::Instruction,
        }
    }
}

/// Combined application state.
pub struct AppState {
    pub config: Config,
    pub phase: Phase,
    pub focus: Focus,
    /// Latest status message from the server monitor.
    pub status: String,
    /// Text to edit.
    pub input: TextArea,
    /// Instruction for the model.
    pub instruction: TextField,
    /// Accumulated output of the current or last completion.
    pub output: String,
    /// The input text as it was at the last submission, for diffing.
    pub submitted: Option<String>,
    /// Scroll position of the output pane.
    pub output_scroll: ScrollState,
    pub spinner_frame: usize,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let instruction = TextField::with_value(&config.instruction);
        Self {
            config,
            phase: Phase::Starting,
            focus: Focus::Input,
            status: "Starting llama-server".to_string(),
            input: TextArea::default(),
            instruction,
            output: String::new(),
            submitted: None,
            output_scroll: ScrollState::default(),
            spinner_frame: 0,
            should_quit: false,
        }
    }

    /// Whether a submission is currently allowed.
    pub fn can_submit(&self) -> bool {
        self.phase == Phase::Ready && !self.input.is_empty()
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    /// Whether the status line should animate.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Starting | Phase::Inferring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_mode_shows_bottom() {
        let mut scroll = ScrollState::default();
        scroll.update_layout(40, 10);
        assert!(scroll.is_following());
        assert_eq!(scroll.offset(), 30);
    }

    #[test]
    fn test_page_up_anchors() {
        let mut scroll = ScrollState::default();
        scroll.update_layout(40, 10);
        scroll.page_up();
        assert!(!scroll.is_following());
        assert_eq!(scroll.offset(), 20);
    }

    #[test]
    fn test_page_down_resumes_following_at_bottom() {
        let mut scroll = ScrollState::default();
        scroll.update_layout(40, 10);
        scroll.page_up();
        scroll.page_down();
        assert!(scroll.is_following());
    }

    #[test]
    fn test_anchored_offset_clamps_when_viewport_grows() {
        let mut scroll = ScrollState::default();
        scroll.update_layout(40, 10);
        scroll.page_up();
        scroll.page_up();
        assert_eq!(scroll.offset(), 10);
        scroll.update_layout(40, 35);
        assert_eq!(scroll.offset(), 5);
    }

    #[test]
    fn test_short_content_never_scrolls() {
        let mut scroll = ScrollState::default();
        scroll.update_layout(3, 10);
        assert_eq!(scroll.offset(), 0);
        scroll.page_up();
        assert_eq!(scroll.offset(), 0);
    }
}
