//! Pure view/render functions for the TUI.
//!
//! Functions here take `&AppState`, draw to a ratatui `Frame`, and never
//! mutate state or return effects.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::diff::{self, SpanKind};
use crate::state::{AppState, Focus, Phase};

/// Height of the one-line status bar.
const STATUS_HEIGHT: u16 = 1;

/// Height of the bordered instruction field.
const INSTRUCTION_HEIGHT: u16 = 3;

/// Height of the input area, borders included.
const INPUT_HEIGHT: u16 = 7;

/// Height of the submit button row.
const BUTTON_HEIGHT: u16 = 1;

/// Height of the key hint line.
const HELP_HEIGHT: u16 = 1;

/// Display width of the first `chars` chars of `s`, for cursor placement.
fn prefix_width(s: &str, chars: usize) -> u16 {
    let byte_idx = s
        .char_indices()
        .nth(chars)
        .map_or(s.len(), |(idx, _)| idx);
    s[..byte_idx].width() as u16
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

/// Renders the entire TUI to the frame.
///
/// Returns the output pane area so the runtime can refresh the scroll
/// dimensions after drawing.
pub fn render(state: &AppState, frame: &mut Frame) -> Rect {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(STATUS_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(INSTRUCTION_HEIGHT),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(BUTTON_HEIGHT),
            Constraint::Length(HELP_HEIGHT),
        ])
        .split(area);

    render_status(state, frame, chunks[0]);
    render_output(state, frame, chunks[1]);
    render_instruction(state, frame, chunks[2]);
    render_input(state, frame, chunks[3]);
    render_submit(state, frame, chunks[4]);
    render_help(frame, chunks[5]);

    chunks[1]
}

fn render_status(state: &AppState, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
        "redraft ",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if state.is_busy() {
        spans.push(Span::styled(
            format!("{} ", state.spinner()),
            Style::default().fg(Color::Magenta),
        ));
    }
    let status_color = match state.phase {
        Phase::Ready => Color::Green,
        _ => Color::Yellow,
    };
    spans.push(Span::styled(
        state.status.clone(),
        Style::default().fg(status_color),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_output(state: &AppState, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Output")
        .border_style(Style::default().fg(Color::DarkGray));

    let text = output_text(state);
    let offset = state.output_scroll.offset();
    frame.render_widget(
        Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((offset as u16, 0)),
        area,
    );
}

/// Number of rows the output pane occupies at the given inner width,
/// counting word-wrapped lines the way the paragraph renders them.
pub fn output_line_count(state: &AppState, width: usize) -> usize {
    output_text(state)
        .lines
        .iter()
        .map(|line| {
            let plain: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
            wrapped_rows(&plain, width)
        })
        .sum()
}

/// Rows a single logical line takes after greedy word wrapping. A word
/// wider than the pane spills over multiple rows.
fn wrapped_rows(line: &str, width: usize) -> usize {
    let width = width.max(1);
    let mut rows = 1;
    let mut used = 0;
    for word in line.split_whitespace() {
        let word_width = word.width();
        let needed = if used == 0 { word_width } else { word_width + 1 };
        if used + needed <= width {
            used += needed;
        } else if word_width <= width {
            rows += 1;
            used = word_width;
        } else {
            // A word wider than the pane breaks across full rows.
            if used > 0 {
                rows += 1;
            }
            let full_rows = (word_width - 1) / width;
            rows += full_rows;
            used = word_width - full_rows * width;
        }
    }
    rows
}

/// Builds the output pane text. While streaming the raw text is shown;
/// once the completion finishes, words that differ from the submitted text
/// are highlighted.
fn output_text(state: &AppState) -> Text<'static> {
    if state.output.is_empty() {
        return Text::from(Span::styled(
            "Corrected text will appear here",
            Style::default().fg(Color::DarkGray),
        ));
    }

    if state.phase == Phase::Inferring {
        return Text::raw(state.output.clone());
    }

    let Some(submitted) = &state.submitted else {
        return Text::raw(state.output.clone());
    };

    let changed_style = Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line<'static>> = vec![Line::default()];
    for span in diff::word_diff(submitted, &state.output) {
        let style = match span.kind {
            SpanKind::Unchanged => Style::default(),
            SpanKind::Changed => changed_style,
        };
        // Spans never cross lines; split on newlines ourselves.
        let mut parts = span.text.split('\n');
        if let Some(first) = parts.next()
            && !first.is_empty()
            && let Some(line) = lines.last_mut()
        {
            line.push_span(Span::styled(first.to_string(), style));
        }
        for part in parts {
            let mut line = Line::default();
            if !part.is_empty() {
                line.push_span(Span::styled(part.to_string(), style));
            }
            lines.push(line);
        }
    }
    Text::from(lines)
}

fn render_instruction(state: &AppState, frame: &mut Frame, area: Rect) {
    let focused = state.focus == Focus::Instruction;
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Instruction")
        .border_style(focus_style(focused));
    let inner = block.inner(area);
    frame.render_widget(
        Paragraph::new(state.instruction.value().to_string()).block(block),
        area,
    );

    if focused {
        let cursor_x = inner.x + prefix_width(state.instruction.value(), state.instruction.cursor());
        frame.set_cursor_position((cursor_x.min(inner.right()), inner.y));
    }
}

fn render_input(state: &AppState, frame: &mut Frame, area: Rect) {
    let focused = state.focus == Focus::Input;
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Text")
        .border_style(focus_style(focused));
    let inner = block.inner(area);
    let text = Text::from(
        state
            .input
            .lines()
            .iter()
            .map(|line| Line::raw(line.clone()))
            .collect::<Vec<_>>(),
    );

    // Keep the cursor row inside the pane by scrolling the text.
    let (row, col) = state.input.cursor();
    let visible = inner.height.max(1) as usize;
    let top = row.saturating_sub(visible - 1);
    frame.render_widget(
        Paragraph::new(text).block(block).scroll((top as u16, 0)),
        area,
    );

    if focused {
        let line = state.input.lines().get(row).map_or("", String::as_str);
        let cursor_x = inner.x + prefix_width(line, col);
        let cursor_y = inner.y + (row - top) as u16;
        frame.set_cursor_position((cursor_x.min(inner.right()), cursor_y));
    }
}

fn render_submit(state: &AppState, frame: &mut Frame, area: Rect) {
    let focused = state.focus == Focus::Submit;
    let style = if focused && state.can_submit() {
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD)
    } else if focused {
        Style::default().fg(Color::Magenta)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    frame.render_widget(
        Paragraph::new(Span::styled("[ Submit ]", style)),
        area,
    );
}

fn render_help(frame: &mut Frame, area: Rect) {
    frame.render_widget(
        Paragraph::new(Span::styled(
            "tab/shift+tab: navigate • enter: submit • ctrl+u: clear • pgup/pgdn: scroll • esc: quit",
            Style::default().fg(Color::DarkGray),
        )),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_rows_short_line() {
        assert_eq!(wrapped_rows("hello", 20), 1);
        assert_eq!(wrapped_rows("", 20), 1);
    }

    #[test]
    fn test_wrapped_rows_breaks_at_word_boundary() {
        assert_eq!(wrapped_rows("aaa bbb ccc", 7), 2);
        assert_eq!(wrapped_rows("aaa bbb ccc", 3), 3);
    }

    #[test]
    fn test_wrapped_rows_oversized_word() {
        assert_eq!(wrapped_rows("aaaaaaaaaa", 4), 3);
        assert_eq!(wrapped_rows("xx aaaaaaaaaa", 4), 4);
    }

    #[test]
    fn test_output_line_count_spans_logical_lines() {
        let mut state = AppState::new(redraft_core::config::Config::default());
        state.phase = Phase::Inferring;
        state.output = "one two\nthree".to_string();
        assert_eq!(output_line_count(&state, 20), 2);
        assert_eq!(output_line_count(&state, 4), 4);
    }
}
