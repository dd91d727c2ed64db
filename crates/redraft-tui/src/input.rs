//! Minimal text editing widgets for the input form.
//!
//! Two flavors: a single-line `TextField` for the instruction and a
//! multi-line `TextArea` for the text to edit. Both track a char-based
//! cursor and handle the subset of editing keys the form needs.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map_or(s.len(), |(byte_idx, _)| byte_idx)
}

/// Single-line editable field.
#[derive(Debug, Clone, Default)]
pub struct TextField {
    value: String,
    cursor: usize,
}

impl TextField {
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in char units.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn handle_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let byte_idx = char_to_byte_index(&self.value, self.cursor);
                self.value.insert(byte_idx, ch);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let byte_idx = char_to_byte_index(&self.value, self.cursor);
                self.value.remove(byte_idx);
            }
            KeyCode::Delete if self.cursor < self.value.chars().count() => {
                let byte_idx = char_to_byte_index(&self.value, self.cursor);
                self.value.remove(byte_idx);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.value.chars().count());
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => {}
        }
    }
}

/// Multi-line editable area with a (row, col) cursor in char units.
#[derive(Debug, Clone)]
pub struct TextArea {
    lines: Vec<String>,
    cursor_row: usize,
    cursor_col: usize,
}

impl Default for TextArea {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_row: 0,
            cursor_col: 0,
        }
    }
}

impl TextArea {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    /// Full buffer contents with newline separators.
    pub fn value(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(String::is_empty)
    }

    pub fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    pub fn handle_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(ch);
            }
            KeyCode::Enter => self.insert_newline(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Up => self.move_up(),
            KeyCode::Down => self.move_down(),
            KeyCode::Home => self.cursor_col = 0,
            KeyCode::End => self.cursor_col = self.line_len(self.cursor_row),
            _ => {}
        }
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines.get(row).map_or(0, |line| line.chars().count())
    }

    fn insert_char(&mut self, ch: char) {
        let line = &mut self.lines[self.cursor_row];
        let byte_idx = char_to_byte_index(line, self.cursor_col);
        line.insert(byte_idx, ch);
        self.cursor_col += 1;
    }

    fn insert_newline(&mut self) {
        let line = &mut self.lines[self.cursor_row];
        let byte_idx = char_to_byte_index(line, self.cursor_col);
        let rest = line.split_off(byte_idx);
        self.lines.insert(self.cursor_row + 1, rest);
        self.cursor_row += 1;
        self.cursor_col = 0;
    }

    fn backspace(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
            let line = &mut self.lines[self.cursor_row];
            let byte_idx = char_to_byte_index(line, self.cursor_col);
            line.remove(byte_idx);
        } else if self.cursor_row > 0 {
            // Join with the previous line.
            let removed = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.line_len(self.cursor_row);
            self.lines[self.cursor_row].push_str(&removed);
        }
    }

    fn move_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.line_len(self.cursor_row);
        }
    }

    fn move_right(&mut self) {
        if self.cursor_col < self.line_len(self.cursor_row) {
            self.cursor_col += 1;
        } else if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = 0;
        }
    }

    fn move_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_row));
        }
    }

    fn move_down(&mut self) {
        if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_row));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_field_insert_and_backspace() {
        let mut field = TextField::default();
        for ch in "fix".chars() {
            field.handle_key(&key(KeyCode::Char(ch)));
        }
        assert_eq!(field.value(), "fix");

        field.handle_key(&key(KeyCode::Backspace));
        assert_eq!(field.value(), "fi");
        assert_eq!(field.cursor(), 2);
    }

    #[test]
    fn test_field_insert_mid_string() {
        let mut field = TextField::with_value("ac");
        field.handle_key(&key(KeyCode::Left));
        field.handle_key(&key(KeyCode::Char('b')));
        assert_eq!(field.value(), "abc");
    }

    #[test]
    fn test_field_multibyte_chars() {
        let mut field = TextField::with_value("héllo");
        field.handle_key(&key(KeyCode::Home));
        field.handle_key(&key(KeyCode::Right));
        field.handle_key(&key(KeyCode::Delete));
        assert_eq!(field.value(), "hllo");
    }

    #[test]
    fn test_area_newline_splits_line() {
        let mut area = TextArea::default();
        for ch in "ab".chars() {
            area.handle_key(&key(KeyCode::Char(ch)));
        }
        area.handle_key(&key(KeyCode::Left));
        area.handle_key(&key(KeyCode::Enter));

        assert_eq!(area.lines(), ["a", "b"]);
        assert_eq!(area.cursor(), (1, 0));
        assert_eq!(area.value(), "a\nb");
    }

    #[test]
    fn test_area_backspace_joins_lines() {
        let mut area = TextArea::default();
        for ch in "ab".chars() {
            area.handle_key(&key(KeyCode::Char(ch)));
        }
        area.handle_key(&key(KeyCode::Enter));
        area.handle_key(&key(KeyCode::Char('c')));
        area.handle_key(&key(KeyCode::Home));
        area.handle_key(&key(KeyCode::Backspace));

        assert_eq!(area.lines(), ["abc"]);
        assert_eq!(area.cursor(), (0, 2));
    }

    #[test]
    fn test_area_clear_resets_cursor() {
        let mut area = TextArea::default();
        for ch in "ab".chars() {
            area.handle_key(&key(KeyCode::Char(ch)));
        }
        area.handle_key(&key(KeyCode::Enter));
        area.handle_key(&key(KeyCode::Char('c')));

        area.clear();

        assert!(area.is_empty());
        assert_eq!(area.cursor(), (0, 0));
        area.handle_key(&key(KeyCode::Char('x')));
        assert_eq!(area.value(), "x");
    }

    #[test]
    fn test_area_is_empty() {
        let mut area = TextArea::default();
        assert!(area.is_empty());
        area.handle_key(&key(KeyCode::Enter));
        assert!(area.is_empty());
        area.handle_key(&key(KeyCode::Char('x')));
        assert!(!area.is_empty());
    }

    #[test]
    fn test_area_vertical_movement_clamps_column() {
        let mut area = TextArea::default();
        for ch in "long line".chars() {
            area.handle_key(&key(KeyCode::Char(ch)));
        }
        area.handle_key(&key(KeyCode::Enter));
        for ch in "ab".chars() {
            area.handle_key(&key(KeyCode::Char(ch)));
        }
        area.handle_key(&key(KeyCode::Up));
        assert_eq!(area.cursor(), (0, 2));
        area.handle_key(&key(KeyCode::End));
        area.handle_key(&key(KeyCode::Down));
        assert_eq!(area.cursor(), (1, 2));
    }
}
