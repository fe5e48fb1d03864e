/// Multiline text with a byte cursor that always sits on a char boundary. Backs
/// both the chat composer and the file editor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces the content and parks the cursor at the start.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = self.prev_boundary(self.cursor);
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        if self.cursor >= self.text.len() {
            return false;
        }
        let next = self.next_boundary(self.cursor);
        self.text.drain(self.cursor..next);
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary(self.cursor);
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary(self.cursor);
    }

    pub fn move_home(&mut self) {
        self.cursor = self.line_start(self.cursor);
    }

    pub fn move_end(&mut self) {
        self.cursor = self.line_end(self.cursor);
    }

    pub fn move_up(&mut self) {
        let start = self.line_start(self.cursor);
        if start == 0 {
            self.cursor = 0;
            return;
        }
        let column = self.text[start..self.cursor].chars().count();
        let prev_start = self.line_start(start - 1);
        self.cursor = self.offset_in_line(prev_start, column);
    }

    pub fn move_down(&mut self) {
        let end = self.line_end(self.cursor);
        if end >= self.text.len() {
            self.cursor = self.text.len();
            return;
        }
        let column = self.text[self.line_start(self.cursor)..self.cursor]
            .chars()
            .count();
        self.cursor = self.offset_in_line(end + 1, column);
    }

    /// Zero-based (line, column) of the cursor, column counted in chars.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let line = before.matches('\n').count();
        let column = before[self.line_start(self.cursor)..].chars().count();
        (line, column)
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    fn offset_in_line(&self, line_start: usize, column: usize) -> usize {
        let line_end = self.line_end(line_start);
        self.text[line_start..line_end]
            .char_indices()
            .nth(column)
            .map(|(i, _)| line_start + i)
            .unwrap_or(line_end)
    }

    fn line_start(&self, at: usize) -> usize {
        self.text[..at].rfind('\n').map(|i| i + 1).unwrap_or(0)
    }

    fn line_end(&self, at: usize) -> usize {
        self.text[at..]
            .find('\n')
            .map(|i| at + i)
            .unwrap_or(self.text.len())
    }

    fn prev_boundary(&self, at: usize) -> usize {
        self.text[..at]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self, at: usize) -> usize {
        self.text[at..]
            .chars()
            .next()
            .map(|c| at + c.len_utf8())
            .unwrap_or(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        for c in text.chars() {
            if c == '\n' {
                buffer.insert_newline();
            } else {
                buffer.insert_char(c);
            }
        }
        buffer
    }

    #[test]
    fn editing_respects_multibyte_chars() {
        let mut buffer = typed("caf\u{e9}");
        assert!(buffer.backspace());
        assert_eq!(buffer.text(), "caf");
        buffer.move_left();
        buffer.insert_char('\u{4e2d}');
        assert_eq!(buffer.text(), "ca\u{4e2d}f");
        assert!(buffer.delete_forward());
        assert_eq!(buffer.text(), "ca\u{4e2d}");
        assert!(!buffer.delete_forward());
    }

    #[test]
    fn vertical_moves_keep_column_when_possible() {
        let mut buffer = typed("first line\nab\nthird");
        assert_eq!(buffer.cursor_position(), (2, 5));
        buffer.move_up();
        assert_eq!(buffer.cursor_position(), (1, 2));
        buffer.move_up();
        assert_eq!(buffer.cursor_position(), (0, 2));
        buffer.move_up();
        assert_eq!(buffer.cursor_position(), (0, 0));
        buffer.move_down();
        buffer.move_down();
        buffer.move_down();
        assert_eq!(buffer.cursor_position(), (2, 5));
    }

    #[test]
    fn home_end_stay_on_current_line() {
        let mut buffer = typed("one\ntwo");
        buffer.move_home();
        assert_eq!(buffer.cursor_position(), (1, 0));
        buffer.move_left();
        assert_eq!(buffer.cursor_position(), (0, 3));
        buffer.move_home();
        buffer.move_end();
        assert_eq!(buffer.cursor_position(), (0, 3));
    }

    #[test]
    fn set_text_and_take_reset_cursor() {
        let mut buffer = typed("draft");
        buffer.set_text("loaded\nfile");
        assert_eq!(buffer.cursor_position(), (0, 0));
        assert_eq!(buffer.line_count(), 2);
        assert_eq!(buffer.take(), "loaded\nfile");
        assert!(buffer.is_empty());
        assert!(!buffer.backspace());
    }
}
