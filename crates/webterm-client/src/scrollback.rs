//! Bounded scrollback for replay after a reconnect.
//!
//! Capacity is counted in characters. Appending past the cap drops the
//! oldest characters so the buffer always holds the most recent suffix.

/// Default scrollback capacity per session, in characters.
pub const MAX_SCROLLBACK: usize = 200_000;

/// Sliding-window text buffer.
#[derive(Debug, Clone)]
pub struct ScrollbackBuffer {
    text: String,
    /// Number of chars in `text`.
    len: usize,
    capacity: usize,
}

impl Default for ScrollbackBuffer {
    fn default() -> Self {
        Self::new(MAX_SCROLLBACK)
    }
}

impl ScrollbackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            len: 0,
            capacity,
        }
    }

    /// Append text, trimming from the front if the cap is exceeded.
    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.text.push_str(chunk);
        self.len += chunk.chars().count();

        if self.len > self.capacity {
            let excess = self.len - self.capacity;
            let cut = self
                .text
                .char_indices()
                .nth(excess)
                .map(|(idx, _)| idx)
                .unwrap_or(self.text.len());
            self.text.drain(..cut);
            self.len = self.capacity;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.len = 0;
    }
}
