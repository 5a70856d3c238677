//! Rolling prompt context for the recognizer.
//!
//! A bounded FIFO window of recent words drawn from both finalized
//! transcriptions and incoming text messages. The window is handed to
//! the worker as a decoding hint on each outbound segment.

use std::collections::VecDeque;

pub struct PromptContext {
    base: String,
    window: VecDeque<String>,
    cap: usize,
}

impl PromptContext {
    pub fn new(base: impl Into<String>, cap: usize) -> Self {
        Self {
            base: base.into(),
            window: VecDeque::new(),
            cap,
        }
    }

    /// Feeds text into the window, evicting the oldest words past the cap.
    pub fn push_text(&mut self, text: &str) {
        for word in text.split_whitespace() {
            self.window.push_back(word.to_string());
        }
        while self.window.len() > self.cap {
            self.window.pop_front();
        }
    }

    /// Number of words currently in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Composes the base prompt and the current window into one hint, or
    /// `None` when there is nothing to say.
    pub fn snapshot(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::with_capacity(1 + self.window.len());
        if !self.base.is_empty() {
            parts.push(&self.base);
        }
        for word in &self.window {
            parts.push(word);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
