//! Per-chat conversation memory.
//!
//! One instance per chat session, owned by the state registry and passed
//! explicitly into each pipeline invocation. Never a process-wide
//! singleton shared across chats.

/// Accumulator of `(question, answer)` turns plus optionally injected
/// external history text (sourced from the chat transcript store).
#[derive(Debug, Default, Clone)]
pub struct ConversationMemory {
    injected_history: Option<String>,
    turns: Vec<(String, String)>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the injected history with fresh transcript text. Also
    /// resets accumulated turns: the transcript already contains them.
    pub fn inject_history(&mut self, history: String) {
        self.turns.clear();
        self.injected_history = if history.trim().is_empty() {
            None
        } else {
            Some(history)
        };
    }

    pub fn record(&mut self, question: &str, answer: &str) {
        self.turns.push((question.to_string(), answer.to_string()));
    }

    pub fn clear(&mut self) {
        self.injected_history = None;
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.injected_history.is_none() && self.turns.is_empty()
    }

    /// Render history for the `{chat_history}` prompt slot.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(history) = &self.injected_history {
            out.push_str(history);
        }
        for (question, answer) in &self.turns {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("User: {}\nAssistant: {}", question, answer));
        }
        out
    }
}
