//! Inline `<think>…</think>` assembly for streamed reasoning text.
//!
//! Consecutive thought chunks grow one block, the first content chunk after a
//! block seals it, and a later thought phase opens a fresh block at the end of
//! the message. The block in the message is closed after every chunk.

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ThoughtState {
    #[default]
    Idle,
    Accumulating {
        /// Byte length of the message before the open tag.
        prefix_len: usize,
        buffer: String,
    },
}

/// Per-stream thought state. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct ThoughtAssembler {
    state: ThoughtState,
}

impl ThoughtAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, ThoughtState::Accumulating { .. })
    }

    /// Grow the open block, or open one at the end of `content`.
    pub fn push_thought(&mut self, content: &mut String, chunk: &str) {
        if chunk.is_empty() {
            return;
        }

        match &mut self.state {
            ThoughtState::Idle => {
                let prefix_len = content.len();
                content.push_str(THINK_OPEN);
                content.push_str(chunk);
                content.push_str(THINK_CLOSE);
                self.state = ThoughtState::Accumulating {
                    prefix_len,
                    buffer: chunk.to_owned(),
                };
            }
            ThoughtState::Accumulating { prefix_len, buffer } => {
                let expected_len =
                    *prefix_len + THINK_OPEN.len() + buffer.len() + THINK_CLOSE.len();
                buffer.push_str(chunk);

                if content.len() == expected_len && content.ends_with(THINK_CLOSE) {
                    content.truncate(expected_len - THINK_CLOSE.len());
                    content.push_str(chunk);
                    content.push_str(THINK_CLOSE);
                    return;
                }

                // Someone else touched the message; rebuild the block from the prefix.
                if *prefix_len > content.len() || !content.is_char_boundary(*prefix_len) {
                    *prefix_len = content.len();
                }
                content.truncate(*prefix_len);
                content.push_str(THINK_OPEN);
                content.push_str(buffer);
                content.push_str(THINK_CLOSE);
            }
        }
    }

    /// Seal any open block and append regular content after it.
    pub fn push_content(&mut self, content: &mut String, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.seal();
        content.push_str(chunk);
    }

    /// Stop growing the current block. The message already holds it closed.
    pub fn seal(&mut self) {
        self.state = ThoughtState::Idle;
    }
}
