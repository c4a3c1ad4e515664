//! Incremental line-oriented transcript output.
//!
//! The controller rewrites a message's open thought block on every chunk, so
//! the printer splits content into segments and prints only what each segment
//! gained since the last render.

use std::io::{self, Write};

use stream_chat::thought::{THINK_CLOSE, THINK_OPEN};
use stream_chat::{ControllerSnapshot, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Thinking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    pub text: &'a str,
}

/// Split message content on inline think tags. Empty segments are dropped and
/// an unterminated block runs to the end.
pub fn split_segments(content: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = content;

    while !rest.is_empty() {
        let Some(start) = rest.find(THINK_OPEN) else {
            segments.push(Segment {
                kind: SegmentKind::Text,
                text: rest,
            });
            break;
        };
        if start > 0 {
            segments.push(Segment {
                kind: SegmentKind::Text,
                text: &rest[..start],
            });
        }

        let after = &rest[start + THINK_OPEN.len()..];
        let (inner, next) = match after.find(THINK_CLOSE) {
            Some(end) => (&after[..end], &after[end + THINK_CLOSE.len()..]),
            None => (after, ""),
        };
        if !inner.is_empty() {
            segments.push(Segment {
                kind: SegmentKind::Thinking,
                text: inner,
            });
        }
        rest = next;
    }

    segments
}

#[derive(Debug)]
struct PrintedMessage {
    id: String,
    role: Role,
    content: String,
    /// Bytes printed per segment, in segment order.
    segments: Vec<usize>,
    finished: bool,
}

impl PrintedMessage {
    /// Same turn, possibly reloaded from history under a new id.
    fn matches(&self, message: &Message) -> bool {
        self.id == message.id || (self.role == message.role && self.content == message.content)
    }
}

/// Tracks printed messages by position in the controller's list.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: Vec<PrintedMessage>,
    last_error: Option<String>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget what was printed so the next render shows the whole list.
    pub fn reset(&mut self) {
        self.printed.clear();
        self.last_error = None;
    }

    pub fn render(&mut self, snapshot: &ControllerSnapshot, out: &mut dyn Write) -> io::Result<()> {
        for (index, message) in snapshot.messages.iter().enumerate() {
            self.render_message(index, message, out)?;
        }

        if snapshot.last_error != self.last_error {
            if let Some(error) = &snapshot.last_error {
                writeln!(out, "! {error}")?;
            }
            self.last_error = snapshot.last_error.clone();
        }

        out.flush()
    }

    fn render_message(
        &mut self,
        index: usize,
        message: &Message,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        let known = self
            .printed
            .get(index)
            .is_some_and(|printed| printed.matches(message));
        if !known {
            self.printed.truncate(index);
            let label = match message.role {
                Role::User => "you",
                Role::Assistant => "assistant",
            };
            write!(out, "{label}> ")?;
            self.printed.push(PrintedMessage {
                id: message.id.clone(),
                role: message.role,
                content: String::new(),
                segments: Vec::new(),
                finished: false,
            });
        }

        let state = &mut self.printed[index];
        state.id.clone_from(&message.id);
        if state.finished {
            return Ok(());
        }

        for (segment_index, segment) in split_segments(&message.content).iter().enumerate() {
            if segment_index == state.segments.len() {
                if segment_index > 0 {
                    writeln!(out)?;
                }
                if segment.kind == SegmentKind::Thinking {
                    write!(out, "(thinking) ")?;
                }
                state.segments.push(0);
            }

            let printed = state.segments[segment_index];
            if segment.text.len() > printed && segment.text.is_char_boundary(printed) {
                out.write_all(&segment.text.as_bytes()[printed..])?;
                state.segments[segment_index] = segment.text.len();
            }
        }
        state.content.clone_from(&message.content);

        if !message.is_loading {
            writeln!(out)?;
            state.finished = true;
        }
        Ok(())
    }
}
