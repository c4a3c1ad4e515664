use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use gateway_api::{CancellationSignal, GatewayError, ParsedRecord, StreamEvent};
use tokio::sync::oneshot;

use crate::message::{Message, SessionId};
use crate::thought::ThoughtAssembler;

pub type StreamId = u64;

pub const PARSE_ERROR_ANNOTATION: &str = "[Error parsing stream data]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamPhase {
    #[default]
    Idle,
    /// Request issued, response headers not seen yet.
    Sending,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
    Aborted(String),
}

/// Identity of the one stream allowed to mutate controller state.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub stream_id: StreamId,
    pub session_id: SessionId,
    pub assistant_message_id: String,
    pub cancel: CancellationSignal,
}

impl StreamHandle {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// What the driver should do after feeding the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Finished(StreamOutcome),
    /// The stream is no longer the live one; stop without touching state.
    Stale,
}

/// Resolves once the stream reaches a terminal state.
#[derive(Debug)]
pub struct StreamCompletion {
    ready: Option<StreamOutcome>,
    receiver: Option<oneshot::Receiver<StreamOutcome>>,
}

impl StreamCompletion {
    pub fn channel() -> (oneshot::Sender<StreamOutcome>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            sender,
            Self {
                ready: None,
                receiver: Some(receiver),
            },
        )
    }

    pub fn resolved(outcome: StreamOutcome) -> Self {
        Self {
            ready: Some(outcome),
            receiver: None,
        }
    }
}

impl Future for StreamCompletion {
    type Output = StreamOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.ready.take() {
            return Poll::Ready(outcome);
        }

        let Some(receiver) = this.receiver.as_mut() else {
            return Poll::Ready(StreamOutcome::Aborted("completion already taken".to_owned()));
        };

        match Pin::new(receiver).poll(cx) {
            Poll::Ready(result) => {
                this.receiver = None;
                Poll::Ready(
                    result.unwrap_or_else(|_| StreamOutcome::Aborted("stream dropped".to_owned())),
                )
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

struct ActiveStream {
    handle: StreamHandle,
    phase: StreamPhase,
    thought: ThoughtAssembler,
    completion: Option<oneshot::Sender<StreamOutcome>>,
}

/// Session stream state machine: `Idle -> Sending -> Streaming -> Idle`.
///
/// The controller performs no I/O. A driver feeds it records tagged with the
/// stream id it was handed; records for any other id are ignored.
#[derive(Default)]
pub struct StreamController {
    messages: Vec<Message>,
    focus: Option<SessionId>,
    active: Option<ActiveStream>,
    last_error: Option<String>,
    next_stream_id: StreamId,
    revision: u64,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn focus(&self) -> Option<&SessionId> {
        self.focus.as_ref()
    }

    pub fn phase(&self) -> StreamPhase {
        self.active
            .as_ref()
            .map(|active| active.phase)
            .unwrap_or_default()
    }

    pub fn active_handle(&self) -> Option<&StreamHandle> {
        self.active.as_ref().map(|active| &active.handle)
    }

    pub fn streaming_session(&self) -> Option<&SessionId> {
        self.active_handle().map(|handle| &handle.session_id)
    }

    pub fn is_streaming_for(&self, session_id: &SessionId) -> bool {
        self.streaming_session() == Some(session_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Bumped on every observable mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dismiss_error(&mut self) {
        if self.last_error.take().is_some() {
            self.touch();
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Register a new stream for `session_id`, superseding any active one,
    /// and append its loading assistant placeholder.
    ///
    /// The user message is expected to be in the list already.
    pub fn begin_stream(&mut self, session_id: SessionId) -> (StreamHandle, StreamCompletion) {
        self.abort_stream("superseded by a new message");

        let placeholder = Message::assistant_placeholder();
        self.next_stream_id += 1;
        let handle = StreamHandle {
            stream_id: self.next_stream_id,
            session_id: session_id.clone(),
            assistant_message_id: placeholder.id.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let (sender, completion) = StreamCompletion::channel();

        self.messages.push(placeholder);
        self.focus = Some(session_id);
        self.last_error = None;
        self.active = Some(ActiveStream {
            handle: handle.clone(),
            phase: StreamPhase::Sending,
            thought: ThoughtAssembler::new(),
            completion: Some(sender),
        });
        self.touch();
        tracing::debug!(stream_id = handle.stream_id, session_id = %handle.session_id, "stream started");

        (handle, completion)
    }

    /// True while `stream_id` is the active stream and its signal is not raised.
    pub fn is_live(&self, stream_id: StreamId) -> bool {
        self.active.as_ref().is_some_and(|active| {
            active.handle.stream_id == stream_id && !active.handle.is_cancelled()
        })
    }

    pub fn mark_response_started(&mut self, stream_id: StreamId) -> bool {
        if !self.is_live(stream_id) {
            return false;
        }
        if let Some(active) = self.active.as_mut() {
            active.phase = StreamPhase::Streaming;
        }
        self.touch();
        true
    }

    pub fn apply_records(
        &mut self,
        stream_id: StreamId,
        records: impl IntoIterator<Item = ParsedRecord>,
    ) -> Progress {
        for record in records {
            let progress = self.apply_record(stream_id, record);
            if progress != Progress::Continue {
                return progress;
            }
        }
        if self.is_live(stream_id) {
            Progress::Continue
        } else {
            Progress::Stale
        }
    }

    pub fn apply_record(&mut self, stream_id: StreamId, record: ParsedRecord) -> Progress {
        match record {
            Ok(event) => self.apply_event(stream_id, event),
            Err(error) => {
                if !self.is_live(stream_id) {
                    return Progress::Stale;
                }
                tracing::warn!(payload = %error.payload, %error, "failed to parse stream line");
                self.annotate(PARSE_ERROR_ANNOTATION);
                self.last_error = Some("Error parsing stream data".to_owned());
                self.touch();
                Progress::Continue
            }
        }
    }

    pub fn apply_event(&mut self, stream_id: StreamId, event: StreamEvent) -> Progress {
        if !self.is_live(stream_id) {
            return Progress::Stale;
        }

        match event {
            StreamEvent::Content { text } => {
                self.write_live(|thought, content| thought.push_content(content, &text));
            }
            StreamEvent::Thought { text, .. } => {
                self.write_live(|thought, content| thought.push_thought(content, &text));
            }
            StreamEvent::SessionInfo { session_id } => {
                let owned = self.streaming_session().map(SessionId::as_str);
                if owned != Some(session_id.as_str()) {
                    tracing::warn!(
                        echoed = %session_id,
                        owned = owned.unwrap_or_default(),
                        "ignoring session id echoed by backend"
                    );
                }
            }
            StreamEvent::ContentStart => {
                if let Some(active) = self.active.as_mut() {
                    active.phase = StreamPhase::Streaming;
                }
                self.touch();
            }
            StreamEvent::UsageSummary { .. } | StreamEvent::StreamEnd => {
                return Progress::Finished(self.finish(StreamOutcome::Completed));
            }
            StreamEvent::Error { message } => {
                tracing::warn!(%message, "backend reported a stream error");
                self.annotate(&format!("[Error: {message}]"));
                self.last_error = Some(message.clone());
                return Progress::Finished(self.finish(StreamOutcome::Failed(message)));
            }
        }

        Progress::Continue
    }

    /// Fold a transport or HTTP failure into the assistant message.
    pub fn fail_stream(&mut self, stream_id: StreamId, error: &GatewayError) -> Progress {
        let owned = self
            .active
            .as_ref()
            .is_some_and(|active| active.handle.stream_id == stream_id);
        if !owned {
            return Progress::Stale;
        }

        if error.is_cancelled() || !self.is_live(stream_id) {
            self.abort_stream("cancelled");
            return Progress::Stale;
        }

        let message = match error {
            GatewayError::Status(status, body) => {
                let message = format!("API Error {}: {body}", status.as_u16());
                self.annotate(&format!("[{message}]"));
                message
            }
            other => {
                let message = other.to_string();
                self.annotate(&format!("[Error: {message}]"));
                message
            }
        };
        tracing::warn!(stream_id, %message, "stream failed");
        self.last_error = Some(message.clone());
        Progress::Finished(self.finish(StreamOutcome::Failed(message)))
    }

    /// Transport closed without a terminal event.
    pub fn complete_stream(&mut self, stream_id: StreamId) -> Progress {
        if !self.is_live(stream_id) {
            return Progress::Stale;
        }
        Progress::Finished(self.finish(StreamOutcome::Completed))
    }

    /// Cancel the active stream. Returns false when nothing was active, so
    /// repeated calls are no-ops.
    pub fn abort_stream(&mut self, reason: &str) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active.handle.cancel.store(true, Ordering::Release);
        if let Some(message) = self.message_mut(&active.handle.assistant_message_id) {
            if message.content.is_empty() {
                message.content = format!("[Stream aborted: {reason}]");
            }
        }
        self.clear_loading();
        tracing::debug!(stream_id = active.handle.stream_id, reason, "stream aborted");

        if let Some(sender) = active.completion {
            let _ = sender.send(StreamOutcome::Aborted(reason.to_owned()));
        }
        self.touch();
        true
    }

    /// Replace the visible list and focus.
    ///
    /// Moving focus off the active stream's session aborts that stream.
    /// Keeping it carries the live assistant message over when the new list
    /// does not contain it.
    pub fn set_messages_for_context(
        &mut self,
        mut messages: Vec<Message>,
        focus: Option<SessionId>,
    ) {
        if let Some(handle) = self.active_handle().cloned() {
            if focus.as_ref() == Some(&handle.session_id) {
                let present = messages
                    .iter()
                    .any(|message| message.id == handle.assistant_message_id);
                if !present {
                    if let Some(live) = self
                        .messages
                        .iter()
                        .find(|message| message.id == handle.assistant_message_id)
                    {
                        messages.push(live.clone());
                    }
                }
            } else {
                self.abort_stream("focus moved to another chat");
            }
        }

        self.messages = messages;
        self.focus = focus;
        self.touch();
    }

    pub fn clear_stream_state(&mut self) {
        self.abort_stream("chat cleared");
        self.messages.clear();
        self.focus = None;
        self.last_error = None;
        self.touch();
    }

    fn finish(&mut self, outcome: StreamOutcome) -> StreamOutcome {
        if let Some(active) = self.active.take() {
            active.handle.cancel.store(true, Ordering::Release);
            if let Some(message) = self.message_mut(&active.handle.assistant_message_id) {
                message.is_loading = false;
            }
            tracing::debug!(stream_id = active.handle.stream_id, ?outcome, "stream finished");
            if let Some(sender) = active.completion {
                let _ = sender.send(outcome.clone());
            }
        }
        self.touch();
        outcome
    }

    fn write_live(&mut self, write: impl FnOnce(&mut ThoughtAssembler, &mut String)) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.phase = StreamPhase::Streaming;
        let id = &active.handle.assistant_message_id;
        if let Some(message) = self.messages.iter_mut().rev().find(|message| &message.id == id) {
            write(&mut active.thought, &mut message.content);
        }
        self.touch();
    }

    /// Append an inline annotation, newline-separated from existing content.
    fn annotate(&mut self, annotation: &str) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let id = &active.handle.assistant_message_id;
        if let Some(message) = self.messages.iter_mut().rev().find(|message| &message.id == id) {
            active.thought.seal();
            if !message.content.is_empty() {
                message.content.push('\n');
            }
            message.content.push_str(annotation);
        }
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|message| message.id == id)
    }

    fn clear_loading(&mut self) {
        for message in &mut self.messages {
            message.is_loading = false;
        }
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
