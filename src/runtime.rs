use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use gateway_api::{await_or_cancel, ChatStreamRequest, ChunkParser};
use model_registry::ModelConfig;
use tokio::sync::watch;

use crate::controller::{Progress, StreamCompletion, StreamController, StreamHandle, StreamPhase};
use crate::message::{Message, SessionId};
use crate::transport::StreamTransport;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Copy of the controller state for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub messages: Vec<Message>,
    pub focus: Option<SessionId>,
    pub phase: StreamPhase,
    pub streaming_session: Option<SessionId>,
    pub last_error: Option<String>,
    pub revision: u64,
}

struct Shared {
    controller: Mutex<StreamController>,
    changes: watch::Sender<u64>,
}

impl Shared {
    /// Mutate under the lock and publish the new revision.
    fn update<R>(&self, mutate: impl FnOnce(&mut StreamController) -> R) -> R {
        let mut controller = lock_unpoisoned(&self.controller);
        let result = mutate(&mut controller);
        let revision = controller.revision();
        drop(controller);
        self.changes.send_if_modified(|current| {
            if *current == revision {
                false
            } else {
                *current = revision;
                true
            }
        });
        result
    }
}

/// Owns the controller and drives streams on spawned tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct StreamRuntime {
    shared: Arc<Shared>,
    transport: Arc<dyn StreamTransport>,
    system_prompt: Arc<str>,
}

impl StreamRuntime {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                controller: Mutex::new(StreamController::new()),
                changes,
            }),
            transport,
            system_prompt: Arc::from(DEFAULT_SYSTEM_PROMPT),
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl AsRef<str>) -> Self {
        self.system_prompt = Arc::from(system_prompt.as_ref());
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Receiver that changes whenever the controller mutates.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let controller = lock_unpoisoned(&self.shared.controller);
        ControllerSnapshot {
            messages: controller.messages().to_vec(),
            focus: controller.focus().cloned(),
            phase: controller.phase(),
            streaming_session: controller.streaming_session().cloned(),
            last_error: controller.last_error().map(str::to_owned),
            revision: controller.revision(),
        }
    }

    pub fn with_controller<R>(&self, mutate: impl FnOnce(&mut StreamController) -> R) -> R {
        self.shared.update(mutate)
    }

    /// Append the assistant placeholder and start streaming into it.
    ///
    /// Any active stream is superseded first. The returned completion
    /// resolves when this stream reaches a terminal state.
    pub fn start_stream(
        &self,
        prompt: &str,
        model: &ModelConfig,
        session_id: &SessionId,
        thinking_enabled: Option<bool>,
    ) -> StreamCompletion {
        let request = ChatStreamRequest::new(
            session_id.as_str(),
            &self.system_prompt,
            prompt,
            &model.provider,
            &model.id,
        )
        .with_thinking_budget(model.thinking_budget(thinking_enabled));

        let (handle, completion) = self
            .shared
            .update(|controller| controller.begin_stream(session_id.clone()));

        tokio::spawn(drive_stream(
            Arc::clone(&self.shared),
            Arc::clone(&self.transport),
            request,
            handle,
        ));

        completion
    }

    pub fn abort_stream(&self, reason: &str) -> bool {
        self.shared
            .update(|controller| controller.abort_stream(reason))
    }

    pub fn set_messages_for_context(&self, messages: Vec<Message>, focus: Option<SessionId>) {
        self.shared
            .update(|controller| controller.set_messages_for_context(messages, focus));
    }

    pub fn clear_stream_state(&self) {
        self.shared.update(StreamController::clear_stream_state);
    }

    pub fn dismiss_error(&self) {
        self.shared.update(StreamController::dismiss_error);
    }
}

/// Read loop for one stream. Every mutation goes through the controller,
/// which drops it unless `handle` is still the live stream.
async fn drive_stream(
    shared: Arc<Shared>,
    transport: Arc<dyn StreamTransport>,
    request: ChatStreamRequest,
    handle: StreamHandle,
) {
    let stream_id = handle.stream_id;
    let cancel = handle.cancel;

    let opened = await_or_cancel(transport.open(request, Arc::clone(&cancel)), Some(&cancel))
        .await
        .and_then(|result| result);
    let mut body = match opened {
        Ok(body) => body,
        Err(error) => {
            shared.update(|controller| controller.fail_stream(stream_id, &error));
            return;
        }
    };

    if !shared.update(|controller| controller.mark_response_started(stream_id)) {
        return;
    }

    let mut parser = ChunkParser::default();
    loop {
        let next = match await_or_cancel(body.next(), Some(&cancel)).await {
            Ok(next) => next,
            Err(error) => {
                shared.update(|controller| controller.fail_stream(stream_id, &error));
                return;
            }
        };

        match next {
            Some(Ok(chunk)) => {
                tracing::trace!(stream_id, bytes = chunk.len(), "stream chunk");
                let records = parser.feed(&chunk);
                if records.is_empty() {
                    continue;
                }
                let progress =
                    shared.update(|controller| controller.apply_records(stream_id, records));
                if progress != Progress::Continue {
                    return;
                }
            }
            Some(Err(error)) => {
                shared.update(|controller| controller.fail_stream(stream_id, &error));
                return;
            }
            None => break,
        }
    }

    let tail = parser.finish();
    shared.update(|controller| match controller.apply_records(stream_id, tail) {
        Progress::Continue => controller.complete_stream(stream_id),
        other => other,
    });
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
