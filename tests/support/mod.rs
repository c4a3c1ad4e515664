#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use gateway_api::{ByteStream, CancellationSignal, ChatStreamRequest, GatewayError};
use model_registry::{ModelConfig, ThinkingPolicy};
use stream_chat::StreamTransport;

pub enum Step {
    Chunk(Vec<u8>),
    Delay(Duration),
    Error(GatewayError),
    /// Never yields again; only cancellation ends the read.
    Hang,
}

/// One scripted response: how opening behaves, then the body.
#[derive(Default)]
pub struct Script {
    open_delay: Duration,
    open_error: Option<GatewayError>,
    steps: Vec<Step>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_after(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn open_fails(mut self, error: GatewayError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn line(mut self, payload: &str) -> Self {
        self.steps
            .push(Step::Chunk(format!("data: {payload}\n").into_bytes()));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.steps.push(Step::Chunk(bytes.to_vec()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push(Step::Delay(delay));
        self
    }

    pub fn error(mut self, error: GatewayError) -> Self {
        self.steps.push(Step::Error(error));
        self
    }

    pub fn hang(mut self) -> Self {
        self.steps.push(Step::Hang);
        self
    }
}

#[derive(Default)]
struct TransportState {
    scripts: VecDeque<Script>,
    requests: Vec<ChatStreamRequest>,
    signals: Vec<CancellationSignal>,
}

/// Transport that replays queued scripts in order and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
}

impl ScriptedTransport {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        let transport = Self::default();
        lock_unpoisoned(&transport.state).scripts = scripts.into_iter().collect();
        transport
    }

    pub fn push(&self, script: Script) {
        lock_unpoisoned(&self.state).scripts.push_back(script);
    }

    pub fn requests(&self) -> Vec<ChatStreamRequest> {
        lock_unpoisoned(&self.state).requests.clone()
    }

    pub fn signals(&self) -> Vec<CancellationSignal> {
        lock_unpoisoned(&self.state).signals.clone()
    }
}

impl StreamTransport for ScriptedTransport {
    fn open(
        &self,
        request: ChatStreamRequest,
        cancellation: CancellationSignal,
    ) -> BoxFuture<'static, Result<ByteStream, GatewayError>> {
        let script = {
            let mut state = lock_unpoisoned(&self.state);
            state.requests.push(request);
            state.signals.push(cancellation);
            state.scripts.pop_front()
        };

        async move {
            let Some(script) = script else {
                return Err(GatewayError::Unknown("no scripted response left".to_owned()));
            };
            if !script.open_delay.is_zero() {
                tokio::time::sleep(script.open_delay).await;
            }
            if let Some(error) = script.open_error {
                return Err(error);
            }

            let body = futures_util::stream::unfold(script.steps.into_iter(), |mut steps| async move {
                loop {
                    match steps.next()? {
                        Step::Chunk(bytes) => return Some((Ok(bytes), steps)),
                        Step::Error(error) => return Some((Err(error), steps)),
                        Step::Delay(delay) => tokio::time::sleep(delay).await,
                        Step::Hang => std::future::pending::<()>().await,
                    }
                }
            });
            Ok(body.boxed())
        }
        .boxed()
    }
}

pub fn plain_model() -> ModelConfig {
    ModelConfig::new("gpt-4.1", "azure", "GPT-4.1")
}

pub fn thinking_model() -> ModelConfig {
    ModelConfig::new("gemini-2.5-flash-preview-05-20", "google", "Gemini 2.5 flash")
        .with_thinking_policy(ThinkingPolicy {
            toggleable: true,
            default_on: true,
            budget_when_on: 8192,
            budget_when_off: 0,
            fixed_budget: None,
            min_budget: 0,
            max_budget: 24576,
        })
}

/// Let spawned stream tasks run until they park.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
