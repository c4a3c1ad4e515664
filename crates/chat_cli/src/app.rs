use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use gateway_api::{GatewayClient, GatewayError, ImageUpload, SessionSummary, UploadedImage};
use model_registry::{ModelConfig, ModelRegistry};
use session_prefs::{SessionPreferences, NEW_CHAT_KEY};
use stream_chat::{
    messages_from_history, HandoffState, Message, NavigationReconciler, Route, SessionId,
    StreamRuntime,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use crate::render::TranscriptPrinter;

/// Backend calls the CLI makes outside the stream itself.
pub trait ChatBackend: Send + Sync {
    fn history(&self, session_id: SessionId)
        -> BoxFuture<'static, Result<Vec<Message>, GatewayError>>;
    fn sessions(&self) -> BoxFuture<'static, Result<Vec<SessionSummary>, GatewayError>>;
    fn upload(&self, path: PathBuf) -> BoxFuture<'static, Result<UploadedImage, GatewayError>>;
}

impl ChatBackend for GatewayClient {
    fn history(
        &self,
        session_id: SessionId,
    ) -> BoxFuture<'static, Result<Vec<Message>, GatewayError>> {
        let client = self.clone();
        async move {
            let entries = client.fetch_history(session_id.as_str()).await?;
            Ok(messages_from_history(&entries))
        }
        .boxed()
    }

    fn sessions(&self) -> BoxFuture<'static, Result<Vec<SessionSummary>, GatewayError>> {
        let client = self.clone();
        async move { client.fetch_session_list().await }.boxed()
    }

    fn upload(&self, path: PathBuf) -> BoxFuture<'static, Result<UploadedImage, GatewayError>> {
        let client = self.clone();
        async move {
            let upload = ImageUpload::from_path(&path)?;
            client.upload_image(&upload).await
        }
        .boxed()
    }
}

pub struct ChatApp<W: Write> {
    runtime: StreamRuntime,
    backend: Arc<dyn ChatBackend>,
    registry: ModelRegistry,
    prefs: SessionPreferences,
    reconciler: NavigationReconciler,
    printer: TranscriptPrinter,
    out: W,
    should_exit: bool,
}

impl<W: Write> ChatApp<W> {
    pub fn new(
        runtime: StreamRuntime,
        backend: Arc<dyn ChatBackend>,
        registry: ModelRegistry,
        out: W,
    ) -> Self {
        Self {
            runtime,
            backend,
            registry,
            prefs: SessionPreferences::new(),
            reconciler: NavigationReconciler::new(),
            printer: TranscriptPrinter::new(),
            out,
            should_exit: false,
        }
    }

    #[must_use]
    pub fn with_handoff_delay(mut self, delay: std::time::Duration) -> Self {
        self.reconciler = NavigationReconciler::new().with_handoff_delay(delay);
        self
    }

    /// Preselect a model for the new-chat page.
    #[must_use]
    pub fn with_default_model(mut self, model_id: Option<String>) -> Self {
        if let Some(model_id) = model_id {
            self.prefs.set_model(NEW_CHAT_KEY, model_id);
        }
        self
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    pub fn route(&self) -> &Route {
        self.reconciler.route()
    }

    pub fn prefs(&self) -> &SessionPreferences {
        &self.prefs
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Model selected for the current chat, falling back to the registry default.
    pub fn current_model(&self) -> &ModelConfig {
        self.registry
            .resolve(self.prefs.model_for(self.reconciler.route().preference_key()))
    }

    fn thinking_enabled(&self) -> Option<bool> {
        self.prefs
            .thinking_enabled_for(self.reconciler.route().preference_key())
    }

    pub async fn start(&mut self) -> io::Result<()> {
        self.load_route(Route::NewChat, None).await?;
        let label = self.current_model().label().to_owned();
        writeln!(
            self.out,
            "Connected. Model: {}. Type a message, or /help.",
            label
        )?;
        self.out.flush()
    }

    pub async fn run<R>(mut self, input: R) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut changes = self.runtime.subscribe();
        self.start().await?;

        while !self.should_exit {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await?,
                    None => break,
                },
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.render()?;
                }
            }
        }

        self.runtime.abort_stream("client exiting");
        Ok(())
    }

    pub fn render(&mut self) -> io::Result<()> {
        let snapshot = self.runtime.snapshot();
        self.printer.render(&snapshot, &mut self.out)
    }

    pub async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        match parse_slash_command(line) {
            Some(command) => self.execute(command).await?,
            None => self.send(line).await?,
        }
        self.render()
    }

    async fn send(&mut self, text: &str) -> io::Result<()> {
        let model = self.current_model().clone();
        let thinking = self.thinking_enabled();
        let receipt =
            match self
                .reconciler
                .send_message(&self.runtime, &mut self.prefs, text, &model, thinking)
            {
                Ok(receipt) => receipt,
                Err(rejected) => return writeln!(self.out, "! {rejected}"),
            };
        tracing::debug!(session_id = %receipt.session_id, model = %model.id, "message sent");
        self.render()?;

        if let Some(navigation) = receipt.navigation {
            tokio::time::sleep(navigation.delay).await;
            self.load_route(navigation.route, navigation.state).await?;
        }
        Ok(())
    }

    async fn execute(&mut self, command: SlashCommand) -> io::Result<()> {
        match command {
            SlashCommand::Help => writeln!(self.out, "{HELP_TEXT}"),
            SlashCommand::New => {
                self.printer.reset();
                self.load_route(Route::NewChat, None).await
            }
            SlashCommand::Open(id) => {
                self.printer.reset();
                self.load_route(Route::Chat(SessionId::new(id)), None).await
            }
            SlashCommand::Sessions => self.list_sessions().await,
            SlashCommand::Models => self.list_models(),
            SlashCommand::Model(id) => self.select_model(&id),
            SlashCommand::Think(value) => self.set_thinking(value),
            SlashCommand::Stop => {
                if self.runtime.abort_stream("stopped by user") {
                    Ok(())
                } else {
                    writeln!(self.out, "nothing to stop")
                }
            }
            SlashCommand::Upload(path) => self.upload(PathBuf::from(path)).await,
            SlashCommand::Quit => {
                self.should_exit = true;
                Ok(())
            }
            SlashCommand::Usage(usage) => writeln!(self.out, "usage: {usage}"),
            SlashCommand::Unknown(command) => {
                writeln!(self.out, "unknown command {command}; try /help")
            }
        }
    }

    async fn load_route(&mut self, route: Route, state: Option<HandoffState>) -> io::Result<()> {
        let history = match route.session_id() {
            Some(id) => match self.backend.history(id.clone()).await {
                Ok(history) => history,
                Err(error) => {
                    tracing::warn!(session_id = %id, %error, "failed to load history");
                    writeln!(self.out, "! failed to load history: {error}")?;
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut state = state;
        self.reconciler
            .on_route_loaded(&self.runtime, route, history, &mut state);
        self.render()
    }

    async fn list_sessions(&mut self) -> io::Result<()> {
        match self.backend.sessions().await {
            Ok(sessions) if sessions.is_empty() => writeln!(self.out, "no chats yet"),
            Ok(sessions) => {
                for session in sessions {
                    let title = if session.title.is_empty() {
                        "(untitled)"
                    } else {
                        session.title.as_str()
                    };
                    writeln!(self.out, "{}  {title}", session.chat_id)?;
                }
                Ok(())
            }
            Err(error) => writeln!(self.out, "! failed to load chats: {error}"),
        }
    }

    fn list_models(&mut self) -> io::Result<()> {
        let current = self.current_model().id.clone();
        for model in self.registry.all() {
            let marker = if model.id == current { '*' } else { ' ' };
            let thinking = if model.supports_thinking_toggle() {
                " [thinking]"
            } else {
                ""
            };
            writeln!(self.out, "{marker} {} ({}){thinking}", model.id, model.label())?;
        }
        Ok(())
    }

    fn select_model(&mut self, id: &str) -> io::Result<()> {
        let Some(model) = self.registry.find(id) else {
            return writeln!(self.out, "unknown model {id}; see /models");
        };
        let label = model.label().to_owned();
        let key = self.reconciler.route().preference_key().to_owned();
        self.prefs.set_model(key, id);
        writeln!(self.out, "model: {label}")
    }

    fn set_thinking(&mut self, value: Option<bool>) -> io::Result<()> {
        let model = self.current_model();
        if !model.supports_thinking_toggle() {
            let label = model.label().to_owned();
            return writeln!(self.out, "{label} has no thinking toggle");
        }
        let current = self
            .thinking_enabled()
            .unwrap_or_else(|| model.default_thinking_enabled());
        let enabled = value.unwrap_or(!current);

        let key = self.reconciler.route().preference_key().to_owned();
        self.prefs.set_thinking_enabled(key, enabled);
        writeln!(self.out, "thinking {}", if enabled { "on" } else { "off" })
    }

    async fn upload(&mut self, path: PathBuf) -> io::Result<()> {
        match self.backend.upload(path).await {
            Ok(image) => writeln!(self.out, "uploaded {}: {}", image.object_key, image.read_url),
            Err(error) => writeln!(self.out, "! upload failed: {error}"),
        }
    }
}
