//! Session Driver
//!
//! Runs one [`Orchestrator`] on a single task and executes the commands it
//! returns. Inputs come from three places: presentation messages, the live
//! transport and the results of connect steps running in spawned tasks.

use super::{
    audio::AudioOutput,
    protocol::{ClientMessage, LogDirection, ServerMessage},
};
use crate::{
    audio_utils,
    credential::CredentialProvider,
    models::PreferencesResponse,
    preferences::PreferenceStore,
    transport::{TransportConnector, TransportHandle, is_audio_delta},
};
use anyhow::{Result, anyhow};
use bytes::Bytes;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, trace, warn};
use tutoria_core::{
    Command,
    error::SessionError,
    orchestrator::Orchestrator,
    protocol::ClientEvent,
    session::{AttemptId, Codec},
};

/// Collaborators shared by every session of the process.
#[derive(Clone)]
pub struct SessionServices {
    pub credentials: Arc<dyn CredentialProvider>,
    pub connector: Arc<dyn TransportConnector>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub connect_timeout: Duration,
}

#[derive(Debug)]
pub enum DriverInput {
    Client(ClientMessage),
    /// A raw microphone frame in the session codec.
    Audio(Bytes),
}

enum ConnectStep {
    Credential {
        attempt: AttemptId,
        result: Result<Option<SecretString>>,
    },
    Opened {
        attempt: AttemptId,
        result: Result<TransportHandle>,
    },
}

pub struct SessionDriver<A: AudioOutput> {
    orchestrator: Orchestrator,
    audio: A,
    ui: mpsc::UnboundedSender<ServerMessage>,
    services: SessionServices,
    steps_tx: mpsc::UnboundedSender<ConnectStep>,
    steps_rx: mpsc::UnboundedReceiver<ConnectStep>,
    /// Negotiated transports not yet adopted or discarded.
    opened: HashMap<AttemptId, TransportHandle>,
    live: Option<TransportHandle>,
}

impl<A: AudioOutput> SessionDriver<A> {
    pub fn new(
        orchestrator: Orchestrator,
        audio: A,
        ui: mpsc::UnboundedSender<ServerMessage>,
        services: SessionServices,
    ) -> Self {
        let (steps_tx, steps_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            audio,
            ui,
            services,
            steps_tx,
            steps_rx,
            opened: HashMap::new(),
            live: None,
        }
    }

    /// Runs until the presentation side closes `inputs`.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<DriverInput>) {
        let commands = self.orchestrator.start();
        self.execute(commands).await;

        loop {
            tokio::select! {
                input = inputs.recv() => {
                    let Some(input) = input else {
                        debug!("Presentation input closed");
                        break;
                    };
                    let commands = self.handle_input(input);
                    self.execute(commands).await;
                }
                Some(step) = self.steps_rx.recv() => {
                    let commands = self.handle_step(step);
                    self.execute(commands).await;
                }
                event = next_inbound(&mut self.live) => {
                    let commands = match event {
                        Some(event) => self.orchestrator.handle_server_event(event),
                        None => {
                            if let Some(live) = self.live.take() {
                                live.close();
                            }
                            self.orchestrator.on_transport_lost()
                        }
                    };
                    self.execute(commands).await;
                }
            }
        }

        self.shutdown();
    }

    fn handle_input(&mut self, input: DriverInput) -> Vec<Command> {
        match input {
            DriverInput::Audio(frame) => {
                trace!(
                    bytes = frame.len(),
                    ms = audio_utils::frame_duration_ms(frame.len(), self.orchestrator.codec()),
                    "Microphone frame"
                );
                self.orchestrator.append_audio(audio_utils::encode_frame(&frame))
            }
            DriverInput::Client(message) => match message {
                ClientMessage::ToggleConnection => self.orchestrator.toggle(),
                ClientMessage::SelectAgent { agent } => self.orchestrator.select_agent(&agent),
                ClientMessage::SetPreference { preference } => self.orchestrator.update_preference(preference),
                ClientMessage::TalkDown => self.orchestrator.talk_down(),
                ClientMessage::TalkUp => self.orchestrator.talk_up(),
                ClientMessage::SendText { text } => self.orchestrator.send_text(&text),
                ClientMessage::PlaybackBlocked { reason } => {
                    let error =
                        SessionError::PlaybackPolicyError(reason.unwrap_or_else(|| "autoplay blocked".to_string()));
                    warn!(error = %error, "Client could not start audio playback");
                    Vec::new()
                }
            },
        }
    }

    fn handle_step(&mut self, step: ConnectStep) -> Vec<Command> {
        match step {
            ConnectStep::Credential { attempt, result } => match result {
                Ok(secret) => self.orchestrator.on_credential(attempt, secret),
                Err(e) => self.orchestrator.on_connect_error(attempt, format!("{:#}", e)),
            },
            ConnectStep::Opened { attempt, result } => match result {
                Ok(handle) => {
                    self.opened.insert(attempt, handle);
                    self.orchestrator.on_transport_opened(attempt)
                }
                Err(e) => self.orchestrator.on_connect_error(attempt, format!("{:#}", e)),
            },
        }
    }

    async fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            self.apply(command).await;
        }
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::StatusChanged(status) => {
                info!(%status, "Session status changed");
                self.notify(ServerMessage::Status { status });
            }
            Command::FetchCredential { attempt, model } => self.spawn_fetch_credential(attempt, model),
            Command::OpenTransport {
                attempt,
                secret,
                model,
                codec,
            } => self.spawn_open_transport(attempt, secret, model, codec),
            Command::AdoptTransport { attempt } => match self.opened.remove(&attempt) {
                Some(handle) => {
                    if let Some(previous) = self.live.replace(handle) {
                        previous.close();
                    }
                }
                None => error!(attempt, "No negotiated transport to adopt"),
            },
            Command::DiscardTransport { attempt } => {
                if let Some(handle) = self.opened.remove(&attempt) {
                    debug!(attempt, "Closing stale transport");
                    handle.close();
                }
            }
            Command::CloseTransport => {
                if let Some(live) = self.live.take() {
                    live.close();
                }
            }
            Command::Send { event, label } => self.send(&event, label),
            Command::TransportMute(muted) => {
                if let Some(live) = &self.live {
                    live.set_output_muted(muted);
                }
            }
            Command::Playback(action) => {
                if let Err(e) = self.audio.apply(action) {
                    warn!(error = %e, ?action, "Audio output rejected playback action");
                }
            }
            Command::Interrupt { cancel_response } => {
                self.audio.flush();
                if cancel_response {
                    self.send(&ClientEvent::ResponseCancel, None);
                }
            }
            Command::AudioChunk(data) => self.audio.write(data),
            Command::Transcript(update) => self.notify(update.into()),
            Command::Breadcrumb { title, data } => {
                info!(title = %title, data = %data, "Breadcrumb");
                self.notify(ServerMessage::Breadcrumb { title, data });
            }
            Command::LogServerEvent(event) => {
                if !is_audio_delta(&event) {
                    self.notify(ServerMessage::Log {
                        direction: LogDirection::Server,
                        label: None,
                        event,
                    });
                }
            }
            Command::BoardChanged(content) => self.notify(ServerMessage::Board { content }),
            Command::AgentChanged(name) => self.notify(ServerMessage::Agent { name }),
            Command::PendingSpeech(active) => self.notify(ServerMessage::PendingSpeech { active }),
            Command::PersistPreferences(preferences) => {
                if let Err(e) = self.services.preferences.save(&preferences).await {
                    error!(error = ?e, "Failed to persist preferences");
                    self.notify(ServerMessage::Error {
                        message: "Preferences could not be saved".to_string(),
                    });
                }
                self.notify(ServerMessage::Preferences {
                    preferences: PreferencesResponse::from(&preferences),
                });
            }
            Command::ReportError(message) => {
                warn!(error = %message, "Reporting error to client");
                self.notify(ServerMessage::Error { message });
            }
        }
    }

    /// Best-effort: without a live transport the event is dropped.
    fn send(&self, event: &ClientEvent, label: Option<&'static str>) {
        let Some(live) = &self.live else {
            debug!(kind = event.kind(), "No live transport; dropping event");
            return;
        };
        if !matches!(event, ClientEvent::InputAudioBufferAppend { .. }) {
            self.notify(ServerMessage::Log {
                direction: LogDirection::Client,
                label: label.map(str::to_string),
                event: serde_json::to_value(event).unwrap_or_else(|_| json!({ "type": event.kind() })),
            });
        }
        if let Err(e) = live.send(event) {
            warn!(kind = event.kind(), "Failed to send client event: {:#}", e);
        }
    }

    fn notify(&self, message: ServerMessage) {
        if self.ui.send(message).is_err() {
            trace!("Presentation channel closed");
        }
    }

    fn spawn_fetch_credential(&self, attempt: AttemptId, model: String) {
        let credentials = self.services.credentials.clone();
        let steps = self.steps_tx.clone();
        let limit = self.services.connect_timeout;
        tokio::spawn(
            async move {
                let result = match tokio::time::timeout(limit, credentials.fetch_secret(&model)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("credential request timed out after {}s", limit.as_secs())),
                };
                let _ = steps.send(ConnectStep::Credential { attempt, result });
            }
            .in_current_span(),
        );
    }

    fn spawn_open_transport(&self, attempt: AttemptId, secret: SecretString, model: String, codec: Codec) {
        let connector = self.services.connector.clone();
        let steps = self.steps_tx.clone();
        let limit = self.services.connect_timeout;
        tokio::spawn(
            async move {
                let result = match tokio::time::timeout(limit, connector.connect(secret, &model, codec)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("transport negotiation timed out after {}s", limit.as_secs())),
                };
                if let Err(rejected) = steps.send(ConnectStep::Opened { attempt, result }) {
                    // The driver is gone; nobody will adopt this transport.
                    if let ConnectStep::Opened { result: Ok(handle), .. } = rejected.0 {
                        handle.close();
                    }
                }
            }
            .in_current_span(),
        );
    }

    fn shutdown(&mut self) {
        if let Some(live) = self.live.take() {
            live.close();
        }
        for (_, handle) in self.opened.drain() {
            handle.close();
        }
        info!("Session driver stopped");
    }
}

async fn next_inbound(live: &mut Option<TransportHandle>) -> Option<Value> {
    match live {
        Some(handle) => handle.recv().await,
        None => std::future::pending().await,
    }
}
