//! Connection lifecycle
//!
//! Owns the session status and the live [`Session`]. A connect goes through
//! two suspension points that the host executes: the credential fetch and
//! the transport negotiation. Both results come back tagged with the
//! attempt id they were started for; results of an abandoned attempt are
//! dropped, and a transport opened for one is discarded.

use crate::{
    Command,
    error::SessionError,
    scenario::{AgentRoster, OutputGuardrail},
    session::{AttemptId, Codec, Session, SessionStatus},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Everything needed to establish a session for one agent and model.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub agent: String,
    pub model: String,
    pub roster: AgentRoster,
    pub codec: Codec,
    pub guardrails: Vec<OutputGuardrail>,
    pub extra_context: Value,
}

/// Single-use marker saying the next agent activation was caused by a
/// handoff. Reading it clears it.
#[derive(Debug, Default)]
pub struct HandoffToken(bool);

impl HandoffToken {
    pub fn mark(&mut self) {
        self.0 = true;
    }

    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }
}

/// Outcome of feeding a connect-step result into the lifecycle.
#[derive(Debug)]
pub enum Transition {
    /// The result belonged to an abandoned attempt.
    Stale(Vec<Command>),
    /// The attempt moves on to its next step.
    Progress(Vec<Command>),
    /// The attempt failed; status is back to DISCONNECTED.
    Failed {
        request: ConnectRequest,
        error: SessionError,
        commands: Vec<Command>,
    },
    /// A session now exists and status is CONNECTED.
    Connected(Vec<Command>),
}

#[derive(Debug, Default)]
pub struct ConnectionLifecycle {
    status: SessionStatus,
    next_attempt: AttemptId,
    pending: Option<(AttemptId, ConnectRequest)>,
    session: Option<Session>,
    handoff: HandoffToken,
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn handoff_token(&mut self) -> &mut HandoffToken {
        &mut self.handoff
    }

    /// Starts a negotiation. A no-op unless DISCONNECTED, so overlapping
    /// attempts are rejected rather than queued.
    pub fn connect(&mut self, request: ConnectRequest) -> Vec<Command> {
        if self.status != SessionStatus::Disconnected {
            debug!(status = %self.status, "Ignoring connect while a session is active");
            return Vec::new();
        }
        self.next_attempt += 1;
        let attempt = self.next_attempt;
        info!(attempt, agent = %request.agent, model = %request.model, "Connecting");
        let model = request.model.clone();
        self.pending = Some((attempt, request));
        self.status = SessionStatus::Connecting;
        vec![
            Command::StatusChanged(SessionStatus::Connecting),
            Command::FetchCredential { attempt, model },
        ]
    }

    fn is_pending(&self, attempt: AttemptId) -> bool {
        matches!(&self.pending, Some((id, _)) if *id == attempt)
    }

    /// Credential fetch finished. `None` means the endpoint had no secret.
    pub fn on_credential(&mut self, attempt: AttemptId, secret: Option<SecretString>) -> Transition {
        if !self.is_pending(attempt) {
            debug!(attempt, "Dropping credential for abandoned attempt");
            return Transition::Stale(Vec::new());
        }
        let secret = match secret {
            Some(s) if !s.expose_secret().trim().is_empty() => s,
            _ => return self.fail(SessionError::NoCredential),
        };
        let Some((_, request)) = &self.pending else {
            return Transition::Stale(Vec::new());
        };
        Transition::Progress(vec![Command::OpenTransport {
            attempt,
            secret,
            model: request.model.clone(),
            codec: request.codec,
        }])
    }

    /// Credential fetch or negotiation failed.
    pub fn on_connect_error(&mut self, attempt: AttemptId, message: String) -> Transition {
        if !self.is_pending(attempt) {
            debug!(attempt, error = %message, "Dropping error for abandoned attempt");
            return Transition::Stale(Vec::new());
        }
        self.fail(SessionError::TransportError(message))
    }

    /// The transport finished negotiating.
    pub fn on_transport_opened(&mut self, attempt: AttemptId) -> Transition {
        if !self.is_pending(attempt) {
            info!(attempt, "Discarding transport opened for abandoned attempt");
            return Transition::Stale(vec![Command::DiscardTransport { attempt }]);
        }
        let Some((attempt, request)) = self.pending.take() else {
            return Transition::Stale(Vec::new());
        };
        self.session = Some(Session {
            attempt,
            roster: request.roster.with_root(&request.agent),
            active_agent: request.agent,
            model: request.model,
            codec: request.codec,
            guardrails: request.guardrails,
            extra_context: request.extra_context,
        });
        self.status = SessionStatus::Connected;
        info!(attempt, "Session connected");
        Transition::Connected(vec![
            Command::AdoptTransport { attempt },
            Command::StatusChanged(SessionStatus::Connected),
        ])
    }

    fn fail(&mut self, error: SessionError) -> Transition {
        warn!(error = %error, "Connect failed");
        let Some((_, request)) = self.pending.take() else {
            return Transition::Stale(Vec::new());
        };
        self.status = SessionStatus::Disconnected;
        self.session = None;
        Transition::Failed {
            request,
            commands: vec![
                Command::ReportError(error.to_string()),
                Command::StatusChanged(SessionStatus::Disconnected),
            ],
            error,
        }
    }

    /// Tears down whatever exists, including a negotiation in flight.
    pub fn disconnect(&mut self) -> Vec<Command> {
        self.pending = None;
        self.session = None;
        self.handoff = HandoffToken::default();
        if self.status == SessionStatus::Disconnected {
            return Vec::new();
        }
        info!("Disconnecting");
        self.status = SessionStatus::Disconnected;
        vec![
            Command::CloseTransport,
            Command::StatusChanged(SessionStatus::Disconnected),
        ]
    }

    /// The live transport went away on its own.
    pub fn on_transport_lost(&mut self) -> Vec<Command> {
        if self.session.is_none() {
            return Vec::new();
        }
        warn!("Transport closed by remote");
        self.disconnect()
    }

    /// Records a handoff inside the live session. Returns false when there is
    /// no session or the agent is already active.
    pub fn set_active_agent(&mut self, agent: &str) -> bool {
        match &mut self.session {
            Some(session) if session.active_agent != agent => {
                session.active_agent = agent.to_string();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::AgentConfig;
    use serde_json::json;

    fn request(agent: &str, model: &str) -> ConnectRequest {
        ConnectRequest {
            agent: agent.to_string(),
            model: model.to_string(),
            roster: AgentRoster::new(vec![
                AgentConfig::new("greeter", "alloy"),
                AgentConfig::new("tutorFinanzas", "sage"),
            ]),
            codec: Codec::Pcmu,
            guardrails: vec![OutputGuardrail::moderation("Acme")],
            extra_context: json!({"lesson": 1}),
        }
    }

    fn secret() -> Option<SecretString> {
        Some(SecretString::from("ek_123".to_string()))
    }

    fn attempt_of(commands: &[Command]) -> AttemptId {
        commands
            .iter()
            .find_map(|c| match c {
                Command::FetchCredential { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_connect_success_creates_session_with_agent_as_root() {
        let mut lifecycle = ConnectionLifecycle::new();
        let commands = lifecycle.connect(request("tutorFinanzas", "m1"));
        assert_eq!(lifecycle.status(), SessionStatus::Connecting);
        let attempt = attempt_of(&commands);

        let Transition::Progress(commands) = lifecycle.on_credential(attempt, secret()) else {
            panic!("expected progress");
        };
        assert!(matches!(
            commands.as_slice(),
            [Command::OpenTransport { codec: Codec::Pcmu, .. }]
        ));

        assert!(matches!(lifecycle.on_transport_opened(attempt), Transition::Connected(_)));
        assert_eq!(lifecycle.status(), SessionStatus::Connected);
        let session = lifecycle.session().unwrap();
        assert_eq!(session.active_agent, "tutorFinanzas");
        assert_eq!(session.roster.root().unwrap().name, "tutorFinanzas");
        assert_eq!(session.model, "m1");
        assert_eq!(session.extra_context, json!({"lesson": 1}));
    }

    #[test]
    fn test_connect_while_connecting_is_noop() {
        let mut lifecycle = ConnectionLifecycle::new();
        let first = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m1")));
        assert!(lifecycle.connect(request("greeter", "m2")).is_empty());
        assert_eq!(lifecycle.status(), SessionStatus::Connecting);
        lifecycle.on_credential(first, secret());
        lifecycle.on_transport_opened(first);
        assert_eq!(lifecycle.session().unwrap().model, "m1");
    }

    #[test]
    fn test_missing_credential_reverts_to_disconnected() {
        let mut lifecycle = ConnectionLifecycle::new();
        let attempt = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m1")));
        let Transition::Failed { error, request, .. } = lifecycle.on_credential(attempt, None) else {
            panic!("expected failure");
        };
        assert_eq!(error, SessionError::NoCredential);
        assert_eq!(request.agent, "tutorFinanzas");
        assert_eq!(lifecycle.status(), SessionStatus::Disconnected);
        assert!(lifecycle.session().is_none());

        let attempt = attempt_of(&lifecycle.connect(self::request("tutorFinanzas", "m1")));
        let blank = Some(SecretString::from("  ".to_string()));
        assert!(matches!(
            lifecycle.on_credential(attempt, blank),
            Transition::Failed { error: SessionError::NoCredential, .. }
        ));
    }

    #[test]
    fn test_negotiation_error_reverts_to_disconnected() {
        let mut lifecycle = ConnectionLifecycle::new();
        let attempt = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m1")));
        lifecycle.on_credential(attempt, secret());
        let transition = lifecycle.on_connect_error(attempt, "handshake refused".to_string());
        assert!(matches!(
            transition,
            Transition::Failed { error: SessionError::TransportError(_), .. }
        ));
        assert_eq!(lifecycle.status(), SessionStatus::Disconnected);
    }

    #[test]
    fn test_disconnect_while_connecting_discards_late_transport() {
        let mut lifecycle = ConnectionLifecycle::new();
        let attempt = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m1")));
        lifecycle.on_credential(attempt, secret());

        let commands = lifecycle.disconnect();
        assert!(matches!(commands.last(), Some(Command::StatusChanged(SessionStatus::Disconnected))));

        let Transition::Stale(commands) = lifecycle.on_transport_opened(attempt) else {
            panic!("expected stale");
        };
        assert!(matches!(commands.as_slice(), [Command::DiscardTransport { attempt: a }] if *a == attempt));
        assert_eq!(lifecycle.status(), SessionStatus::Disconnected);
        assert!(lifecycle.session().is_none());
    }

    #[test]
    fn test_stale_results_do_not_affect_new_attempt() {
        let mut lifecycle = ConnectionLifecycle::new();
        let old = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m1")));
        lifecycle.disconnect();
        let new = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m2")));
        assert_ne!(old, new);

        assert!(matches!(lifecycle.on_credential(old, None), Transition::Stale(_)));
        assert!(matches!(
            lifecycle.on_connect_error(old, "late".to_string()),
            Transition::Stale(_)
        ));
        assert_eq!(lifecycle.status(), SessionStatus::Connecting);
    }

    #[test]
    fn test_disconnect_when_disconnected_is_silent() {
        let mut lifecycle = ConnectionLifecycle::new();
        assert!(lifecycle.disconnect().is_empty());
        assert!(lifecycle.on_transport_lost().is_empty());
    }

    #[test]
    fn test_handoff_token_is_single_use() {
        let mut token = HandoffToken::default();
        assert!(!token.take());
        token.mark();
        assert!(token.take());
        assert!(!token.take());
    }

    #[test]
    fn test_set_active_agent_requires_session_and_change() {
        let mut lifecycle = ConnectionLifecycle::new();
        assert!(!lifecycle.set_active_agent("greeter"));
        let attempt = attempt_of(&lifecycle.connect(request("tutorFinanzas", "m1")));
        lifecycle.on_credential(attempt, secret());
        lifecycle.on_transport_opened(attempt);
        assert!(!lifecycle.set_active_agent("tutorFinanzas"));
        assert!(lifecycle.set_active_agent("greeter"));
        assert_eq!(lifecycle.session().unwrap().active_agent, "greeter");
    }
}
