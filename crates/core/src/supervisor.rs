//! Auto-connect supervision.
//!
//! Reconnects automatically only after the user has asked to be connected;
//! an explicit disconnect turns supervision off. A failed attempt fences the
//! (agent, model) pair it was made for, so a missing credential is not
//! retried in a loop.

use crate::session::SessionStatus;
use tracing::debug;

#[derive(Debug, Default)]
pub struct AutoConnectSupervisor {
    enabled: bool,
    fenced: Option<(String, String)>,
}

impl AutoConnectSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// User toggled on. Clears any fence.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.fenced = None;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn record_failure(&mut self, agent: &str, model: &str) {
        debug!(agent, model, "Fencing auto-connect after failed attempt");
        self.fenced = Some((agent.to_string(), model.to_string()));
    }

    pub fn record_success(&mut self) {
        self.fenced = None;
    }

    pub fn should_connect(&self, agent: Option<&str>, status: SessionStatus, model: &str) -> bool {
        let Some(agent) = agent else {
            return false;
        };
        if !self.enabled || status != SessionStatus::Disconnected {
            return false;
        }
        match &self.fenced {
            Some((a, m)) => a != agent || m != model,
            None => true,
        }
    }
}
