//! Process-wide session role.
//!
//! A process is either a capture device or a display device for its whole
//! lifetime. Only a capture session evaluates the input gate; lifecycle
//! events delivered to a display session are ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RelayError;
use crate::state::input::{InputCaptureState, InputGate, LifecycleEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    /// Samples pointer input and emits rays.
    Capture,
    /// Resolves rays against its environment and reports hits.
    Display,
}

impl FromStr for SessionRole {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "capture" => Ok(SessionRole::Capture),
            "display" => Ok(SessionRole::Display),
            other => Err(RelayError::Config(format!(
                "unknown role {other:?} (expected \"capture\" or \"display\")"
            ))),
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Capture => write!(f, "capture"),
            SessionRole::Display => write!(f, "display"),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// The role of this process plus, for capture sessions, its input gate.
#[derive(Debug, Clone)]
pub struct Session {
    role: SessionRole,
    gate: InputGate,
}

impl Session {
    pub fn new(role: SessionRole) -> Self {
        Self {
            role,
            gate: InputGate::new(),
        }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Fail with [`RelayError::RoleViolation`] unless this session has `role`.
    pub fn require(&self, role: SessionRole, action: &'static str) -> Result<(), RelayError> {
        if self.role == role {
            Ok(())
        } else {
            Err(RelayError::RoleViolation(action))
        }
    }

    /// The input gate, for capture sessions only.
    pub fn gate(&self) -> Option<&InputGate> {
        match self.role {
            SessionRole::Capture => Some(&self.gate),
            SessionRole::Display => None,
        }
    }

    pub fn input_state(&self) -> Option<InputCaptureState> {
        self.gate().map(InputGate::state)
    }

    /// Whether pointer input may produce capture messages right now.
    /// Always `false` on a display session.
    pub fn is_armed(&self) -> bool {
        self.gate().is_some_and(InputGate::is_armed)
    }

    /// Feed a lifecycle event. Returns the new state, or `None` when the
    /// session is a display and the event was ignored.
    pub fn on_lifecycle(&self, event: LifecycleEvent) -> Option<InputCaptureState> {
        match self.gate() {
            Some(gate) => {
                let state = gate.apply(event);
                debug!(?event, %state, "input capture state changed");
                Some(state)
            }
            None => {
                debug!(?event, "display session ignores lifecycle event");
                None
            }
        }
    }

    pub fn target_found(&self) -> Option<InputCaptureState> {
        self.on_lifecycle(LifecycleEvent::TargetFound)
    }

    pub fn target_lost(&self) -> Option<InputCaptureState> {
        self.on_lifecycle(LifecycleEvent::TargetLost)
    }

    pub fn manual_toggle(&self) -> Option<InputCaptureState> {
        self.on_lifecycle(LifecycleEvent::ManualToggle)
    }
}
