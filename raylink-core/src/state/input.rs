//! Armed/Disarmed input-capture state.
//!
//! ```text
//!            target_found / manual_toggle
//!          ┌──────────────────────────────┐
//!          ▼                              │
//!       Armed ──── target_lost ────► Disarmed
//!          │        manual_toggle         ▲
//!          └──────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether pointer input may currently produce capture messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputCaptureState {
    #[default]
    Armed,
    Disarmed,
}

impl InputCaptureState {
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed)
    }

    fn from_armed(armed: bool) -> Self {
        if armed { Self::Armed } else { Self::Disarmed }
    }
}

impl fmt::Display for InputCaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// External triggers that drive [`InputCaptureState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The anchor came into view.
    TargetFound,
    /// The anchor was lost by the tracker.
    TargetLost,
    /// The user flipped the capture switch.
    ManualToggle,
}

/// Shared handle to the input-capture state.
///
/// Clones observe and mutate the same state, so the lifecycle handler
/// and the capture loop can run on different tasks without a lock.
#[derive(Debug, Clone)]
pub struct InputGate {
    armed: Arc<AtomicBool>,
}

impl Default for InputGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InputGate {
    /// A new gate, starting Armed.
    pub fn new() -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn state(&self) -> InputCaptureState {
        InputCaptureState::from_armed(self.armed.load(Ordering::SeqCst))
    }

    pub fn is_armed(&self) -> bool {
        self.state().is_armed()
    }

    pub fn target_found(&self) -> InputCaptureState {
        self.armed.store(true, Ordering::SeqCst);
        InputCaptureState::Armed
    }

    pub fn target_lost(&self) -> InputCaptureState {
        self.armed.store(false, Ordering::SeqCst);
        InputCaptureState::Disarmed
    }

    /// Invert the current state, returning the new one.
    pub fn manual_toggle(&self) -> InputCaptureState {
        let previous = self.armed.fetch_xor(true, Ordering::SeqCst);
        InputCaptureState::from_armed(!previous)
    }

    pub fn apply(&self, event: LifecycleEvent) -> InputCaptureState {
        match event {
            LifecycleEvent::TargetFound => self.target_found(),
            LifecycleEvent::TargetLost => self.target_lost(),
            LifecycleEvent::ManualToggle => self.manual_toggle(),
        }
    }
}
