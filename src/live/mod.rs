//! Real-time voice tutoring over the bidirectional live-audio session.

pub mod pipeline;
pub mod protocol;
pub mod session;

pub use pipeline::{VoicePipeline, VoiceSessionConfig};

use std::sync::atomic::{AtomicU8, Ordering};

/// Events surfaced by a live session, provider framing stripped away.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// Server accepted the setup message — ready to stream.
    SetupComplete,
    /// One base64 chunk of 24 kHz mono model speech.
    Audio { data: String },
    /// User barge-in: queued model speech must be discarded.
    Interrupted,
    /// Model finished a response turn.
    TurnComplete,
    /// Transport or server error; the session is over.
    Error { message: String },
    /// Server closed the connection.
    Closed,
}

/// Lifecycle of one voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    Active = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Active,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Atomic session lifecycle, shared between the command handler, the
/// session task, and the playback thread.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: AtomicU8,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle as u8),
        }
    }

    pub fn current(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Idle -> Connecting. False if a session is already underway.
    pub fn start_connecting(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Connecting -> Active, on the server's open signal.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Any state -> Idle. True if this call performed the transition,
    /// so teardown events fire exactly once however the session ends.
    pub fn reset(&self) -> bool {
        self.state.swap(SessionState::Idle as u8, Ordering::AcqRel) != SessionState::Idle as u8
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.current(), SessionState::Idle);
        assert!(sm.start_connecting());
        assert_eq!(sm.current(), SessionState::Connecting);
        assert!(sm.activate());
        assert_eq!(sm.current(), SessionState::Active);
        assert!(sm.reset());
        assert_eq!(sm.current(), SessionState::Idle);
    }

    #[test]
    fn second_session_cannot_start_while_one_is_open() {
        let sm = SessionStateMachine::new();
        assert!(sm.start_connecting());
        assert!(!sm.start_connecting());
        sm.activate();
        assert!(!sm.start_connecting());
    }

    #[test]
    fn reset_fires_once() {
        let sm = SessionStateMachine::new();
        sm.start_connecting();
        assert!(sm.reset());
        assert!(!sm.reset());
        // stop before the session ever opened
        assert!(!sm.activate());
    }
}
