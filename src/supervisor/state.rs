//! Supervisor states

use crate::link::LinkError;
use crate::transport::SessionError;
use std::fmt;

/// Which layer a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLayer {
    Link,
    Session,
}

impl fmt::Display for FailureLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureLayer::Link => write!(f, "link"),
            FailureLayer::Session => write!(f, "session"),
        }
    }
}

/// Why the supervisor is backing off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffCause {
    pub layer: FailureLayer,
    pub message: String,
}

impl From<LinkError> for BackoffCause {
    fn from(err: LinkError) -> Self {
        Self {
            layer: FailureLayer::Link,
            message: err.to_string(),
        }
    }
}

impl From<SessionError> for BackoffCause {
    fn from(err: SessionError) -> Self {
        Self {
            layer: FailureLayer::Session,
            message: err.to_string(),
        }
    }
}

/// States of the connection-resilience state machine
///
/// ```text
/// Idle -> LinkUp -> SessionUp -> DiscoverySent -> Running{1} -> Running{2} -> ...
///   ^                                                                |
///   +------------------------- Backoff(cause) <----------------------+
/// ```
///
/// Any of `Idle`, `LinkUp`, `SessionUp` and `Running` fall through to
/// `Backoff` on a link or session failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing established; next step checks the link
    Idle,
    /// Link is up; next step opens a session
    LinkUp,
    /// Session is open; next step announces the device
    SessionUp,
    /// Discovery and availability published
    DiscoverySent,
    /// Sensor loop, `cycle` counts from 1 within a session
    Running { cycle: u64 },
    Backoff(BackoffCause),
}

impl SupervisorState {
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::LinkUp => "link_up",
            SupervisorState::SessionUp => "session_up",
            SupervisorState::DiscoverySent => "discovery_sent",
            SupervisorState::Running { .. } => "running",
            SupervisorState::Backoff(_) => "backoff",
        }
    }

    /// A session is expected to be held in this state
    pub fn holds_session(&self) -> bool {
        matches!(
            self,
            SupervisorState::SessionUp
                | SupervisorState::DiscoverySent
                | SupervisorState::Running { .. }
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Running { cycle } => write!(f, "running (cycle {cycle})"),
            SupervisorState::Backoff(cause) => {
                write!(f, "backoff ({} failure: {})", cause.layer, cause.message)
            }
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkState;

    #[test]
    fn test_backoff_cause_from_errors() {
        let cause = BackoffCause::from(LinkError::ConnectFailed(LinkState::Down));
        assert_eq!(cause.layer, FailureLayer::Link);
        assert!(cause.message.contains("Link Down"));

        let cause = BackoffCause::from(SessionError::broken("connection reset"));
        assert_eq!(cause.layer, FailureLayer::Session);
        assert!(cause.message.contains("connection reset"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SupervisorState::Idle.to_string(), "idle");
        assert_eq!(
            SupervisorState::Running { cycle: 3 }.to_string(),
            "running (cycle 3)"
        );
        let backoff = SupervisorState::Backoff(BackoffCause {
            layer: FailureLayer::Session,
            message: "Session broken: eof".to_string(),
        });
        assert_eq!(
            backoff.to_string(),
            "backoff (session failure: Session broken: eof)"
        );
    }

    #[test]
    fn test_holds_session() {
        assert!(!SupervisorState::Idle.holds_session());
        assert!(!SupervisorState::LinkUp.holds_session());
        assert!(SupervisorState::SessionUp.holds_session());
        assert!(SupervisorState::Running { cycle: 1 }.holds_session());
    }
}
