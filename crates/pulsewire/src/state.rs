//! Session lifecycle: Idle -> Active -> Ending -> Idle.
//!
//! The machine only records state; it does not talk to the backend. The
//! coordinator drives it and decides when teardown is complete. Every
//! transition is published on a watch channel so batch listeners can check
//! the current state without taking the coordinator's lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

use crate::error::Error;

/// Unique identifier for a monitoring session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a new unique session ID
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4();
        Self(format!("session-{}-{}", millis, random.as_simple()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Active,
    Ending,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Ending => "ending",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One start-to-stop monitoring period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Holds at most one session and enforces the legal transitions.
#[derive(Debug)]
pub struct SessionStateMachine {
    session: Option<Session>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            session: None,
            state_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Receiver that observes every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Fails with `AlreadyRunning` unless Idle.
    pub fn ensure_idle(&self) -> Result<(), Error> {
        match self.state() {
            SessionState::Idle => Ok(()),
            SessionState::Active | SessionState::Ending => Err(Error::AlreadyRunning),
        }
    }

    /// Idle -> Active. The backend must already have accepted the configuration.
    pub fn activate(&mut self, at: DateTime<Utc>) -> Result<&Session, Error> {
        self.ensure_idle()?;

        let session = Session {
            id: SessionId::generate(),
            state: SessionState::Active,
            started_at: at,
            ended_at: None,
        };
        self.publish(SessionState::Active);
        Ok(self.session.insert(session))
    }

    /// Active -> Ending. A session already Ending counts as not running.
    pub fn begin_ending(&mut self, at: DateTime<Utc>) -> Result<Session, Error> {
        let session = match self.session.as_mut() {
            Some(session) if session.state == SessionState::Active => session,
            _ => return Err(Error::NotRunning),
        };

        session.state = SessionState::Ending;
        session.ended_at = Some(at);
        let snapshot = session.clone();
        self.publish(SessionState::Ending);
        Ok(snapshot)
    }

    /// Ending -> Idle once teardown is done. Returns the finished session.
    pub fn finish(&mut self) -> Result<Session, Error> {
        match self.session.take() {
            Some(mut session) if session.state == SessionState::Ending => {
                session.state = SessionState::Idle;
                self.publish(SessionState::Idle);
                Ok(session)
            }
            other => {
                self.session = other;
                Err(Error::NotRunning)
            }
        }
    }

    fn publish(&self, state: SessionState) {
        // send_replace never fails, even with no receivers
        self.state_tx.send_replace(state);
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
    fn test_starts_idle() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(machine.session().is_none());
    }

    #[test]
    fn test_full_cycle() {
        let mut machine = SessionStateMachine::new();
        let started = Utc::now();

        let id = machine.activate(started).unwrap().id.clone();
        assert_eq!(machine.state(), SessionState::Active);

        let ending = machine.begin_ending(Utc::now()).unwrap();
        assert_eq!(ending.id, id);
        assert_eq!(ending.state, SessionState::Ending);
        assert!(ending.ended_at.is_some());
        assert_eq!(machine.state(), SessionState::Ending);

        let done = machine.finish().unwrap();
        assert_eq!(done.id, id);
        assert_eq!(done.started_at, started);
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(machine.session().is_none());
    }

    #[test]
    fn test_double_activate_is_already_running() {
        let mut machine = SessionStateMachine::new();
        machine.activate(Utc::now()).unwrap();
        assert!(matches!(machine.activate(Utc::now()), Err(Error::AlreadyRunning)));
        assert_eq!(machine.state(), SessionState::Active);
    }

    #[test]
    fn test_activate_while_ending_is_already_running() {
        let mut machine = SessionStateMachine::new();
        machine.activate(Utc::now()).unwrap();
        machine.begin_ending(Utc::now()).unwrap();
        assert!(matches!(machine.activate(Utc::now()), Err(Error::AlreadyRunning)));
        assert_eq!(machine.state(), SessionState::Ending);
    }

    #[test]
    fn test_stop_while_idle_is_not_running() {
        let mut machine = SessionStateMachine::new();
        assert!(matches!(machine.begin_ending(Utc::now()), Err(Error::NotRunning)));
        assert!(matches!(machine.finish(), Err(Error::NotRunning)));
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn test_second_stop_while_ending_is_not_running() {
        let mut machine = SessionStateMachine::new();
        machine.activate(Utc::now()).unwrap();
        machine.begin_ending(Utc::now()).unwrap();
        assert!(matches!(machine.begin_ending(Utc::now()), Err(Error::NotRunning)));
        assert_eq!(machine.state(), SessionState::Ending);
    }

    #[test]
    fn test_finish_requires_ending() {
        let mut machine = SessionStateMachine::new();
        machine.activate(Utc::now()).unwrap();
        assert!(matches!(machine.finish(), Err(Error::NotRunning)));
        assert_eq!(machine.state(), SessionState::Active);
    }

    #[test]
    fn test_transitions_are_published() {
        let mut machine = SessionStateMachine::new();
        let rx = machine.subscribe();
        assert_eq!(*rx.borrow(), SessionState::Idle);

        machine.activate(Utc::now()).unwrap();
        assert_eq!(*rx.borrow(), SessionState::Active);

        machine.begin_ending(Utc::now()).unwrap();
        assert_eq!(*rx.borrow(), SessionState::Ending);

        machine.finish().unwrap();
        assert_eq!(*rx.borrow(), SessionState::Idle);
    }
}
