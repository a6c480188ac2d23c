//! Push channel connection state machine and reconnect backoff.
//!
//! [`StreamMachine`] is a pure value: it consumes [`ConnectionEvent`]s and
//! answers with the [`Action`] the client must perform next. Keeping it free
//! of I/O makes every transition testable without sockets.

use std::time::Duration;

/// Close code the server uses to signal an invalid credential.
pub const AUTH_REJECT_CLOSE_CODE: u16 = 4401;

/// Delay before the first reconnect attempt.
const BASE_BACKOFF_MS: u64 = 1000;

/// Upper bound on any reconnect delay.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Attempts beyond this no longer grow the exponent.
const MAX_BACKOFF_EXPONENT: u32 = 4;

/// Delay before reconnect attempt number `attempt` (zero-based).
///
/// `min(10s, 1s * 2^min(attempt, 4))`: 1s, 2s, 4s, 8s, then 10s forever.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
    Duration::from_millis(MAX_BACKOFF_MS.min(BASE_BACKOFF_MS << exponent))
}

/// Push channel connection state shown to the operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Returns a display string for the state.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Live",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::Disconnected => "Offline",
        }
    }
}

/// Inputs to the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The client was started; `credential_present` says whether it can connect.
    Start { credential_present: bool },
    /// The handshake completed.
    Opened,
    /// The handshake failed.
    OpenFailed { auth_rejected: bool },
    /// An open connection ended; `code` is the close frame code, if any.
    Closed { code: Option<u16> },
    /// The reconnect delay elapsed.
    BackoffElapsed,
    /// The owner asked the client to stop.
    Stop,
}

/// What the client must do after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Open a connection.
    Connect,
    /// Sleep, then feed [`ConnectionEvent::BackoffElapsed`].
    Wait(Duration),
    /// The credential was rejected: clear it and stop for good.
    Expire,
    /// Stop for good without touching the credential.
    Halt,
    /// Nothing to do.
    Idle,
}

/// Connection lifecycle of one session's push channel.
#[derive(Debug, Default)]
pub struct StreamMachine {
    state: ConnectionState,
    attempt: u32,
    terminated: bool,
}

impl StreamMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failed attempts since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// `true` once the machine has expired or halted.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Applies `event` and returns the next action.
    pub fn handle(&mut self, event: ConnectionEvent) -> Action {
        if self.terminated {
            return Action::Idle;
        }

        use ConnectionEvent as E;
        use ConnectionState as S;
        match (self.state, event) {
            (_, E::Stop) => self.terminate(Action::Halt),

            (S::Disconnected, E::Start { credential_present }) => {
                if credential_present {
                    self.state = S::Connecting;
                    Action::Connect
                } else {
                    Action::Idle
                }
            }

            (S::Connecting, E::Opened) => {
                self.state = S::Connected;
                self.attempt = 0;
                Action::Idle
            }
            (S::Connecting, E::OpenFailed { auth_rejected: true }) => {
                self.terminate(Action::Expire)
            }
            (S::Connecting, E::OpenFailed { auth_rejected: false }) => self.schedule_reconnect(),

            (S::Connected, E::Closed { code }) if code == Some(AUTH_REJECT_CLOSE_CODE) => {
                self.terminate(Action::Expire)
            }
            (S::Connected, E::Closed { .. }) => self.schedule_reconnect(),

            (S::Reconnecting, E::BackoffElapsed) => {
                self.state = S::Connecting;
                Action::Connect
            }

            _ => Action::Idle,
        }
    }

    fn schedule_reconnect(&mut self) -> Action {
        let delay = reconnect_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.state = ConnectionState::Reconnecting;
        Action::Wait(delay)
    }

    fn terminate(&mut self, action: Action) -> Action {
        self.state = ConnectionState::Disconnected;
        self.terminated = true;
        action
    }
}
