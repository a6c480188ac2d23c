//! Push channel lifecycle management.
//!
//! [`StreamClient`] executes the actions of a [`StreamMachine`]: it connects,
//! forwards decoded frames to the console, waits out the reconnect backoff
//! after transient failures, and clears the session when the server rejects
//! the credential. One client serves exactly one session epoch and only ever
//! presents the credential that epoch started with.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tungstenite::Message as WsMessage;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use super::handler::decode_frame;
use super::state::{Action, ConnectionEvent, StreamMachine};
use super::{OpenError, WsReader, connect};
use crate::event::{Message, Update};
use crate::session::{Credential, SessionStore};

/// Owner's handle on a running [`StreamClient`].
///
/// Dropping the handle stops the client.
pub struct StreamHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Asks the client to close its connection and exit. Pending reconnect
    /// timers are cancelled.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Returns `true` once the client task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the client task to exit.
    pub async fn finished(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

/// Push channel client for one session.
pub struct StreamClient {
    url: String,
    session: Arc<SessionStore>,
    credential: Option<Credential>,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    epoch: u64,
    tx: mpsc::UnboundedSender<Message>,
    machine: StreamMachine,
}

impl StreamClient {
    /// Creates a client that tags every update with `epoch`.
    ///
    /// The credential is taken from the store now, and only if the store is
    /// still at `epoch`; later logins do not reach this client.
    #[must_use]
    pub fn new(
        url: String,
        session: Arc<SessionStore>,
        tls_config: Option<Arc<rustls::ClientConfig>>,
        epoch: u64,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let credential = session.credential_for(epoch);
        Self {
            url,
            session,
            credential,
            tls_config,
            epoch,
            tx,
            machine: StreamMachine::new(),
        }
    }

    /// Spawns the client on the current runtime.
    pub fn spawn(self) -> StreamHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        StreamHandle {
            stop: stop_tx,
            task,
        }
    }

    /// Runs until stopped, or until the session is rejected.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let mut action = self.transition(ConnectionEvent::Start {
            credential_present: self.credential.is_some(),
        });

        loop {
            if *stop.borrow() && matches!(action, Action::Connect | Action::Wait(_)) {
                action = self.transition(ConnectionEvent::Stop);
            }

            match action {
                Action::Connect => action = self.connect_and_read(&mut stop).await,
                Action::Wait(delay) => {
                    info!(
                        epoch = self.epoch,
                        attempt = self.machine.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Push channel down, backing off"
                    );
                    action = tokio::select! {
                        () = tokio::time::sleep(delay) => self.transition(ConnectionEvent::BackoffElapsed),
                        _ = stop.changed() => self.transition(ConnectionEvent::Stop),
                    };
                }
                Action::Expire => {
                    warn!(epoch = self.epoch, "Push channel rejected the credential");
                    self.send(Update::SessionExpired);
                    return;
                }
                Action::Halt => {
                    info!(epoch = self.epoch, "Push channel stopped");
                    return;
                }
                Action::Idle => {
                    debug!(epoch = self.epoch, "Push channel has nothing to do");
                    return;
                }
            }
        }
    }

    /// Opens one connection and reads it until it ends.
    async fn connect_and_read(&mut self, stop: &mut watch::Receiver<bool>) -> Action {
        let Some(credential) = self.credential.clone() else {
            return self.transition(ConnectionEvent::Stop);
        };

        info!(url = %self.url, epoch = self.epoch, "Connecting push channel");
        let opened = tokio::select! {
            result = connect(&self.url, &credential, self.tls_config.clone()) => result,
            _ = stop.changed() => return self.transition(ConnectionEvent::Stop),
        };

        let (mut write, mut read) = match opened {
            Ok(pair) => pair,
            Err(OpenError::AuthRejected(status)) => {
                warn!(status, "Push channel handshake refused");
                return self.transition(ConnectionEvent::OpenFailed {
                    auth_rejected: true,
                });
            }
            Err(OpenError::Failed(e)) => {
                warn!(error = %e, "Push channel connection failed");
                return self.transition(ConnectionEvent::OpenFailed {
                    auth_rejected: false,
                });
            }
        };

        self.transition(ConnectionEvent::Opened);
        info!(epoch = self.epoch, "Push channel connected");

        let event = read_frames(&mut read, stop, self.epoch, &self.tx).await;
        if event == ConnectionEvent::Stop {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            if let Err(e) = write.send(WsMessage::Close(Some(frame))).await {
                debug!(error = %e, "Failed to send close frame");
            }
        }
        self.transition(event)
    }

    /// Feeds `event` to the state machine and publishes the outcome.
    ///
    /// On expiry the session is cleared, if it is still this client's, before
    /// the new state is published.
    fn transition(&mut self, event: ConnectionEvent) -> Action {
        let before = self.machine.state();
        let action = self.machine.handle(event);

        if action == Action::Expire {
            self.session.clear_if(self.epoch);
        }
        let after = self.machine.state();
        if after != before {
            debug!(epoch = self.epoch, ?before, ?after, ?event, "Push channel transition");
            self.send(Update::Connection(after));
        }
        action
    }

    fn send(&self, update: Update) {
        let _ = self.tx.send(Message::update(self.epoch, update));
    }
}

/// Reads frames until the connection ends or a stop is requested.
async fn read_frames(
    read: &mut WsReader,
    stop: &mut watch::Receiver<bool>,
    epoch: u64,
    tx: &mpsc::UnboundedSender<Message>,
) -> ConnectionEvent {
    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(message) = decode_frame(text.as_str())
                        && tx.send(Message::update(epoch, Update::Stream(message))).is_err()
                    {
                        return ConnectionEvent::Stop;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    info!(?code, "Push channel closed by server");
                    return ConnectionEvent::Closed { code };
                }
                Some(Ok(_)) => {} // Binary/Ping/Pong frames
                Some(Err(e)) => {
                    warn!(error = %e, "Push channel error");
                    return ConnectionEvent::Closed { code: None };
                }
                None => {
                    warn!("Push channel stream ended");
                    return ConnectionEvent::Closed { code: None };
                }
            },
            _ = stop.changed() => return ConnectionEvent::Stop,
        }
    }
}
