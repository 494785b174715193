//! Runs a [`Session`] against a real [`Transport`] on a tokio task.
//!
//! The driver owns the transport and both timers. Commands arrive from a
//! [`SessionHandle`]; state goes out as [`SessionSnapshot`]s on a watch
//! channel and [`SessionNotice`]s on an unbounded queue.

use crate::machine::{Effect, Session, SessionEvent, SessionNotice, SessionSnapshot};
use crate::room::RoomCode;
use crate::transport::{Transport, TransportEvent};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

/// What the UI can ask a running session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Create a room.
    Host,
    /// Join a room.
    Join(RoomCode),
    /// Play a square.
    Move(usize),
    /// Start a new game.
    Reset,
    /// Send a chat line.
    Chat(String),
    /// Send an emoji.
    Emoji(String),
    /// Nudge the opponent.
    Nudge,
    /// Leave the room.
    Leave,
}

impl From<SessionCommand> for SessionEvent {
    fn from(command: SessionCommand) -> Self {
        match command {
            SessionCommand::Host => SessionEvent::Host,
            SessionCommand::Join(code) => SessionEvent::Join { code },
            SessionCommand::Move(index) => SessionEvent::LocalMove { index },
            SessionCommand::Reset => SessionEvent::LocalReset,
            SessionCommand::Chat(text) => SessionEvent::SendChat { text },
            SessionCommand::Emoji(emoji) => SessionEvent::SendEmoji { emoji },
            SessionCommand::Nudge => SessionEvent::SendNudge,
            SessionCommand::Leave => SessionEvent::Leave,
        }
    }
}

impl From<TransportEvent> for SessionEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Opened {
                conn,
                remote,
                inbound,
            } => SessionEvent::ConnectionOpened {
                conn,
                remote,
                inbound,
            },
            TransportEvent::Message { conn, payload } => SessionEvent::Message { conn, payload },
            TransportEvent::Closed { conn } => SessionEvent::ConnectionClosed(conn),
            TransportEvent::Failed(err) => SessionEvent::TransportFailed(err),
        }
    }
}

/// The UI side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notices: mpsc::UnboundedReceiver<SessionNotice>,
}

impl SessionHandle {
    /// Queues a command. Returns false if the driver has stopped.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits until the state satisfies `predicate`, returning that state.
    /// Returns `None` if the driver stopped first.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        self.snapshots
            .wait_for(predicate)
            .await
            .ok()
            .map(|snapshot| snapshot.clone())
    }

    /// Next notice, or `None` once the driver stopped and the queue drained.
    pub async fn next_notice(&mut self) -> Option<SessionNotice> {
        self.notices.recv().await
    }
}

/// Timer state owned by the driver.
#[derive(Debug, Default)]
struct Timers {
    connect_deadline: Option<Instant>,
    heartbeat: Option<(Instant, Duration)>,
}

/// Owns one session, its transport and its timers.
pub struct SessionDriver<T: Transport> {
    session: Session,
    transport: T,
    timers: Timers,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    notices: mpsc::UnboundedSender<SessionNotice>,
}

impl<T: Transport + 'static> SessionDriver<T> {
    /// Wires a session to a transport and returns the driver with its handle.
    pub fn new(session: Session, transport: T) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let driver = Self {
            session,
            transport,
            timers: Timers::default(),
            commands: command_rx,
            snapshots: snapshot_tx,
            notices: notice_tx,
        };
        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            notices: notice_rx,
        };
        (driver, handle)
    }

    /// Spawns the driver on the current tokio runtime.
    pub fn spawn(session: Session, transport: T) -> (SessionHandle, JoinHandle<()>) {
        let (driver, handle) = Self::new(session, transport);
        (handle, tokio::spawn(driver.run()))
    }

    /// Runs until every handle is dropped, then leaves the room.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!("Session driver started");
        loop {
            let connect_deadline = self.timers.connect_deadline;
            let heartbeat = self.timers.heartbeat;
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => SessionEvent::from(command),
                    None => break,
                },
                event = self.transport.next_event() => SessionEvent::from(event),
                _ = sleep_until(connect_deadline.unwrap_or_else(Instant::now)), if connect_deadline.is_some() => {
                    SessionEvent::ConnectTimeout
                }
                _ = sleep_until(heartbeat.map_or_else(Instant::now, |(at, _)| at)), if heartbeat.is_some() => {
                    SessionEvent::HeartbeatTick
                }
            };
            match event {
                SessionEvent::ConnectTimeout => self.timers.connect_deadline = None,
                SessionEvent::HeartbeatTick => {
                    if let Some((at, period)) = self.timers.heartbeat {
                        self.timers.heartbeat = Some((at + period, period));
                    }
                }
                _ => {}
            }
            self.dispatch(event).await;
        }

        debug!("All handles dropped");
        self.dispatch(SessionEvent::Leave).await;
        info!("Session driver stopped");
    }

    /// Feeds one event through the session and runs the resulting effects,
    /// including any events those effects produce.
    async fn dispatch(&mut self, event: SessionEvent) {
        let mut queue: VecDeque<Effect> = self.session.handle(event).into();
        while let Some(effect) = queue.pop_front() {
            if let Some(follow_up) = self.execute(effect).await {
                queue.extend(self.session.handle(follow_up));
            }
        }
        self.snapshots.send_replace(self.session.snapshot());
    }

    async fn execute(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::OpenEndpoint { id } => match self.transport.open(id).await {
                Ok(id) => Some(SessionEvent::EndpointOpened { id }),
                Err(err) => Some(SessionEvent::TransportFailed(err)),
            },
            Effect::Connect { remote } => match self.transport.connect(&remote).await {
                Ok(conn) => {
                    debug!(%remote, conn, "Dialing");
                    None
                }
                Err(err) => Some(SessionEvent::TransportFailed(err)),
            },
            Effect::Send { conn, message } => {
                let payload = match message.encode() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, kind = message.kind(), "Could not encode message");
                        return None;
                    }
                };
                if let Err(err) = self.transport.send(conn, payload).await {
                    warn!(error = %err, conn, kind = message.kind(), "Send failed");
                }
                None
            }
            Effect::CloseConnection(conn) => {
                self.transport.close(conn).await;
                None
            }
            Effect::DestroyEndpoint => {
                self.transport.destroy().await;
                None
            }
            Effect::ArmConnectTimeout(after) => {
                self.timers.connect_deadline = Some(Instant::now() + after);
                None
            }
            Effect::CancelConnectTimeout => {
                self.timers.connect_deadline = None;
                None
            }
            Effect::StartHeartbeat(period) => {
                self.timers.heartbeat = Some((Instant::now() + period, period));
                None
            }
            Effect::StopHeartbeat => {
                self.timers.heartbeat = None;
                None
            }
            Effect::Notify(notice) => {
                // Nobody listening is fine; the UI may only watch snapshots.
                let _ = self.notices.send(notice);
                None
            }
        }
    }
}
