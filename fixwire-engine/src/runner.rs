/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! The per-session drive loop.
//!
//! One task per session: a single `select!` over framed reads, the next
//! timer deadline, queued outbound requests, and cancellation. Every
//! branch funnels through the state machine, whose [`Outcome`] is applied
//! in order: frames to the transport first, then application callbacks,
//! strictly serialized.

use crate::application::Application;
use bytes::BytesMut;
use fixwire_core::error::{FixError, SessionError};
use fixwire_core::types::SessionId;
use fixwire_session::admin::OutboundMessage;
use fixwire_session::session::{
    AppEvent, Disconnect, LogonDecision, Outcome, Session, SessionEvent,
};
use fixwire_transport::FixCodec;
use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Capacity of the outbound application-message queue.
const OUTBOUND_QUEUE: usize = 64;

/// Handle for talking to a running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<OutboundMessage>,
    token: CancellationToken,
}

impl SessionHandle {
    /// Creates a handle and the queue end consumed by [`run_session`].
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE);
        (
            Self {
                sender,
                token: CancellationToken::new(),
            },
            receiver,
        )
    }

    /// Queues an application message for the session task.
    ///
    /// The message is sequenced and written by the session task; a send
    /// made from inside a callback goes out after the callback returns.
    ///
    /// # Errors
    /// Returns `SessionError::Connection` if the session task is gone.
    pub async fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SessionError::Connection("session task terminated".to_string()))
    }

    /// Requests a graceful shutdown: Logout, bounded by the configured
    /// grace period, then close.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Returns the cancellation token backing [`SessionHandle::shutdown`].
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Drives one session over a byte stream until it closes.
///
/// Generic over the stream so tests can run two sessions back to back
/// over an in-memory duplex pipe.
///
/// # Errors
/// Returns `FixError` on store failure or a broken transport write; a
/// peer-side framing error closes the session but is not an error here.
pub async fn run_session<T, A>(
    io: T,
    mut session: Session,
    application: Arc<A>,
    handle: SessionHandle,
    mut outbound: mpsc::Receiver<OutboundMessage>,
) -> Result<(), FixError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    A: Application + ?Sized,
{
    let session_id = session.session_id();
    let codec = FixCodec::new()
        .with_max_message_size(session.config().max_message_size)
        .with_checksum_validation(session.config().validate_checksum);
    let mut framed = Framed::new(io, codec);
    let token = handle.token();

    application.on_create(&session_id, handle.clone()).await;

    let outcome = session.start().await?;
    if apply_outcome(&mut framed, &mut session, &application, &session_id, outcome).await? {
        return Ok(());
    }

    let mut shutdown_requested = false;
    loop {
        let deadline = session.next_deadline();
        let timer = async {
            match deadline {
                Some((id, at)) => {
                    tokio::time::sleep_until(at).await;
                    id
                }
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            maybe_frame = framed.next() => match maybe_frame {
                Some(Ok(frame)) => {
                    session.on_event(SessionEvent::FrameReceived(frame)).await?
                }
                Some(Err(err)) => {
                    // Framing failure: the stream is untrusted, close
                    // without a Logout.
                    warn!(session = %session_id, %err, "framing error, disconnecting");
                    session.on_event(SessionEvent::TransportClosed).await?
                }
                None => session.on_event(SessionEvent::TransportClosed).await?,
            },
            id = timer => session.on_event(SessionEvent::TimerFired(id)).await?,
            Some(message) = outbound.recv() => {
                match session.send_app(&message).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(session = %session_id, %err, "application send dropped");
                        Outcome::default()
                    }
                }
            },
            () = token.cancelled(), if !shutdown_requested => {
                shutdown_requested = true;
                session.on_event(SessionEvent::Shutdown).await?
            },
        };

        if apply_outcome(&mut framed, &mut session, &application, &session_id, outcome).await? {
            return Ok(());
        }
    }
}

/// Writes the outcome's frames, dispatches its application events in
/// order, and closes the transport when the session is done.
///
/// Returns true when the session reached its terminal state.
async fn apply_outcome<T, A>(
    framed: &mut Framed<T, FixCodec>,
    session: &mut Session,
    application: &Arc<A>,
    session_id: &SessionId,
    outcome: Outcome,
) -> Result<bool, FixError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    A: Application + ?Sized,
{
    let mut frames: VecDeque<BytesMut> = outcome.frames.into();
    let mut events: VecDeque<AppEvent> = outcome.events.into();
    let mut disconnect = outcome.disconnect;

    loop {
        while let Some(frame) = frames.pop_front() {
            if let Err(err) = framed.send(frame).await {
                warn!(session = %session_id, %err, "transport write failed");
                return Err(std::io::Error::other(err).into());
            }
        }

        let Some(event) = events.pop_front() else {
            break;
        };
        match event {
            AppEvent::LogonRequest(message) => {
                let decision = match application.on_logon_request(session_id, &message).await {
                    Ok(()) => LogonDecision::Accept,
                    Err(reject) => LogonDecision::Reject {
                        reason: reject.reason,
                    },
                };
                let follow = session.on_logon_decision(decision).await?;
                frames.extend(follow.frames);
                events.extend(follow.events);
                if disconnect.is_none() {
                    disconnect = follow.disconnect;
                }
            }
            AppEvent::LoggedOn => application.on_logon(session_id).await,
            AppEvent::LoggedOut => application.on_logout(session_id).await,
            AppEvent::AdminReceived(message) => {
                application.from_admin(&message, session_id).await;
            }
            AppEvent::Message(message) => application.from_app(&message, session_id).await,
        }
    }

    match disconnect {
        Some(Disconnect::Graceful) => {
            info!(session = %session_id, "session closed");
        }
        Some(Disconnect::Framing) => {
            warn!(session = %session_id, "session closed on framing failure");
        }
        Some(Disconnect::Error(err)) => {
            warn!(session = %session_id, %err, "session closed with error");
        }
        None => return Ok(false),
    }

    let _ = futures::SinkExt::<BytesMut>::close(framed).await;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{LogonReject, NoOpApplication};
    use fixwire_core::message::{MsgType, OwnedMessage};
    use fixwire_core::types::CompId;
    use fixwire_session::config::SessionConfig;
    use fixwire_session::state::SessionRole;
    use fixwire_store::MemoryStore;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingApp {
        logged_on: Mutex<bool>,
        logged_out: Mutex<bool>,
        messages: Mutex<Vec<String>>,
        reject_logon: Option<String>,
    }

    #[async_trait::async_trait]
    impl Application for RecordingApp {
        async fn on_create(&self, _session_id: &SessionId, _handle: SessionHandle) {}

        async fn on_logon(&self, _session_id: &SessionId) {
            *self.logged_on.lock() = true;
        }

        async fn on_logout(&self, _session_id: &SessionId) {
            *self.logged_out.lock() = true;
        }

        async fn on_logon_request(
            &self,
            _session_id: &SessionId,
            _message: &OwnedMessage,
        ) -> Result<(), LogonReject> {
            match &self.reject_logon {
                Some(reason) => Err(LogonReject::new(reason.clone())),
                None => Ok(()),
            }
        }

        async fn from_admin(&self, _message: &OwnedMessage, _session_id: &SessionId) {}

        async fn from_app(&self, message: &OwnedMessage, _session_id: &SessionId) {
            let id = message.get_field_str(11).unwrap_or("?").to_string();
            self.messages.lock().push(id);
        }
    }

    fn initiator_session() -> Session {
        let config = SessionConfig::new(
            CompId::new("INIT").unwrap(),
            CompId::new("ACC").unwrap(),
            "FIX.4.4",
        )
        .with_logout_timeout(Duration::from_millis(200));
        Session::new(config, SessionRole::Initiator, Arc::new(MemoryStore::new()))
    }

    fn acceptor_session() -> Session {
        let config = SessionConfig::new(
            CompId::new("ACC").unwrap(),
            CompId::new("INIT").unwrap(),
            "FIX.4.4",
        )
        .with_logout_timeout(Duration::from_millis(200));
        Session::new(config, SessionRole::Acceptor, Arc::new(MemoryStore::new()))
    }

    async fn wait_for(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_loopback_logon_message_and_logout() {
        let (initiator_io, acceptor_io) = tokio::io::duplex(4096);

        let init_app = Arc::new(RecordingApp::default());
        let acc_app = Arc::new(RecordingApp::default());

        let (init_handle, init_rx) = SessionHandle::new();
        let (acc_handle, acc_rx) = SessionHandle::new();

        let init_task = tokio::spawn(run_session(
            initiator_io,
            initiator_session(),
            Arc::clone(&init_app),
            init_handle.clone(),
            init_rx,
        ));
        let acc_task = tokio::spawn(run_session(
            acceptor_io,
            acceptor_session(),
            Arc::clone(&acc_app),
            acc_handle,
            acc_rx,
        ));

        {
            let init_app = Arc::clone(&init_app);
            let acc_app = Arc::clone(&acc_app);
            wait_for(move || *init_app.logged_on.lock() && *acc_app.logged_on.lock()).await;
        }

        // An application message flows initiator -> acceptor, in order.
        let order = OutboundMessage::new(MsgType::NewOrderSingle).field(11, "ORDER1");
        init_handle.send(order).await.unwrap();
        {
            let acc_app = Arc::clone(&acc_app);
            wait_for(move || !acc_app.messages.lock().is_empty()).await;
        }
        assert_eq!(acc_app.messages.lock().clone(), vec!["ORDER1".to_string()]);

        // Graceful shutdown from the initiator side.
        init_handle.shutdown();
        init_task.await.unwrap().unwrap();
        acc_task.await.unwrap().unwrap();

        assert!(*init_app.logged_out.lock());
        assert!(*acc_app.logged_out.lock());
    }

    #[tokio::test]
    async fn test_loopback_logon_rejected() {
        let (initiator_io, acceptor_io) = tokio::io::duplex(4096);

        let init_app = Arc::new(RecordingApp::default());
        let acc_app = Arc::new(RecordingApp {
            reject_logon: Some("unknown counterparty".to_string()),
            ..RecordingApp::default()
        });

        let (init_handle, init_rx) = SessionHandle::new();
        let (acc_handle, acc_rx) = SessionHandle::new();

        let init_task = tokio::spawn(run_session(
            initiator_io,
            initiator_session(),
            Arc::clone(&init_app),
            init_handle,
            init_rx,
        ));
        let acc_task = tokio::spawn(run_session(
            acceptor_io,
            acceptor_session(),
            Arc::clone(&acc_app),
            acc_handle,
            acc_rx,
        ));

        init_task.await.unwrap().unwrap();
        acc_task.await.unwrap().unwrap();

        assert!(!*init_app.logged_on.lock());
        assert!(!*acc_app.logged_on.lock());
    }

    #[tokio::test]
    async fn test_handle_send_before_logon_is_dropped() {
        let (initiator_io, _held_peer) = tokio::io::duplex(4096);

        let app = Arc::new(NoOpApplication);
        let (handle, rx) = SessionHandle::new();

        let task = tokio::spawn(run_session(
            initiator_io,
            initiator_session(),
            app,
            handle.clone(),
            rx,
        ));

        // Not authenticated yet: the send is logged and dropped, the
        // session keeps running.
        let order = OutboundMessage::new(MsgType::NewOrderSingle).field(11, "EARLY");
        handle.send(order).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        handle.shutdown();
        task.await.unwrap().unwrap();
    }
}
