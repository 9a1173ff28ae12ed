/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/8/26
******************************************************************************/

//! The session state machine.
//!
//! One [`Session`] owns the lifecycle of a single FIX session: logon
//! negotiation, keep-alive, sequence validation, gap recovery, resend
//! servicing and logout. It is driven by events (frames, timer firings,
//! shutdown) and answers each with an [`Outcome`]: frames to write,
//! application events to dispatch, and at most one disconnect signal.
//!
//! The machine performs its own store writes so the durability order is
//! under one roof: an outbound message is appended to the log and the
//! outgoing seqnum persisted before the frame is handed to the transport,
//! and the incoming seqnum is persisted before a message reaches the
//! application hook.

use crate::admin::{self, AdminMessage, OutboundMessage, encode_with_header};
use crate::config::SessionConfig;
use crate::resend::service_resend;
use crate::sequence::{SequenceCheck, SequenceManager};
use crate::state::{SessionRole, SessionState};
use crate::timers::{TimerId, Timers};
use crate::validate::{self, Violation};
use bytes::BytesMut;
use fixwire_core::error::{DecodeError, FixError, SessionError};
use fixwire_core::field::tags;
use fixwire_core::message::{OwnedMessage, RawMessage, SessionHeader};
use fixwire_core::types::{SessionId, Timestamp};
use fixwire_dictionary::Dictionary;
use fixwire_store::SessionStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// An input to the state machine.
#[derive(Debug)]
pub enum SessionEvent {
    /// A whole frame arrived from the transport.
    FrameReceived(BytesMut),
    /// A named timer fired.
    TimerFired(TimerId),
    /// The transport closed.
    TransportClosed,
    /// Local shutdown was requested.
    Shutdown,
}

/// An event for the application hook, dispatched by the runner in order.
#[derive(Debug)]
pub enum AppEvent {
    /// Acceptor only: a Logon arrived; answer with
    /// [`Session::on_logon_decision`].
    LogonRequest(OwnedMessage),
    /// The session reached the authenticated state.
    LoggedOn,
    /// The session logged out.
    LoggedOut,
    /// An admin message the application may care about (Reject).
    AdminReceived(OwnedMessage),
    /// An application message, in sequence order.
    Message(OwnedMessage),
}

/// Why the session is closing.
#[derive(Debug)]
pub enum Disconnect {
    /// Orderly logout completed.
    Graceful,
    /// Framing failure: close without Logout, the stream is untrusted.
    Framing,
    /// Protocol or timeout failure.
    Error(SessionError),
}

/// The acceptor application's answer to a logon request.
#[derive(Debug, Clone)]
pub enum LogonDecision {
    /// Accept the session.
    Accept,
    /// Refuse the session; a Logout with the reason is sent.
    Reject {
        /// Human-readable refusal reason.
        reason: String,
    },
}

/// Result of one event step: frames to write, application events to
/// dispatch, and at most one terminal signal.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Frames for the transport, in order.
    pub frames: Vec<BytesMut>,
    /// Application events, in order.
    pub events: Vec<AppEvent>,
    /// Set when the session is done with the transport.
    pub disconnect: Option<Disconnect>,
}

impl Outcome {
    fn new() -> Self {
        Self::default()
    }
}

/// The FIX session state machine.
pub struct Session {
    config: SessionConfig,
    role: SessionRole,
    dictionary: Option<Arc<Dictionary>>,
    store: Arc<dyn SessionStore>,
    state: SessionState,
    sequences: SequenceManager,
    timers: Timers,
    /// Heartbeat cadence in force; adopted from the Logon exchange.
    heartbeat_interval: Duration,
    /// TestReqID awaiting a Heartbeat answer.
    pending_test_req_id: Option<String>,
    test_req_counter: u64,
    /// Application messages received ahead of sequence, keyed by seqnum.
    resync_buffer: BTreeMap<u64, OwnedMessage>,
    /// Highest inbound seqnum seen while a gap is open.
    resync_target: u64,
    /// The peer's Logon carried ResetSeqNumFlag; echo it on the reply.
    peer_reset_requested: bool,
}

impl Session {
    /// Creates a session over the given store.
    #[must_use]
    pub fn new(config: SessionConfig, role: SessionRole, store: Arc<dyn SessionStore>) -> Self {
        let heartbeat_interval = config.heartbeat_interval;
        Self {
            config,
            role,
            dictionary: None,
            store,
            state: SessionState::Disconnected,
            sequences: SequenceManager::new(),
            timers: Timers::new(),
            heartbeat_interval,
            pending_test_req_id: None,
            test_req_counter: 0,
            resync_buffer: BTreeMap::new(),
            resync_target: 0,
            peer_reset_requested: false,
        }
    }

    /// Attaches a dictionary for inbound MsgType validation.
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the session role.
    #[must_use]
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Returns the session identity.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.config.session_id()
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the earliest armed timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<(TimerId, Instant)> {
        self.timers.next_deadline()
    }

    /// Starts the session on a freshly opened transport.
    ///
    /// Loads the durable sequence numbers, and for the initiator sends the
    /// Logon. Both roles arm the logon timer.
    ///
    /// # Errors
    /// Returns `FixError::Store` if the store cannot be read.
    pub async fn start(&mut self) -> Result<Outcome, FixError> {
        let mut out = Outcome::new();

        if self.config.reset_on_logon {
            self.store.reset().await?;
        }
        let (outgoing, incoming) = self.store.seqnums().await?;
        self.sequences.set_outgoing(outgoing);
        self.sequences.set_incoming(incoming);

        self.transition(SessionState::Connected);
        self.timers.arm(TimerId::Logon, self.config.logon_timeout);

        if self.role == SessionRole::Initiator {
            let logon = admin::logon(
                self.config.heartbeat_interval_secs(),
                self.config.reset_on_logon,
            );
            let frame = self.stamp_and_log(&logon).await?;
            out.frames.push(frame);
            self.transition(SessionState::LogonSent);
        }

        info!(
            session = %self.session_id(),
            role = %self.role,
            outgoing,
            incoming,
            "session started"
        );
        Ok(out)
    }

    /// Advances the machine on one event.
    ///
    /// # Errors
    /// Returns `FixError::Store` on store failure; the session must then be
    /// aborted before any unconfirmed message is released.
    pub async fn on_event(&mut self, event: SessionEvent) -> Result<Outcome, FixError> {
        match event {
            SessionEvent::FrameReceived(bytes) => self.on_frame(bytes).await,
            SessionEvent::TimerFired(id) => self.on_timer(id).await,
            SessionEvent::TransportClosed => Ok(self.on_transport_closed()),
            SessionEvent::Shutdown => self.shutdown().await,
        }
    }

    /// Sends an application message.
    ///
    /// # Errors
    /// Returns `SessionError::NotAuthenticated` unless the session is in
    /// the authenticated state.
    pub async fn send_app(&mut self, message: &OutboundMessage) -> Result<Outcome, FixError> {
        if !self.state.can_send_app() {
            return Err(SessionError::NotAuthenticated {
                state: self.state.to_string(),
            }
            .into());
        }
        let mut out = Outcome::new();
        let frame = self.stamp_and_log(message).await?;
        out.frames.push(frame);
        Ok(out)
    }

    /// Completes the acceptor logon handshake with the application's
    /// decision.
    ///
    /// # Errors
    /// Returns `FixError::Store` on store failure.
    pub async fn on_logon_decision(&mut self, decision: LogonDecision) -> Result<Outcome, FixError> {
        let mut out = Outcome::new();
        if self.state != SessionState::LogonReceived {
            warn!(state = %self.state, "logon decision outside handshake, ignored");
            return Ok(out);
        }

        match decision {
            LogonDecision::Accept => {
                // A rewound session (locally configured or requested by
                // the peer's Logon) must advertise the reset, or the
                // initiator keeps its old sequence expectations.
                let advertise_reset = self.config.reset_on_logon || self.peer_reset_requested;
                self.peer_reset_requested = false;
                let reply = admin::logon(self.heartbeat_interval.as_secs(), advertise_reset);
                let frame = self.stamp_and_log(&reply).await?;
                out.frames.push(frame);
                self.establish(&mut out);
            }
            LogonDecision::Reject { reason } => {
                info!(session = %self.session_id(), %reason, "logon rejected");
                let frame = self.stamp_and_log(&admin::logout(Some(&reason))).await?;
                out.frames.push(frame);
                self.close(&mut out, Disconnect::Error(SessionError::LogonRejected { reason }));
            }
        }
        Ok(out)
    }

    async fn on_frame(&mut self, bytes: BytesMut) -> Result<Outcome, FixError> {
        let mut out = Outcome::new();
        if self.state.is_terminal() {
            return Ok(out);
        }

        let mut decoder = fixwire_tagvalue::Decoder::new(&bytes)
            .with_checksum_validation(self.config.validate_checksum);
        let raw = match decoder.decode() {
            Ok(raw) => raw,
            Err(err) => {
                warn!(session = %self.session_id(), %err, "undecodable frame, disconnecting");
                self.close(&mut out, Disconnect::Framing);
                return Ok(out);
            }
        };

        // Any inbound traffic clears the outstanding test request and
        // resets the inbound-idle clock.
        let outstanding_test_req = self.pending_test_req_id.take();
        self.timers.cancel(TimerId::DeadPeer);
        if self.state.is_established() {
            self.timers
                .arm(TimerId::TestRequest, self.test_request_timeout());
        }

        let header = match SessionHeader::from_raw(&raw) {
            Ok(header) => header,
            Err(err) => {
                warn!(session = %self.session_id(), %err, "malformed header");
                let ref_seq = raw
                    .get_field(tags::MSG_SEQ_NUM)
                    .and_then(|f| f.as_u64().ok())
                    .unwrap_or(0);
                self.push_reject(&mut out, ref_seq, &err.to_string(), ref_tag_for(&err))
                    .await?;
                return Ok(out);
            }
        };

        if let Err(violation) = validate::validate_header(
            &self.config,
            self.dictionary.as_deref(),
            &header,
            Timestamp::now(),
        ) {
            return self.on_violation(violation, &header, out).await;
        }

        let admin_view = match AdminMessage::from_raw(&raw) {
            Ok(view) => view,
            Err(err) => {
                warn!(session = %self.session_id(), %err, "malformed admin message");
                self.push_reject(&mut out, header.msg_seq_num, &err.to_string(), ref_tag_for(&err))
                    .await?;
                return Ok(out);
            }
        };

        // A Logon carrying ResetSeqNumFlag rewinds both streams before any
        // sequence accounting.
        if self.role == SessionRole::Acceptor
            && !self.state.is_established()
            && matches!(
                admin_view,
                Some(AdminMessage::Logon {
                    reset_seq_num: true,
                    ..
                })
            )
        {
            info!(session = %self.session_id(), "peer requested sequence reset on logon");
            self.store.reset().await?;
            self.sequences.reset();
            self.peer_reset_requested = true;
        }

        // SequenceReset in reset mode is applied regardless of its own
        // MsgSeqNum.
        if let Some(AdminMessage::SequenceReset {
            gap_fill: false,
            new_seq_no,
        }) = admin_view
        {
            self.apply_unconditional_reset(new_seq_no, &header, &mut out)
                .await?;
            self.drain_resync(&mut out).await?;
            return Ok(out);
        }

        match self.sequences.classify_incoming(header.msg_seq_num) {
            SequenceCheck::Expected => {
                // Durable before the handler runs.
                self.set_incoming(header.msg_seq_num + 1).await?;
                match admin_view {
                    Some(view) => {
                        self.dispatch_admin(view, &header, &raw, outstanding_test_req, &mut out)
                            .await?;
                    }
                    None => {
                        if self.state.is_established() {
                            out.events.push(AppEvent::Message(raw.to_owned()));
                        } else {
                            warn!(
                                session = %self.session_id(),
                                state = %self.state,
                                msg_type = %header.msg_type,
                                "application message before logon, ignored"
                            );
                        }
                    }
                }
                self.drain_resync(&mut out).await?;
            }
            SequenceCheck::TooLow { expected, received } => {
                if header.poss_dup {
                    debug!(session = %self.session_id(), expected, received, "duplicate dropped");
                } else {
                    let err = SessionError::SequenceTooLow { expected, received };
                    warn!(session = %self.session_id(), %err, "fatal sequence error");
                    let frame = self
                        .stamp_and_log(&admin::logout(Some(&err.to_string())))
                        .await?;
                    out.frames.push(frame);
                    self.close(&mut out, Disconnect::Error(err));
                }
            }
            SequenceCheck::Gap { expected, received } => {
                warn!(session = %self.session_id(), expected, received, "sequence gap detected");
                let was_resync = self.state == SessionState::Resync;
                // A SequenceReset manages the expectation itself;
                // answering it with a ResendRequest would contradict it.
                let is_sequence_reset =
                    matches!(admin_view, Some(AdminMessage::SequenceReset { .. }));
                self.resync_target = self.resync_target.max(received);

                // Admin is applied as needed; application messages are
                // buffered for ordered replay once the gap is filled.
                match admin_view {
                    Some(view) => {
                        self.dispatch_admin(view, &header, &raw, outstanding_test_req, &mut out)
                            .await?;
                    }
                    None => {
                        self.resync_buffer.insert(received, raw.to_owned());
                    }
                }

                if is_sequence_reset {
                    self.drain_resync(&mut out).await?;
                } else if !was_resync && !self.state.is_terminal() {
                    let frame = self
                        .stamp_and_log(&admin::resend_request(expected, 0))
                        .await?;
                    out.frames.push(frame);
                    if self.state == SessionState::Authenticated {
                        self.transition(SessionState::Resync);
                    }
                }
            }
        }

        Ok(out)
    }

    async fn on_violation(
        &mut self,
        violation: Violation,
        header: &SessionHeader,
        mut out: Outcome,
    ) -> Result<Outcome, FixError> {
        match violation {
            Violation::Reject { text, ref_tag } => {
                warn!(session = %self.session_id(), %text, "inbound message rejected");
                self.push_reject(&mut out, header.msg_seq_num, &text, ref_tag)
                    .await?;
            }
            Violation::Terminate(err) => {
                warn!(session = %self.session_id(), %err, "identity violation, terminating");
                let frame = self
                    .stamp_and_log(&admin::logout(Some(&err.to_string())))
                    .await?;
                out.frames.push(frame);
                self.close(&mut out, Disconnect::Error(err));
            }
        }
        Ok(out)
    }

    async fn dispatch_admin(
        &mut self,
        view: AdminMessage,
        header: &SessionHeader,
        raw: &RawMessage<'_>,
        outstanding_test_req: Option<String>,
        out: &mut Outcome,
    ) -> Result<(), FixError> {
        match view {
            AdminMessage::Logon {
                encrypt_method,
                heart_bt_int,
                ..
            } => {
                self.on_logon_received(encrypt_method, heart_bt_int, raw, out)
                    .await?;
            }
            AdminMessage::Heartbeat { test_req_id } => {
                if let (Some(outstanding), Some(received)) = (&outstanding_test_req, &test_req_id) {
                    if outstanding != received {
                        warn!(
                            session = %self.session_id(),
                            %outstanding, %received,
                            "heartbeat answered a different TestReqID, ignored"
                        );
                    }
                }
            }
            AdminMessage::TestRequest { test_req_id } => {
                let frame = self
                    .stamp_and_log(&admin::heartbeat(Some(&test_req_id)))
                    .await?;
                out.frames.push(frame);
            }
            AdminMessage::ResendRequest {
                begin_seq_no,
                end_seq_no,
            } => {
                info!(
                    session = %self.session_id(),
                    begin_seq_no, end_seq_no,
                    "servicing resend request"
                );
                let frames = service_resend(
                    self.store.as_ref(),
                    &self.config,
                    begin_seq_no,
                    end_seq_no,
                    Timestamp::now(),
                )
                .await?;
                if !frames.is_empty() {
                    self.note_outbound();
                }
                out.frames.extend(frames);
            }
            AdminMessage::SequenceReset { new_seq_no, .. } => {
                // Reset mode was intercepted before sequence accounting;
                // this is gap-fill.
                self.apply_gap_fill(new_seq_no, header, out).await?;
            }
            AdminMessage::Reject { ref_seq_num, text } => {
                warn!(
                    session = %self.session_id(),
                    ref_seq_num = ref_seq_num.unwrap_or(0),
                    text = text.as_deref().unwrap_or(""),
                    "peer rejected our message"
                );
                out.events.push(AppEvent::AdminReceived(raw.to_owned()));
            }
            AdminMessage::Logout { text } => {
                self.on_logout_received(text, out).await?;
            }
        }
        Ok(())
    }

    async fn on_logon_received(
        &mut self,
        encrypt_method: u64,
        heart_bt_int: u64,
        raw: &RawMessage<'_>,
        out: &mut Outcome,
    ) -> Result<(), FixError> {
        if self.state.is_established() {
            warn!(session = %self.session_id(), "logon while already authenticated");
            let seq = self.sequences.next_incoming().value().saturating_sub(1);
            self.push_reject(out, seq, "already logged on", Some(tags::MSG_TYPE))
                .await?;
            return Ok(());
        }

        if encrypt_method != 0 || heart_bt_int == 0 {
            let reason = if encrypt_method != 0 {
                format!("unsupported EncryptMethod {encrypt_method}")
            } else {
                "HeartBtInt must be positive".to_string()
            };
            warn!(session = %self.session_id(), %reason, "invalid logon");
            let frame = self.stamp_and_log(&admin::logout(Some(&reason))).await?;
            out.frames.push(frame);
            self.close(out, Disconnect::Error(SessionError::LogonRejected { reason }));
            return Ok(());
        }

        if heart_bt_int != self.config.heartbeat_interval_secs() {
            warn!(
                session = %self.session_id(),
                configured = self.config.heartbeat_interval_secs(),
                negotiated = heart_bt_int,
                "adopting peer heartbeat interval"
            );
        }
        self.heartbeat_interval = Duration::from_secs(heart_bt_int);

        match self.role {
            SessionRole::Initiator => {
                if self.state != SessionState::LogonSent {
                    warn!(session = %self.session_id(), state = %self.state, "unexpected logon");
                    return Ok(());
                }
                self.establish(out);
            }
            SessionRole::Acceptor => {
                self.timers.cancel(TimerId::Logon);
                self.transition(SessionState::LogonReceived);
                out.events.push(AppEvent::LogonRequest(raw.to_owned()));
            }
        }
        Ok(())
    }

    async fn on_logout_received(
        &mut self,
        text: Option<String>,
        out: &mut Outcome,
    ) -> Result<(), FixError> {
        let text = text.unwrap_or_default();
        info!(session = %self.session_id(), %text, "logout received");

        match self.state {
            SessionState::LogoutSent => {
                // Peer confirmed our logout.
                out.events.push(AppEvent::LoggedOut);
                self.close(out, Disconnect::Graceful);
            }
            SessionState::LogonSent => {
                // Logout instead of a logon reply: the peer refused us.
                let reason = if text.is_empty() {
                    "logout during logon".to_string()
                } else {
                    text
                };
                self.close(out, Disconnect::Error(SessionError::LogonRejected { reason }));
            }
            _ => {
                self.transition(SessionState::LogoutReceived);
                let frame = self.stamp_and_log(&admin::logout(None)).await?;
                out.frames.push(frame);
                out.events.push(AppEvent::LoggedOut);
                self.close(out, Disconnect::Graceful);
            }
        }
        Ok(())
    }

    async fn apply_unconditional_reset(
        &mut self,
        new_seq_no: u64,
        header: &SessionHeader,
        out: &mut Outcome,
    ) -> Result<(), FixError> {
        let expected = self.sequences.next_incoming().value();
        if new_seq_no <= expected {
            // Protocol violation, but the reset is still honored so the
            // peer can recover.
            warn!(
                session = %self.session_id(),
                expected, new_seq_no,
                "sequence reset lowers the expectation"
            );
            self.push_reject(
                out,
                header.msg_seq_num,
                "NewSeqNo lower than expected",
                Some(tags::NEW_SEQ_NO),
            )
            .await?;
        } else {
            info!(session = %self.session_id(), expected, new_seq_no, "sequence reset");
        }
        self.set_incoming(new_seq_no).await
    }

    async fn apply_gap_fill(
        &mut self,
        new_seq_no: u64,
        header: &SessionHeader,
        out: &mut Outcome,
    ) -> Result<(), FixError> {
        if new_seq_no <= header.msg_seq_num {
            self.push_reject(
                out,
                header.msg_seq_num,
                "NewSeqNo must exceed MsgSeqNum",
                Some(tags::NEW_SEQ_NO),
            )
            .await?;
            return Ok(());
        }

        let expected = self.sequences.next_incoming().value();
        if new_seq_no >= expected {
            debug!(session = %self.session_id(), expected, new_seq_no, "gap fill");
            self.set_incoming(new_seq_no).await?;
        } else if header.poss_dup {
            // Stale retransmitted gap fill.
            debug!(session = %self.session_id(), new_seq_no, "stale gap fill ignored");
        } else {
            warn!(session = %self.session_id(), expected, new_seq_no, "gap fill lowers expectation, ignored");
        }
        Ok(())
    }

    async fn on_timer(&mut self, id: TimerId) -> Result<Outcome, FixError> {
        let mut out = Outcome::new();
        if !self.timers.acknowledge(id) || self.state.is_terminal() {
            return Ok(out);
        }

        match id {
            TimerId::Logon => {
                let err = SessionError::LogonTimeout {
                    elapsed_ms: self.config.logon_timeout.as_millis() as u64,
                };
                warn!(session = %self.session_id(), %err, "logon did not complete");
                if self.state == SessionState::LogonSent {
                    let frame = self
                        .stamp_and_log(&admin::logout(Some("logon timeout")))
                        .await?;
                    out.frames.push(frame);
                }
                self.close(&mut out, Disconnect::Error(err));
            }
            TimerId::Heartbeat => {
                if self.state.is_established() {
                    let frame = self.stamp_and_log(&admin::heartbeat(None)).await?;
                    out.frames.push(frame);
                }
            }
            TimerId::TestRequest => {
                if self.state.is_established() {
                    self.test_req_counter += 1;
                    let test_req_id = format!("TEST{}", self.test_req_counter);
                    debug!(session = %self.session_id(), %test_req_id, "peer quiet, probing");
                    let frame = self
                        .stamp_and_log(&admin::test_request(&test_req_id))
                        .await?;
                    out.frames.push(frame);
                    self.pending_test_req_id = Some(test_req_id);
                    self.timers
                        .arm(TimerId::DeadPeer, self.dead_peer_timeout());
                }
            }
            TimerId::DeadPeer => {
                if let Some(test_req_id) = self.pending_test_req_id.take() {
                    let err = SessionError::PeerUnresponsive { test_req_id };
                    warn!(session = %self.session_id(), %err, "peer declared dead");
                    let frame = self
                        .stamp_and_log(&admin::logout(Some("no response to test request")))
                        .await?;
                    out.frames.push(frame);
                    self.transition(SessionState::LogoutSent);
                    self.timers.arm(TimerId::Logout, self.config.logout_timeout);
                }
            }
            TimerId::Logout => {
                warn!(session = %self.session_id(), "logout grace expired, closing");
                self.close(&mut out, Disconnect::Error(SessionError::LogoutTimeout));
            }
        }
        Ok(out)
    }

    async fn shutdown(&mut self) -> Result<Outcome, FixError> {
        let mut out = Outcome::new();
        match self.state {
            SessionState::Closed | SessionState::LogoutSent | SessionState::LogoutReceived => {}
            state if state.is_established()
                || state == SessionState::LogonSent
                || state == SessionState::LogonReceived =>
            {
                info!(session = %self.session_id(), "shutdown requested, logging out");
                let frame = self.stamp_and_log(&admin::logout(None)).await?;
                out.frames.push(frame);
                self.transition(SessionState::LogoutSent);
                self.timers.cancel(TimerId::Heartbeat);
                self.timers.cancel(TimerId::TestRequest);
                self.timers.arm(TimerId::Logout, self.config.logout_timeout);
            }
            _ => {
                self.close(&mut out, Disconnect::Graceful);
            }
        }
        Ok(out)
    }

    fn on_transport_closed(&mut self) -> Outcome {
        let mut out = Outcome::new();
        if self.state.is_terminal() {
            return out;
        }

        if self.state.is_established() {
            out.events.push(AppEvent::LoggedOut);
        }
        let disconnect = if self.state == SessionState::LogoutSent {
            Disconnect::Graceful
        } else {
            Disconnect::Error(SessionError::Connection("transport closed".to_string()))
        };
        self.close(&mut out, disconnect);
        out
    }

    /// Assigns the next outgoing seqnum, stamps the header, persists the
    /// message and the seqnum, and returns the frame.
    ///
    /// The log append lands before the seqnum record so a crash between
    /// the two never admits a sequence number whose message is missing.
    async fn stamp_and_log(&mut self, message: &OutboundMessage) -> Result<BytesMut, FixError> {
        let seqnum = self.sequences.next_outgoing().value();
        let frame = encode_with_header(&self.config, message, seqnum, Timestamp::now());
        self.store.append_outgoing(seqnum, &frame).await?;
        self.store.set_outgoing_seqnum(seqnum + 1).await?;
        self.sequences.allocate_outgoing();
        debug!(
            session = %self.session_id(),
            seqnum,
            msg_type = %message.msg_type(),
            "message released"
        );
        self.note_outbound();
        Ok(frame)
    }

    async fn push_reject(
        &mut self,
        out: &mut Outcome,
        ref_seq_num: u64,
        text: &str,
        ref_tag: Option<u32>,
    ) -> Result<(), FixError> {
        let frame = self
            .stamp_and_log(&admin::reject(ref_seq_num, text, ref_tag))
            .await?;
        out.frames.push(frame);
        Ok(())
    }

    async fn set_incoming(&mut self, seqnum: u64) -> Result<(), FixError> {
        self.store.set_incoming_seqnum(seqnum).await?;
        self.sequences.set_incoming(seqnum);
        Ok(())
    }

    /// Delivers buffered application messages that became in-order, and
    /// leaves resync once the gap is fully closed.
    async fn drain_resync(&mut self, out: &mut Outcome) -> Result<(), FixError> {
        loop {
            let expected = self.sequences.next_incoming().value();
            match self.resync_buffer.remove(&expected) {
                Some(message) => {
                    self.set_incoming(expected + 1).await?;
                    out.events.push(AppEvent::Message(message));
                }
                None => break,
            }
        }

        // Stale entries below the expectation can remain after a reset.
        let expected = self.sequences.next_incoming().value();
        self.resync_buffer.retain(|&seq, _| seq >= expected);

        if self.state == SessionState::Resync
            && self.resync_buffer.is_empty()
            && expected > self.resync_target
        {
            info!(session = %self.session_id(), "resynchronized");
            self.resync_target = 0;
            self.transition(SessionState::Authenticated);
        }
        Ok(())
    }

    fn establish(&mut self, out: &mut Outcome) {
        self.timers.cancel(TimerId::Logon);
        self.transition(SessionState::Authenticated);
        self.timers.arm(TimerId::Heartbeat, self.heartbeat_interval);
        self.timers
            .arm(TimerId::TestRequest, self.test_request_timeout());
        out.events.push(AppEvent::LoggedOn);
        info!(session = %self.session_id(), role = %self.role, "authenticated");
    }

    fn close(&mut self, out: &mut Outcome, disconnect: Disconnect) {
        self.timers.cancel_all();
        self.pending_test_req_id = None;
        self.transition(SessionState::Closed);
        if out.disconnect.is_none() {
            out.disconnect = Some(disconnect);
        }
    }

    fn note_outbound(&mut self) {
        if self.state.is_established() || self.state == SessionState::LogonReceived {
            self.timers.arm(TimerId::Heartbeat, self.heartbeat_interval);
        }
    }

    fn test_request_timeout(&self) -> Duration {
        self.heartbeat_interval.mul_f64(self.config.test_request_factor)
    }

    fn dead_peer_timeout(&self) -> Duration {
        self.heartbeat_interval.mul_f64(self.config.dead_peer_factor)
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            debug!(session = %self.session_id(), from = %self.state, to = %to, "state transition");
            self.state = to;
        }
    }
}

fn ref_tag_for(err: &DecodeError) -> Option<u32> {
    match err {
        DecodeError::MissingRequiredField { tag }
        | DecodeError::InvalidFieldValue { tag, .. } => Some(*tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixwire_core::message::MsgType;
    use fixwire_core::types::CompId;
    use fixwire_store::MemoryStore;
    use fixwire_tagvalue::Decoder;

    fn local_config() -> SessionConfig {
        SessionConfig::new(
            CompId::new("INIT").unwrap(),
            CompId::new("ACC").unwrap(),
            "FIX.4.4",
        )
    }

    fn peer_config() -> SessionConfig {
        SessionConfig::new(
            CompId::new("ACC").unwrap(),
            CompId::new("INIT").unwrap(),
            "FIX.4.4",
        )
    }

    /// The counterparty: builds frames addressed to the session under test.
    struct Peer {
        config: SessionConfig,
        seq: u64,
    }

    impl Peer {
        fn new() -> Self {
            Self {
                config: peer_config(),
                seq: 1,
            }
        }

        fn frame(&mut self, body: &OutboundMessage) -> BytesMut {
            let frame = self.frame_at(self.seq, body);
            self.seq += 1;
            frame
        }

        fn frame_at(&self, seq: u64, body: &OutboundMessage) -> BytesMut {
            encode_with_header(&self.config, body, seq, Timestamp::now())
        }

        fn poss_dup_at(&self, seq: u64, mut body: OutboundMessage) -> BytesMut {
            body.push_field(tags::POSS_DUP_FLAG, true);
            body.push_field(tags::ORIG_SENDING_TIME, Timestamp::now());
            encode_with_header(&self.config, &body, seq, Timestamp::now())
        }
    }

    fn msg_type_of(frame: &BytesMut) -> MsgType {
        let mut decoder = Decoder::new(frame);
        decoder.decode().unwrap().msg_type().clone()
    }

    fn seq_of(frame: &BytesMut) -> u64 {
        let mut decoder = Decoder::new(frame);
        decoder
            .decode()
            .unwrap()
            .get_field_as::<u64>(tags::MSG_SEQ_NUM)
            .unwrap()
    }

    fn field_str(frame: &BytesMut, tag: u32) -> Option<String> {
        let mut decoder = Decoder::new(frame);
        decoder
            .decode()
            .unwrap()
            .get_field_str(tag)
            .map(str::to_string)
    }

    fn app_message(id: &str) -> OutboundMessage {
        OutboundMessage::new(MsgType::NewOrderSingle).field(11, id)
    }

    async fn recv(session: &mut Session, frame: BytesMut) -> Outcome {
        session
            .on_event(SessionEvent::FrameReceived(frame))
            .await
            .unwrap()
    }

    async fn initiator() -> (Session, Arc<MemoryStore>, Peer, Outcome) {
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::new(local_config(), SessionRole::Initiator, store.clone());
        let out = session.start().await.unwrap();
        (session, store, Peer::new(), out)
    }

    async fn authenticated_initiator() -> (Session, Arc<MemoryStore>, Peer) {
        let (mut session, store, mut peer, _) = initiator().await;
        let out = recv(&mut session, peer.frame(&admin::logon(30, false))).await;
        assert!(matches!(out.events.as_slice(), [AppEvent::LoggedOn]));
        assert_eq!(session.state(), SessionState::Authenticated);
        (session, store, peer)
    }

    async fn acceptor() -> (Session, Arc<MemoryStore>, Peer, Outcome) {
        let config = SessionConfig::new(
            CompId::new("ACC").unwrap(),
            CompId::new("INIT").unwrap(),
            "FIX.4.4",
        );
        let store = Arc::new(MemoryStore::new());
        let mut session = Session::new(config, SessionRole::Acceptor, store.clone());
        let out = session.start().await.unwrap();
        // The peer of the acceptor is the initiator.
        let peer = Peer {
            config: local_config(),
            seq: 1,
        };
        (session, store, peer, out)
    }

    #[tokio::test]
    async fn test_initiator_start_sends_logon() {
        let (session, store, _, out) = initiator().await;

        assert_eq!(session.state(), SessionState::LogonSent);
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logon);
        assert_eq!(seq_of(&out.frames[0]), 1);
        assert_eq!(field_str(&out.frames[0], tags::ENCRYPT_METHOD).as_deref(), Some("0"));
        assert_eq!(field_str(&out.frames[0], tags::HEART_BT_INT).as_deref(), Some("30"));

        // Logon was logged and the outgoing seqnum persisted before release.
        assert_eq!(store.seqnums().await.unwrap(), (2, 1));
        assert!(store.contains(1));
    }

    #[tokio::test]
    async fn test_initiator_logon_handshake() {
        let (session, store, _) = authenticated_initiator().await;
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.seqnums().await.unwrap(), (2, 2));
    }

    #[tokio::test]
    async fn test_acceptor_accepts_logon() {
        let (mut session, _, mut peer, out) = acceptor().await;
        assert!(out.frames.is_empty());
        assert_eq!(session.state(), SessionState::Connected);

        let out = recv(&mut session, peer.frame(&admin::logon(30, false))).await;
        assert!(matches!(out.events.as_slice(), [AppEvent::LogonRequest(_)]));
        assert_eq!(session.state(), SessionState::LogonReceived);
        assert!(out.frames.is_empty());

        let out = session
            .on_logon_decision(LogonDecision::Accept)
            .await
            .unwrap();
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logon);
        assert_eq!(field_str(&out.frames[0], tags::HEART_BT_INT).as_deref(), Some("30"));
        assert!(matches!(out.events.as_slice(), [AppEvent::LoggedOn]));
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_acceptor_rejects_logon() {
        let (mut session, _, mut peer, _) = acceptor().await;
        recv(&mut session, peer.frame(&admin::logon(30, false))).await;

        let out = session
            .on_logon_decision(LogonDecision::Reject {
                reason: "unknown counterparty".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert_eq!(
            field_str(&out.frames[0], tags::TEXT).as_deref(),
            Some("unknown counterparty")
        );
        assert!(matches!(
            out.disconnect,
            Some(Disconnect::Error(SessionError::LogonRejected { .. }))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_logon_timeout() {
        let (mut session, _, _, _) = initiator().await;

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::Logon))
            .await
            .unwrap();

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert_eq!(field_str(&out.frames[0], tags::TEXT).as_deref(), Some("logon timeout"));
        assert!(matches!(
            out.disconnect,
            Some(Disconnect::Error(SessionError::LogonTimeout { .. }))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_acceptor_logon_timeout_closes_without_logout() {
        let (mut session, _, _, _) = acceptor().await;

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::Logon))
            .await
            .unwrap();

        assert!(out.frames.is_empty());
        assert!(matches!(out.disconnect, Some(Disconnect::Error(_))));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_heartbeat_timer_emits_heartbeat() {
        let (mut session, _, _) = authenticated_initiator().await;

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::Heartbeat))
            .await
            .unwrap();

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Heartbeat);
        assert_eq!(seq_of(&out.frames[0]), 2);
        assert!(session.next_deadline().is_some());
    }

    #[tokio::test]
    async fn test_test_request_then_dead_peer() {
        let (mut session, _, _) = authenticated_initiator().await;

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::TestRequest))
            .await
            .unwrap();
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::TestRequest);
        let test_req_id = field_str(&out.frames[0], tags::TEST_REQ_ID).unwrap();
        assert!(test_req_id.starts_with("TEST"));

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::DeadPeer))
            .await
            .unwrap();
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert_eq!(session.state(), SessionState::LogoutSent);

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::Logout))
            .await
            .unwrap();
        assert!(matches!(
            out.disconnect,
            Some(Disconnect::Error(SessionError::LogoutTimeout))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_heartbeat_answers_outstanding_test_request() {
        let (mut session, _, mut peer) = authenticated_initiator().await;

        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::TestRequest))
            .await
            .unwrap();
        let test_req_id = field_str(&out.frames[0], tags::TEST_REQ_ID).unwrap();

        let frame = peer.frame(&admin::heartbeat(Some(&test_req_id)));
        let out = recv(&mut session, frame).await;
        assert!(out.frames.is_empty());
        assert!(out.disconnect.is_none());

        // The dead-peer timer was cancelled by the inbound traffic; a
        // stale firing is a no-op.
        let out = session
            .on_event(SessionEvent::TimerFired(TimerId::DeadPeer))
            .await
            .unwrap();
        assert!(out.frames.is_empty());
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_responds_to_test_request() {
        let (mut session, _, mut peer) = authenticated_initiator().await;

        let out = recv(&mut session, peer.frame(&admin::test_request("PING7"))).await;

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Heartbeat);
        assert_eq!(field_str(&out.frames[0], tags::TEST_REQ_ID).as_deref(), Some("PING7"));
    }

    #[tokio::test]
    async fn test_gap_triggers_resend_and_ordered_replay() {
        let (mut session, store, peer) = authenticated_initiator().await;

        // Expected 2, message 5 arrives: resend request and buffering.
        let out = recv(&mut session, peer.frame_at(5, &app_message("FIVE"))).await;
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::ResendRequest);
        assert_eq!(field_str(&out.frames[0], tags::BEGIN_SEQ_NO).as_deref(), Some("2"));
        assert_eq!(field_str(&out.frames[0], tags::END_SEQ_NO).as_deref(), Some("0"));
        assert!(out.events.is_empty());
        assert_eq!(session.state(), SessionState::Resync);
        assert_eq!(store.seqnums().await.unwrap().1, 2);

        // Backfill 2, 3, 4 as possible duplicates.
        for (seq, id) in [(2, "TWO"), (3, "THREE"), (4, "FOUR")] {
            let out = recv(&mut session, peer.poss_dup_at(seq, app_message(id))).await;
            let delivered: Vec<_> = out
                .events
                .iter()
                .filter_map(|e| match e {
                    AppEvent::Message(m) => m.get_field_str(11).map(str::to_string),
                    _ => None,
                })
                .collect();
            if seq < 4 {
                assert_eq!(delivered, vec![id.to_string()]);
            } else {
                // Message 5 drains right behind 4.
                assert_eq!(delivered, vec!["FOUR".to_string(), "FIVE".to_string()]);
            }
        }

        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.seqnums().await.unwrap().1, 6);
    }

    #[tokio::test]
    async fn test_gap_fill_advances_expectation() {
        let (mut session, store, peer) = authenticated_initiator().await;

        // Open a gap with message 5.
        recv(&mut session, peer.frame_at(5, &app_message("FIVE"))).await;

        // The peer answers the resend request with a gap fill 2 -> 5.
        let gap_fill = peer.poss_dup_at(
            2,
            OutboundMessage::new(MsgType::SequenceReset)
                .field(tags::GAP_FILL_FLAG, true)
                .field(tags::NEW_SEQ_NO, 5u64),
        );
        let out = recv(&mut session, gap_fill).await;

        let delivered: Vec<_> = out
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Message(m) => m.get_field_str(11).map(str::to_string),
                _ => None,
            })
            .collect();
        assert_eq!(delivered, vec!["FIVE".to_string()]);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.seqnums().await.unwrap().1, 6);
    }

    #[tokio::test]
    async fn test_gap_fill_ahead_of_expectation_sends_no_resend_request() {
        let (mut session, store, peer) = authenticated_initiator().await;

        // The peer skips past a range we also missed: a gap fill whose
        // own seqnum is already ahead of the expectation. It manages the
        // expectation itself; answering it with a ResendRequest would
        // contradict it.
        let frame = peer.frame_at(
            5,
            &OutboundMessage::new(MsgType::SequenceReset)
                .field(tags::GAP_FILL_FLAG, true)
                .field(tags::NEW_SEQ_NO, 8u64),
        );
        let out = recv(&mut session, frame).await;

        assert!(out.frames.is_empty());
        assert!(out.disconnect.is_none());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.seqnums().await.unwrap().1, 8);
    }

    #[tokio::test]
    async fn test_gap_fill_during_resync_sends_no_second_resend_request() {
        let (mut session, store, peer) = authenticated_initiator().await;

        // Open a gap with message 5; one resend request goes out.
        let out = recv(&mut session, peer.frame_at(5, &app_message("FIVE"))).await;
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::ResendRequest);
        assert_eq!(session.state(), SessionState::Resync);

        // The peer answers with a gap fill that is itself ahead of the
        // expectation and voids the whole range, message 5 included.
        let frame = peer.frame_at(
            3,
            &OutboundMessage::new(MsgType::SequenceReset)
                .field(tags::GAP_FILL_FLAG, true)
                .field(tags::NEW_SEQ_NO, 6u64),
        );
        let out = recv(&mut session, frame).await;

        assert!(out.frames.is_empty());
        assert!(out.events.is_empty());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.seqnums().await.unwrap().1, 6);
    }

    #[tokio::test]
    async fn test_reset_on_logon_acceptor_advertises_reset() {
        let config = SessionConfig::new(
            CompId::new("ACC").unwrap(),
            CompId::new("INIT").unwrap(),
            "FIX.4.4",
        )
        .with_reset_on_logon(true);
        let store = Arc::new(MemoryStore::with_seqnums(40, 30));
        let mut session = Session::new(config, SessionRole::Acceptor, store.clone());
        session.start().await.unwrap();

        // The store was rewound on start; the peer logs on from 1.
        assert_eq!(store.seqnums().await.unwrap(), (1, 1));
        let peer = Peer {
            config: local_config(),
            seq: 1,
        };
        recv(&mut session, peer.frame_at(1, &admin::logon(30, false))).await;

        let out = session
            .on_logon_decision(LogonDecision::Accept)
            .await
            .unwrap();
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logon);
        assert_eq!(seq_of(&out.frames[0]), 1);
        assert_eq!(
            field_str(&out.frames[0], tags::RESET_SEQ_NUM_FLAG).as_deref(),
            Some("Y")
        );
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_acceptor_echoes_peer_reset_seq_num_flag() {
        let (mut session, store, mut peer, _) = acceptor().await;

        let out = recv(&mut session, peer.frame(&admin::logon(30, true))).await;
        assert!(matches!(out.events.as_slice(), [AppEvent::LogonRequest(_)]));
        // The reset was honored before sequence accounting.
        assert_eq!(store.seqnums().await.unwrap().1, 2);

        let out = session
            .on_logon_decision(LogonDecision::Accept)
            .await
            .unwrap();
        assert_eq!(seq_of(&out.frames[0]), 1);
        assert_eq!(
            field_str(&out.frames[0], tags::RESET_SEQ_NUM_FLAG).as_deref(),
            Some("Y")
        );
    }

    #[tokio::test]
    async fn test_sequence_too_low_is_fatal() {
        let (mut session, _, peer) = authenticated_initiator().await;

        let out = recv(&mut session, peer.frame_at(1, &app_message("OLD"))).await;

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert_eq!(
            field_str(&out.frames[0], tags::TEXT).as_deref(),
            Some("MsgSeqNum too low, expecting 2 but received 1")
        );
        assert!(matches!(
            out.disconnect,
            Some(Disconnect::Error(SessionError::SequenceTooLow { expected: 2, received: 1 }))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_poss_dup_too_low_is_dropped() {
        let (mut session, store, peer) = authenticated_initiator().await;

        let out = recv(&mut session, peer.poss_dup_at(1, app_message("DUP"))).await;

        assert!(out.frames.is_empty());
        assert!(out.events.is_empty());
        assert!(out.disconnect.is_none());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.seqnums().await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn test_sequence_reset_reset_mode() {
        let (mut session, store, peer) = authenticated_initiator().await;

        // Reset mode ignores its own MsgSeqNum entirely.
        let frame = peer.frame_at(
            99,
            &OutboundMessage::new(MsgType::SequenceReset)
                .field(tags::GAP_FILL_FLAG, false)
                .field(tags::NEW_SEQ_NO, 10u64),
        );
        let out = recv(&mut session, frame).await;
        assert!(out.frames.is_empty());
        assert_eq!(store.seqnums().await.unwrap().1, 10);

        // Lowering the expectation is a violation: Reject, but honored.
        let frame = peer.frame_at(
            100,
            &OutboundMessage::new(MsgType::SequenceReset)
                .field(tags::GAP_FILL_FLAG, false)
                .field(tags::NEW_SEQ_NO, 3u64),
        );
        let out = recv(&mut session, frame).await;
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Reject);
        assert!(out.disconnect.is_none());
        assert_eq!(store.seqnums().await.unwrap().1, 3);
    }

    #[tokio::test]
    async fn test_resend_request_serviced_with_gap_fill() {
        let (mut session, _, mut peer) = authenticated_initiator().await;

        // Outgoing log: 1 = Logon (admin), 2 and 3 = orders.
        session.send_app(&app_message("A")).await.unwrap();
        session.send_app(&app_message("B")).await.unwrap();

        let out = recv(
            &mut session,
            peer.frame(&admin::resend_request(1, 0)),
        )
        .await;

        assert_eq!(out.frames.len(), 3);

        assert_eq!(msg_type_of(&out.frames[0]), MsgType::SequenceReset);
        assert_eq!(seq_of(&out.frames[0]), 1);
        assert_eq!(field_str(&out.frames[0], tags::NEW_SEQ_NO).as_deref(), Some("2"));
        assert_eq!(field_str(&out.frames[0], tags::POSS_DUP_FLAG).as_deref(), Some("Y"));

        assert_eq!(seq_of(&out.frames[1]), 2);
        assert_eq!(field_str(&out.frames[1], 11).as_deref(), Some("A"));
        assert_eq!(field_str(&out.frames[1], tags::POSS_DUP_FLAG).as_deref(), Some("Y"));
        assert!(field_str(&out.frames[1], tags::ORIG_SENDING_TIME).is_some());

        assert_eq!(seq_of(&out.frames[2]), 3);
        assert_eq!(field_str(&out.frames[2], 11).as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_send_app_requires_authentication() {
        let (mut session, _, _, _) = initiator().await;

        let err = session.send_app(&app_message("X")).await.unwrap_err();
        assert!(matches!(
            err,
            FixError::Session(SessionError::NotAuthenticated { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_logout_handshake() {
        let (mut session, _, mut peer) = authenticated_initiator().await;

        let out = session.on_event(SessionEvent::Shutdown).await.unwrap();
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert_eq!(session.state(), SessionState::LogoutSent);
        assert!(out.disconnect.is_none());

        let out = recv(&mut session, peer.frame(&admin::logout(None))).await;
        assert!(matches!(out.events.as_slice(), [AppEvent::LoggedOut]));
        assert!(matches!(out.disconnect, Some(Disconnect::Graceful)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_peer_initiated_logout() {
        let (mut session, _, mut peer) = authenticated_initiator().await;

        let out = recv(&mut session, peer.frame(&admin::logout(Some("bye")))).await;

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert!(matches!(out.events.as_slice(), [AppEvent::LoggedOut]));
        assert!(matches!(out.disconnect, Some(Disconnect::Graceful)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_crash_recovery_continues_sequence() {
        // A restart after outgoing=42 was persisted resumes at 42.
        let store = Arc::new(MemoryStore::with_seqnums(42, 17));
        let mut session = Session::new(local_config(), SessionRole::Initiator, store.clone());

        let out = session.start().await.unwrap();
        assert_eq!(seq_of(&out.frames[0]), 42);
        assert_eq!(store.seqnums().await.unwrap().0, 43);

        let peer = Peer::new();
        recv(&mut session, peer.frame_at(17, &admin::logon(30, false))).await;

        // Nothing survives in the log below 42; a resend request for
        // 40..41 is answered with a gap fill.
        let out = recv(&mut session, peer.frame_at(18, &admin::resend_request(40, 41))).await;
        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::SequenceReset);
        assert_eq!(seq_of(&out.frames[0]), 40);
        assert_eq!(field_str(&out.frames[0], tags::NEW_SEQ_NO).as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_framing_error_disconnects_without_logout() {
        let (mut session, _, _) = authenticated_initiator().await;

        let out = recv(&mut session, BytesMut::from(&b"8=FIX.4.4\x01garbage"[..])).await;

        assert!(out.frames.is_empty());
        assert!(matches!(out.disconnect, Some(Disconnect::Framing)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_stale_sending_time_is_rejected() {
        let (mut session, store, peer) = authenticated_initiator().await;

        let stale = Timestamp::from_millis(Timestamp::now().as_millis() - 10 * 60 * 1000);
        let frame = encode_with_header(&peer.config, &admin::heartbeat(None), 2, stale);
        let out = recv(&mut session, frame).await;

        assert_eq!(out.frames.len(), 1);
        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Reject);
        assert_eq!(
            field_str(&out.frames[0], tags::TEXT).as_deref(),
            Some("SendingTime accuracy problem")
        );
        // The expectation did not advance.
        assert_eq!(store.seqnums().await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn test_comp_id_mismatch_terminates() {
        let (mut session, _, _) = authenticated_initiator().await;

        let intruder = SessionConfig::new(
            CompId::new("INTRUDER").unwrap(),
            CompId::new("INIT").unwrap(),
            "FIX.4.4",
        );
        let frame = encode_with_header(&intruder, &admin::heartbeat(None), 2, Timestamp::now());
        let out = recv(&mut session, frame).await;

        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Logout);
        assert!(matches!(
            out.disconnect,
            Some(Disconnect::Error(SessionError::CompIdMismatch { tag: 49, .. }))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_poss_dup_without_orig_sending_time_rejected() {
        let (mut session, store, peer) = authenticated_initiator().await;

        let mut body = app_message("DUP");
        body.push_field(tags::POSS_DUP_FLAG, true);
        let frame = peer.frame_at(2, &body);
        let out = recv(&mut session, frame).await;

        assert_eq!(msg_type_of(&out.frames[0]), MsgType::Reject);
        assert!(out.events.is_empty());
        assert_eq!(store.seqnums().await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn test_transport_closed() {
        let (mut session, _, _) = authenticated_initiator().await;

        let out = session
            .on_event(SessionEvent::TransportClosed)
            .await
            .unwrap();

        assert!(matches!(out.events.as_slice(), [AppEvent::LoggedOut]));
        assert!(matches!(
            out.disconnect,
            Some(Disconnect::Error(SessionError::Connection(_)))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
