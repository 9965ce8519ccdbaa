//! Initiator session: CONNECT, then any number of INVOKE/RESULT exchanges.
//!
//! A [`Session`] owns one transport, one sequence counter and one
//! [`SessionState`]. Invocations never interleave: a new INVOKE is only
//! accepted once the previous RESULT has arrived. Any transport or protocol
//! error moves the session to `Failed`, after which every operation returns
//! `SessionFailed`.
//!
//! Sequence numbers start at `SessionConfig::initial_sequence` and advance by
//! one (wrapping) for every request sent. Replies echo the request's number;
//! with `enforce_sequence` a divergent reply is a `SequenceMismatch`.

use crate::config::SessionConfig;
use crate::core::header::{Flags, MessageType};
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use crate::protocol::state::{SessionEvent, SessionState};
use crate::protocol::transport::{expect_message, write_message, Transport};
use crate::utils::metrics::{Metrics, Timer};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Body of a RESULT, split on the EXCEPTION flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    Return(Vec<u8>),
    Exception(Vec<u8>),
}

impl InvokeOutcome {
    pub fn body(&self) -> &[u8] {
        match self {
            InvokeOutcome::Return(body) | InvokeOutcome::Exception(body) => body,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, InvokeOutcome::Exception(_))
    }
}

pub struct Session<T> {
    transport: T,
    config: Arc<SessionConfig>,
    state: SessionState,
    next_sequence: u16,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: Arc<SessionConfig>) -> Self {
        let next_sequence = config.initial_sequence;
        Self {
            transport,
            config,
            state: SessionState::Idle,
            next_sequence,
            metrics: None,
        }
    }

    /// Record traffic and failures into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence number the next request will carry
    pub fn next_sequence(&self) -> u16 {
        self.next_sequence
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Apply a state machine event directly, without I/O.
    ///
    /// Operations below call this themselves; it is exposed for callers that
    /// move messages by other means (for example through
    /// [`crate::core::codec::MessageCodec`]) and still want the session's
    /// ordering rules.
    pub fn step(&mut self, event: SessionEvent) -> Result<SessionState> {
        let next = self.state.step(event)?;
        self.state = next;
        Ok(next)
    }

    /// Send CONNECT carrying `identification` and wait for the answer.
    ///
    /// Returns the CONNECT_OK body. A CONNECT_FAIL ends the session in
    /// `Failed` and surfaces its reason as `ConnectionRejected`.
    #[instrument(skip(self, identification), fields(sequence = self.next_sequence))]
    pub fn connect(&mut self, identification: &[u8]) -> Result<Vec<u8>> {
        self.state.step(SessionEvent::SendConnect)?;
        let request = self.build(MessageType::Connect, Flags::empty(), identification)?;

        let result = self.connect_exchange(&request);
        self.settle(result)
    }

    fn connect_exchange(&mut self, request: &Message) -> Result<Vec<u8>> {
        self.send(request, SessionEvent::SendConnect)?;
        let reply = self.receive(None)?;
        self.check_sequence(request, &reply)?;

        match reply.msg_type() {
            MessageType::ConnectOk => {
                self.step(SessionEvent::RecvConnectOk)?;
                if let Some(metrics) = &self.metrics {
                    metrics.session_opened();
                }
                info!(sequence = request.sequence(), "Session established");
                Ok(reply.into_body())
            }
            MessageType::ConnectFail => {
                self.step(SessionEvent::RecvConnectFail)?;
                if let Some(metrics) = &self.metrics {
                    metrics.session_rejected();
                }
                let reason = String::from_utf8_lossy(reply.body()).into_owned();
                warn!(%reason, "Connection rejected by peer");
                Err(ProtocolError::ConnectionRejected(reason))
            }
            other => Err(ProtocolError::UnexpectedType {
                expected: "CONNECT_OK or CONNECT_FAIL",
                actual: other.name(),
            }),
        }
    }

    /// Send INVOKE and wait for its RESULT.
    #[instrument(skip(self, body), fields(sequence = self.next_sequence, body_len = body.len()))]
    pub fn invoke(&mut self, body: &[u8]) -> Result<InvokeOutcome> {
        self.state.step(SessionEvent::SendInvoke)?;
        let _timer = Timer::start("invoke");
        let request = self.build(MessageType::Invoke, Flags::empty(), body)?;

        let result = self.invoke_exchange(&request);
        self.settle(result)
    }

    fn invoke_exchange(&mut self, request: &Message) -> Result<InvokeOutcome> {
        self.send(request, SessionEvent::SendInvoke)?;
        if let Some(metrics) = &self.metrics {
            metrics.invocation();
        }

        let reply = self.receive(Some(MessageType::Result))?;
        self.check_sequence(request, &reply)?;
        self.step(SessionEvent::RecvResult)?;

        if reply.flags().contains(Flags::EXCEPTION) {
            if let Some(metrics) = &self.metrics {
                metrics.exception();
            }
            Ok(InvokeOutcome::Exception(reply.into_body()))
        } else {
            Ok(InvokeOutcome::Return(reply.into_body()))
        }
    }

    /// Send INVOKE with the ONEWAY flag; no RESULT is awaited.
    #[instrument(skip(self, body), fields(sequence = self.next_sequence, body_len = body.len()))]
    pub fn invoke_oneway(&mut self, body: &[u8]) -> Result<()> {
        self.state.step(SessionEvent::SendOnewayInvoke)?;
        let request = self.build(MessageType::Invoke, Flags::ONEWAY, body)?;

        let result = self.send(&request, SessionEvent::SendOnewayInvoke).map(|_| {
            if let Some(metrics) = &self.metrics {
                metrics.invocation();
            }
        });
        self.settle(result)
    }

    /// End the session. The transport itself is left to its owner.
    pub fn close(&mut self) -> Result<()> {
        self.step(SessionEvent::Close)?;
        info!("Session closed");
        Ok(())
    }

    /// Build a request with the next sequence number. Nothing is consumed if
    /// the body cannot be encoded or exceeds `max_body_size`.
    fn build(&mut self, msg_type: MessageType, flags: Flags, body: &[u8]) -> Result<Message> {
        self.config.check_outgoing_body(body.len())?;
        let message = Message::build(
            msg_type,
            flags,
            u32::from(self.next_sequence),
            body,
            self.config.secret(),
        )?;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(message)
    }

    fn send(&mut self, message: &Message, event: SessionEvent) -> Result<()> {
        self.step(event)?;
        let written = write_message(&mut self.transport, message)?;
        if let Some(metrics) = &self.metrics {
            metrics.message_sent(written as u64);
        }
        Ok(())
    }

    fn receive(&mut self, expected: Option<MessageType>) -> Result<Message> {
        let message = expect_message(&mut self.transport, expected, &self.config)?;
        if let Some(metrics) = &self.metrics {
            metrics.message_received(message.encoded_len() as u64);
        }
        Ok(message)
    }

    fn check_sequence(&self, request: &Message, reply: &Message) -> Result<()> {
        if self.config.enforce_sequence && reply.sequence() != request.sequence() {
            warn!(
                expected = request.sequence(),
                actual = reply.sequence(),
                "Reply sequence mismatch"
            );
            return Err(ProtocolError::SequenceMismatch {
                expected: request.sequence(),
                actual: reply.sequence(),
            });
        }
        Ok(())
    }

    /// Move to `Failed` on any error raised after the request was accepted.
    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(error) = &result {
            if !self.state.is_terminal() {
                self.state = SessionState::Failed;
                warn!(%error, "Session failed");
                if let Some(metrics) = &self.metrics {
                    metrics.session_failed();
                }
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_error(error);
            }
        }
        result
    }
}
