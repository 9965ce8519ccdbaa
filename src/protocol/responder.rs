//! Answering side of the handshake.
//!
//! A [`Responder`] waits for CONNECT, answers CONNECT_OK or CONNECT_FAIL,
//! then serves INVOKE requests one at a time until the peer closes the
//! stream. Every RESULT echoes the sequence number of the INVOKE it answers.
//! Invocations flagged ONEWAY are handed to the handler but never answered.

use crate::config::SessionConfig;
use crate::core::header::{Flags, MessageType};
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use crate::protocol::session::InvokeOutcome;
use crate::protocol::transport::{expect_message, read_message, write_message, Transport};
use crate::utils::metrics::{Metrics, Timer};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponderState {
    AwaitingConnect,
    Ready,
    Closed,
    Failed,
}

impl ResponderState {
    pub fn name(self) -> &'static str {
        match self {
            ResponderState::AwaitingConnect => "AwaitingConnect",
            ResponderState::Ready => "Ready",
            ResponderState::Closed => "Closed",
            ResponderState::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ResponderState::Closed | ResponderState::Failed)
    }

    /// Refuse `event` unless the responder is in `required`.
    fn require(self, required: ResponderState, event: &'static str) -> Result<()> {
        match self {
            ResponderState::Closed => Err(ProtocolError::SessionClosed),
            ResponderState::Failed => Err(ProtocolError::SessionFailed),
            state if state == required => Ok(()),
            state => Err(ProtocolError::InvalidState {
                state: state.name(),
                event,
            }),
        }
    }
}

impl fmt::Display for ResponderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a CONNECT was refused. The reason text travels as the CONNECT_FAIL body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    Unspecified,
    ServerTooBusy,
    HostBlocked,
    Security,
}

impl DenyReason {
    pub fn code(self) -> u8 {
        match self {
            DenyReason::Unspecified => 0,
            DenyReason::ServerTooBusy => 1,
            DenyReason::HostBlocked => 2,
            DenyReason::Security => 3,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DenyReason::Unspecified => "unspecified reason",
            DenyReason::ServerTooBusy => "server too busy",
            DenyReason::HostBlocked => "host blocked",
            DenyReason::Security => "security reasons",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Verdict of a connection validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDecision {
    /// Accept, sending this body with CONNECT_OK
    Accept(Vec<u8>),
    Deny(DenyReason),
}

pub struct Responder<T> {
    transport: T,
    config: Arc<SessionConfig>,
    state: ResponderState,
    /// Sequence the next INVOKE must carry, once connected
    expected_sequence: u16,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Transport> Responder<T> {
    pub fn new(transport: T, config: Arc<SessionConfig>) -> Self {
        Self {
            transport,
            config,
            state: ResponderState::AwaitingConnect,
            expected_sequence: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Wait for CONNECT and answer it according to `validator`.
    ///
    /// Returns `true` when the peer was accepted. A denial sends CONNECT_FAIL
    /// with the reason text and closes the responder.
    #[instrument(skip(self, validator))]
    pub fn accept<F>(&mut self, validator: F) -> Result<bool>
    where
        F: FnOnce(&Message) -> ConnectDecision,
    {
        self.state.require(ResponderState::AwaitingConnect, "accept")?;
        let result = self.accept_exchange(validator);
        self.settle(result)
    }

    fn accept_exchange<F>(&mut self, validator: F) -> Result<bool>
    where
        F: FnOnce(&Message) -> ConnectDecision,
    {
        let request = self.receive_required(MessageType::Connect)?;
        let sequence = request.sequence();

        match validator(&request) {
            ConnectDecision::Accept(body) => {
                self.reply(MessageType::ConnectOk, Flags::empty(), sequence, body)?;
                self.expected_sequence = sequence.wrapping_add(1);
                self.state = ResponderState::Ready;
                if let Some(metrics) = &self.metrics {
                    metrics.session_opened();
                }
                info!(sequence, "Connection accepted");
                Ok(true)
            }
            ConnectDecision::Deny(reason) => {
                self.reply(
                    MessageType::ConnectFail,
                    Flags::empty(),
                    sequence,
                    reason.message(),
                )?;
                self.state = ResponderState::Closed;
                if let Some(metrics) = &self.metrics {
                    metrics.session_rejected();
                }
                warn!(%reason, code = reason.code(), "Connection denied");
                Ok(false)
            }
        }
    }

    /// Serve a single INVOKE.
    ///
    /// Returns `false` once the peer has closed the stream at a message
    /// boundary; the responder is then `Closed`. A handler result larger than
    /// `max_body_size` is not written and leaves the responder `Failed`.
    #[instrument(skip(self, handler), fields(expected_sequence = self.expected_sequence))]
    pub fn serve_one<F>(&mut self, handler: F) -> Result<bool>
    where
        F: FnMut(&Message) -> InvokeOutcome,
    {
        self.state.require(ResponderState::Ready, "serve")?;
        let _timer = Timer::start("serve_one");
        let result = self.serve_exchange(handler);
        self.settle(result)
    }

    fn serve_exchange<F>(&mut self, mut handler: F) -> Result<bool>
    where
        F: FnMut(&Message) -> InvokeOutcome,
    {
        let Some(request) =
            read_message(&mut self.transport, Some(MessageType::Invoke), &self.config)?
        else {
            self.state = ResponderState::Closed;
            info!("Peer closed the session");
            return Ok(false);
        };
        self.record_received(&request);

        let sequence = request.sequence();
        if self.config.enforce_sequence && sequence != self.expected_sequence {
            warn!(
                expected = self.expected_sequence,
                actual = sequence,
                "Request sequence mismatch"
            );
            return Err(ProtocolError::SequenceMismatch {
                expected: self.expected_sequence,
                actual: sequence,
            });
        }
        self.expected_sequence = sequence.wrapping_add(1);

        if let Some(metrics) = &self.metrics {
            metrics.invocation();
        }
        let outcome = handler(&request);

        if request.flags().contains(Flags::ONEWAY) {
            debug!(sequence, "Oneway invocation, no reply");
            return Ok(true);
        }

        let flags = if outcome.is_exception() {
            if let Some(metrics) = &self.metrics {
                metrics.exception();
            }
            Flags::EXCEPTION
        } else {
            Flags::empty()
        };
        let body = match outcome {
            InvokeOutcome::Return(body) | InvokeOutcome::Exception(body) => body,
        };
        self.reply(MessageType::Result, flags, sequence, body)?;
        Ok(true)
    }

    /// Serve invocations until the peer closes the stream.
    pub fn serve<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&Message) -> InvokeOutcome,
    {
        while self.serve_one(&mut handler)? {}
        Ok(())
    }

    /// Stop serving. The transport itself is left to its owner.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            ResponderState::Closed => Err(ProtocolError::SessionClosed),
            ResponderState::Failed => Err(ProtocolError::SessionFailed),
            _ => {
                self.state = ResponderState::Closed;
                info!("Responder closed");
                Ok(())
            }
        }
    }

    fn receive_required(&mut self, expected: MessageType) -> Result<Message> {
        let message = expect_message(&mut self.transport, Some(expected), &self.config)?;
        self.record_received(&message);
        Ok(message)
    }

    fn record_received(&self, message: &Message) {
        if let Some(metrics) = &self.metrics {
            metrics.message_received(message.encoded_len() as u64);
        }
    }

    fn reply(
        &mut self,
        msg_type: MessageType,
        flags: Flags,
        sequence: u16,
        body: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let body = body.into();
        self.config.check_outgoing_body(body.len())?;
        let message = Message::build(
            msg_type,
            flags,
            u32::from(sequence),
            body,
            self.config.secret(),
        )?;
        let written = write_message(&mut self.transport, &message)?;
        if let Some(metrics) = &self.metrics {
            metrics.message_sent(written as u64);
        }
        Ok(())
    }

    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(error) = &result {
            if !self.state.is_terminal() {
                self.state = ResponderState::Failed;
                warn!(%error, "Responder failed");
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
