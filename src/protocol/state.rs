//! Initiator-side session state machine, free of I/O.
//!
//! ```text
//! Idle --send CONNECT--> AwaitingConnectAck
//! AwaitingConnectAck --recv CONNECT_OK--> Ready
//! AwaitingConnectAck --recv CONNECT_FAIL--> Failed
//! Ready --send INVOKE--> AwaitingResult --recv RESULT--> Ready
//! Ready --send oneway INVOKE--> Ready
//! Idle | Ready --close--> Closed
//! any non-terminal --fault--> Failed
//! ```
//!
//! [`crate::protocol::session::Session`] drives this machine over a transport.

use crate::error::{ProtocolError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AwaitingConnectAck,
    Ready,
    AwaitingResult,
    Closed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    SendConnect,
    RecvConnectOk,
    RecvConnectFail,
    SendInvoke,
    SendOnewayInvoke,
    RecvResult,
    Close,
    /// Transport or protocol error observed
    Fault,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::AwaitingConnectAck => "AwaitingConnectAck",
            SessionState::Ready => "Ready",
            SessionState::AwaitingResult => "AwaitingResult",
            SessionState::Closed => "Closed",
            SessionState::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Apply `event`, returning the next state.
    ///
    /// Terminal states accept nothing: `Closed` answers with
    /// `SessionClosed`, `Failed` with `SessionFailed`. Events that make no
    /// sense in the current state return `InvalidState`.
    pub fn step(self, event: SessionEvent) -> Result<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Closed, _) => Err(ProtocolError::SessionClosed),
            (S::Failed, _) => Err(ProtocolError::SessionFailed),
            (_, E::Fault) => Ok(S::Failed),

            (S::Idle, E::SendConnect) => Ok(S::AwaitingConnectAck),
            (S::AwaitingConnectAck, E::RecvConnectOk) => Ok(S::Ready),
            (S::AwaitingConnectAck, E::RecvConnectFail) => Ok(S::Failed),
            (S::Ready, E::SendInvoke) => Ok(S::AwaitingResult),
            (S::Ready, E::SendOnewayInvoke) => Ok(S::Ready),
            (S::AwaitingResult, E::RecvResult) => Ok(S::Ready),
            (S::Idle | S::Ready, E::Close) => Ok(S::Closed),

            (state, event) => Err(ProtocolError::InvalidState {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

impl SessionEvent {
    pub fn name(self) -> &'static str {
        match self {
            SessionEvent::SendConnect => "send CONNECT",
            SessionEvent::RecvConnectOk => "recv CONNECT_OK",
            SessionEvent::RecvConnectFail => "recv CONNECT_FAIL",
            SessionEvent::SendInvoke => "send INVOKE",
            SessionEvent::SendOnewayInvoke => "send oneway INVOKE",
            SessionEvent::RecvResult => "recv RESULT",
            SessionEvent::Close => "close",
            SessionEvent::Fault => "fault",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
