//! # Session Protocol
//!
//! Message envelopes and the CONNECT / INVOKE request-response handshake.
//!
//! ## Components
//! - **Message**: validated header + body pair
//! - **State**: I/O-free initiator state machine
//! - **Transport**: blocking byte-stream collaborator
//! - **Session**: initiator driver (connect, invoke, oneway invoke, close)
//! - **Responder**: answering side (accept or deny, serve invocations)

pub mod message;
pub mod responder;
pub mod session;
pub mod state;
pub mod transport;
