use anyhow::Error;
use thiserror::Error;

use crate::core::{
    id::Id,
    types::{
        Dictionary,
        Value,
    },
    uri::Uri,
};

/// An error that occurs while establishing the connection to the router.
///
/// Individual attempt failures are retried with backoff by the connection manager; only
/// exhaustion of the attempt budget is fatal to the client.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A single connection attempt failed at the transport level.
    #[error("{0}")]
    AttemptFailed(String),
    /// The configured attempt budget was used up without a successful connection.
    #[error("failed to connect to router after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

/// A session-level ABORT received from the router. Always fatal to the client.
#[derive(Debug, Error)]
#[error("session aborted by router: {reason} ({message})")]
pub struct ProtocolAbort {
    pub reason: Uri,
    pub message: String,
}

/// An ERROR received from the router in response to a single request.
///
/// Whether the error is fatal depends on the intent of the request it correlates with.
#[derive(Debug, Error)]
#[error("request {request_id} failed: {reason} ({message})")]
pub struct ProtocolError {
    pub request_id: Id,
    pub reason: Uri,
    pub message: String,
}

/// Error for an incoming message that violates the WAMP protocol framing itself.
///
/// Distinct from a message that is merely received outside its licensed state, which is
/// logged and dropped without ever crashing the client.
#[derive(Debug, Error)]
#[error("protocol violation: {0}")]
pub struct ProtocolViolation(pub String);

/// The human-readable error text carried in a details dictionary.
pub fn error_text(details: &Dictionary) -> &str {
    match details.get("message") {
        Some(Value::String(message)) => message.as_str(),
        _ => "unknown error",
    }
}

/// An error that can be transmitted over channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTransmittableError {
    pub reason: Uri,
    pub message: String,
    pub request_id: Option<Id>,
}

impl ChannelTransmittableError {
    /// Converts the error into a real [`struct@Error`] object that can be returned out.
    pub fn into_error(self) -> Error {
        match self.request_id {
            Some(request_id) => ProtocolError {
                request_id,
                reason: self.reason,
                message: self.message,
            }
            .into(),
            None => match self.reason.as_ref() {
                "wamp.error.network_failure" => ConnectionError::AttemptFailed(self.message).into(),
                "wamp.error.protocol_violation" => ProtocolViolation(self.message).into(),
                _ => ProtocolAbort {
                    reason: self.reason,
                    message: self.message,
                }
                .into(),
            },
        }
    }
}

impl From<&Error> for ChannelTransmittableError {
    fn from(value: &Error) -> Self {
        Self {
            reason: Uri::for_error(value),
            message: value.to_string(),
            request_id: None,
        }
    }
}

impl From<Error> for ChannelTransmittableError {
    fn from(value: Error) -> Self {
        Self::from(&value)
    }
}
