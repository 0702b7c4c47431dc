use std::fmt::Debug;

use anyhow::{
    Error,
    Result,
};
use futures_util::{
    Sink,
    Stream,
};

/// Data received from a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportData {
    /// Data that should be perceived as a health check and immediately sent back to the
    /// sender.
    Ping(Vec<u8>),
    /// Data representing a meaningful WAMP message.
    Message(Vec<u8>),
}

/// A transport, over which WAMP messages can be sent and received.
///
/// Implemented as a [`Stream`] and [`Sink`] of raw frames. Concrete transports (such as
/// WebSocket streams) live outside this library; the client only consumes this interface,
/// bridged to typed messages by
/// [`TransportMessageStream`][`crate::core::stream::TransportMessageStream`].
pub trait Transport:
    Send + Stream<Item = Result<TransportData>> + Sink<TransportData, Error = Error> + Unpin + Debug
{
}
