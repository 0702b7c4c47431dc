use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use futures_util::{
    SinkExt,
    StreamExt,
};
use tokio::sync::mpsc;

use crate::{
    message::message::Message,
    serializer::serializer::Serializer,
    transport::transport::{
        Transport,
        TransportData,
    },
};

/// A bidirectional stream of WAMP messages, with framing and serialization already applied.
///
/// This is the interface the client consumes from the transport layer. Implementations are
/// expected to be used by a single owner; sends and receives are not internally synchronized.
#[async_trait]
pub trait MessageStream: Send + std::fmt::Debug {
    /// Sends a message to the remote end.
    async fn send(&mut self, message: Message) -> Result<()>;

    /// Receives the next message from the remote end.
    ///
    /// Returns `None` when the stream has been closed by the remote end.
    async fn receive(&mut self) -> Result<Option<Message>>;

    /// Closes the stream.
    async fn close(&mut self) -> Result<()>;
}

/// A [`MessageStream`] over a raw [`Transport`], framed by a [`Serializer`].
///
/// Transport pings are echoed back transparently and never surface as messages.
#[derive(Debug)]
pub struct TransportMessageStream {
    transport: Box<dyn Transport>,
    serializer: Box<dyn Serializer>,
}

impl TransportMessageStream {
    pub fn new(transport: Box<dyn Transport>, serializer: Box<dyn Serializer>) -> Self {
        Self {
            transport,
            serializer,
        }
    }
}

#[async_trait]
impl MessageStream for TransportMessageStream {
    async fn send(&mut self, message: Message) -> Result<()> {
        let data = self.serializer.serialize(&message)?;
        self.transport.send(TransportData::Message(data)).await
    }

    async fn receive(&mut self) -> Result<Option<Message>> {
        loop {
            match self.transport.next().await {
                Some(Ok(TransportData::Ping(data))) => {
                    self.transport.send(TransportData::Ping(data)).await?;
                }
                Some(Ok(TransportData::Message(data))) => {
                    return Ok(Some(self.serializer.deserialize(&data)?));
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

/// Creates two linked in-memory message streams.
///
/// Used for connecting a client directly to an in-process peer, without any transport or
/// serialization layer in between. Messages sent on one stream are received on the other.
/// Closing (or dropping) one stream ends the other.
pub fn direct_message_stream_pair() -> (Box<dyn MessageStream>, Box<dyn MessageStream>) {
    let (near_tx, far_rx) = mpsc::unbounded_channel();
    let (far_tx, near_rx) = mpsc::unbounded_channel();
    (
        Box::new(DirectMessageStream {
            message_tx: Some(near_tx),
            message_rx: near_rx,
        }),
        Box::new(DirectMessageStream {
            message_tx: Some(far_tx),
            message_rx: far_rx,
        }),
    )
}

#[derive(Debug)]
struct DirectMessageStream {
    message_tx: Option<mpsc::UnboundedSender<Message>>,
    message_rx: mpsc::UnboundedReceiver<Message>,
}

#[async_trait]
impl MessageStream for DirectMessageStream {
    async fn send(&mut self, message: Message) -> Result<()> {
        match &self.message_tx {
            Some(message_tx) => message_tx.send(message).map_err(Error::new),
            None => Err(Error::msg("stream is closed")),
        }
    }

    async fn receive(&mut self) -> Result<Option<Message>> {
        Ok(self.message_rx.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.message_tx.take();
        Ok(())
    }
}
