use std::fmt::Debug;

use anyhow::Result;

use crate::{
    message::message::Message,
    serializer::{
        json::JsonSerializer,
        message_pack::MessagePackSerializer,
    },
};

/// The type of serializer to use.
///
/// Protocol negotiation (such as WebSocket subprotocol selection) belongs to the concrete
/// connector; the client only forwards the requested type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializerType {
    /// Serializes messages to and from JavaScript Object Notation.
    #[default]
    Json,
    /// Serializes messages to and from the MessagePack format.
    MessagePack,
}

/// A serializer, which serializes and deserializes WAMP messages to a well-known format that
/// can be passed over wire.
///
/// Does not implement message batching.
pub trait Serializer: Send + Debug {
    /// Serializes the given message to bytes.
    fn serialize(&self, value: &Message) -> Result<Vec<u8>>;

    /// Deserializes bytes to a message.
    fn deserialize(&self, bytes: &[u8]) -> Result<Message>;
}

/// Creates a new [`Serializer`] for the given type.
pub fn new_serializer(serializer_type: SerializerType) -> Box<dyn Serializer> {
    match serializer_type {
        SerializerType::Json => Box::new(JsonSerializer::default()),
        SerializerType::MessagePack => Box::new(MessagePackSerializer::default()),
    }
}
