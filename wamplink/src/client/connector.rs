use anyhow::Result;
use async_trait::async_trait;

use crate::{
    core::stream::MessageStream,
    serializer::serializer::SerializerType,
};

/// A type for initiating a single connection to a router.
///
/// A connector hides the concrete transport entirely: it is expected to establish the
/// underlying connection (negotiating the requested serialization format where the transport
/// supports it) and return a fully-framed message stream.
#[async_trait]
pub trait Connector: Send {
    async fn connect(
        &self,
        uri: &str,
        serializer: SerializerType,
    ) -> Result<Box<dyn MessageStream>>;
}

/// A type for generating a new [`Connector`] per connection attempt.
pub trait ConnectorFactory: Send + Sync {
    /// Creates a new [`Connector`].
    fn new_connector(&self) -> Box<dyn Connector>;
}
