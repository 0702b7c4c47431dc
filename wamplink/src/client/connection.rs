use std::time::Duration;

use anyhow::{
    Context,
    Result,
};
use log::info;

use crate::{
    client::connector::ConnectorFactory,
    core::stream::MessageStream,
    serializer::serializer::SerializerType,
};

/// Configuration for a client's connection to a router.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// The router endpoint to connect to.
    pub uri: String,
    /// The maximum consecutive connection failures to tolerate before giving up.
    pub max_attempts: u32,
    /// The delay between connection attempts.
    pub retry_backoff: Duration,
}

impl ConnectionConfig {
    /// Creates a new config for the given router endpoint.
    pub fn new<S>(uri: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            uri: uri.into(),
            max_attempts: 8,
            retry_backoff: Duration::from_secs(60),
        }
    }
}

/// The connection manager, which owns the connector and the consecutive-failure counter.
///
/// The manager issues individual connection attempts and decides whether another attempt is
/// allowed after a failure. It never inspects protocol payloads; everything above the framed
/// message stream belongs to the session layer.
pub(crate) struct ConnectionManager {
    config: ConnectionConfig,
    serializer: SerializerType,
    connector_factory: Box<dyn ConnectorFactory>,
    attempts: u32,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        serializer: SerializerType,
        connector_factory: Box<dyn ConnectorFactory>,
    ) -> Self {
        Self {
            config,
            serializer,
            connector_factory,
            attempts: 0,
        }
    }

    /// The number of consecutive failed attempts.
    ///
    /// Counts the in-flight attempt while one is outstanding; reset to zero on success, so a
    /// later disconnect gets a fresh retry budget.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Issues a single connection attempt.
    pub async fn attempt_connect(&mut self) -> Result<Box<dyn MessageStream>> {
        self.attempts += 1;
        info!("Connection attempt #{} to {}", self.attempts, self.config.uri);
        let connector = self.connector_factory.new_connector();
        let stream = connector
            .connect(&self.config.uri, self.serializer)
            .await
            .with_context(|| format!("failed to connect to {}", self.config.uri))?;
        info!("Connection established with {}", self.config.uri);
        self.attempts = 0;
        Ok(stream)
    }

    /// The backoff before the next attempt, or `None` once the attempt budget is exhausted.
    pub fn next_retry(&self) -> Option<Duration> {
        if self.attempts < self.config.max_attempts {
            Some(self.config.retry_backoff)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod connection_manager_test {
    use std::{
        sync::{
            Arc,
            atomic::{
                AtomicU32,
                Ordering,
            },
        },
        time::Duration,
    };

    use anyhow::{
        Error,
        Result,
    };
    use async_trait::async_trait;

    use crate::{
        client::{
            connection::{
                ConnectionConfig,
                ConnectionManager,
            },
            connector::{
                Connector,
                ConnectorFactory,
            },
        },
        core::stream::{
            MessageStream,
            direct_message_stream_pair,
        },
        serializer::serializer::SerializerType,
    };

    struct FakeConnector {
        connections: Arc<AtomicU32>,
        failures_before_success: u32,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(
            &self,
            _: &str,
            _: SerializerType,
        ) -> Result<Box<dyn MessageStream>> {
            let connection = self.connections.fetch_add(1, Ordering::SeqCst);
            if connection < self.failures_before_success {
                Err(Error::msg("connection refused"))
            } else {
                let (stream, _) = direct_message_stream_pair();
                Ok(stream)
            }
        }
    }

    struct FakeConnectorFactory {
        connections: Arc<AtomicU32>,
        failures_before_success: u32,
    }

    impl ConnectorFactory for FakeConnectorFactory {
        fn new_connector(&self) -> Box<dyn Connector> {
            Box::new(FakeConnector {
                connections: self.connections.clone(),
                failures_before_success: self.failures_before_success,
            })
        }
    }

    fn connection_manager(failures_before_success: u32, max_attempts: u32) -> ConnectionManager {
        let mut config = ConnectionConfig::new("ws://localhost:8080/wamp");
        config.max_attempts = max_attempts;
        config.retry_backoff = Duration::ZERO;
        ConnectionManager::new(
            config,
            SerializerType::Json,
            Box::new(FakeConnectorFactory {
                connections: Arc::new(AtomicU32::new(0)),
                failures_before_success,
            }),
        )
    }

    #[tokio::test]
    async fn allows_retries_until_attempt_budget_is_exhausted() {
        let mut manager = connection_manager(u32::MAX, 3);
        for _ in 0..3 {
            assert_matches::assert_matches!(manager.attempt_connect().await, Err(_));
        }
        assert_eq!(manager.attempts(), 3);
        assert_eq!(manager.next_retry(), None);
    }

    #[tokio::test]
    async fn resets_attempt_counter_on_success() {
        let mut manager = connection_manager(2, 3);
        assert_matches::assert_matches!(manager.attempt_connect().await, Err(_));
        assert_matches::assert_matches!(manager.attempt_connect().await, Err(_));
        assert_matches::assert_matches!(manager.next_retry(), Some(_));
        assert_matches::assert_matches!(manager.attempt_connect().await, Ok(_));
        assert_eq!(manager.attempts(), 0);
        assert_matches::assert_matches!(manager.next_retry(), Some(_));
    }
}
