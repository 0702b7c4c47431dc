use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
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
use tokio::sync::mpsc;
use wamplink::{
    client::{
        Client,
        ClientConfig,
        ConnectionConfig,
        Connector,
        ConnectorFactory,
    },
    core::{
        error::ConnectionError,
        id::Id,
        stream::{
            MessageStream,
            direct_message_stream_pair,
        },
        types::Dictionary,
    },
    message::message::{
        Message,
        WelcomeMessage,
    },
    serializer::serializer::SerializerType,
};

enum ConnectOutcome {
    Fail,
    Succeed,
}

struct ScriptedConnector {
    attempts: Arc<AtomicU32>,
    script: Arc<Mutex<VecDeque<ConnectOutcome>>>,
    router_stream_tx: mpsc::UnboundedSender<Box<dyn MessageStream>>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _: &str, _: SerializerType) -> Result<Box<dyn MessageStream>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(ConnectOutcome::Succeed) => {
                let (client_stream, router_stream) = direct_message_stream_pair();
                self.router_stream_tx.send(router_stream).ok();
                Ok(client_stream)
            }
            _ => Err(Error::msg("connection refused")),
        }
    }
}

struct ScriptedConnectorFactory {
    attempts: Arc<AtomicU32>,
    script: Arc<Mutex<VecDeque<ConnectOutcome>>>,
    router_stream_tx: mpsc::UnboundedSender<Box<dyn MessageStream>>,
}

impl ConnectorFactory for ScriptedConnectorFactory {
    fn new_connector(&self) -> Box<dyn Connector> {
        Box::new(ScriptedConnector {
            attempts: self.attempts.clone(),
            script: self.script.clone(),
            router_stream_tx: self.router_stream_tx.clone(),
        })
    }
}

fn scripted_client(
    script: impl IntoIterator<Item = ConnectOutcome>,
    max_attempts: u32,
) -> (
    Client,
    Arc<AtomicU32>,
    mpsc::UnboundedReceiver<Box<dyn MessageStream>>,
) {
    let attempts = Arc::new(AtomicU32::new(0));
    let (router_stream_tx, router_stream_rx) = mpsc::unbounded_channel();
    let mut connection = ConnectionConfig::new("ws://localhost:8080/wamp");
    connection.max_attempts = max_attempts;
    connection.retry_backoff = Duration::ZERO;
    let client = Client::new(
        ClientConfig::new(connection),
        Box::new(ScriptedConnectorFactory {
            attempts: attempts.clone(),
            script: Arc::new(Mutex::new(VecDeque::from_iter(script))),
            router_stream_tx,
        }),
    )
    .unwrap();
    (client, attempts, router_stream_rx)
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    test_utils::setup::setup_test_environment();

    let (client, attempts, _router_stream_rx) = scripted_client([], 8);
    let handle = client.start();
    let mut error_rx = handle.error_rx();

    assert_matches::assert_matches!(error_rx.recv().await, Ok(error) => {
        assert_matches::assert_matches!(
            error.into_error().downcast::<ConnectionError>(),
            Ok(ConnectionError::AttemptFailed(message)) => {
                assert!(
                    message.contains("after 8 attempts"),
                    "unexpected error message: {message}"
                );
            }
        );
    });
    handle.join().await.unwrap();

    // The budget bounds the attempts; no 9th attempt was issued.
    assert_eq!(attempts.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn retries_with_backoff_before_connecting() {
    test_utils::setup::setup_test_environment();

    let (client, attempts, mut router_stream_rx) = scripted_client(
        [
            ConnectOutcome::Fail,
            ConnectOutcome::Fail,
            ConnectOutcome::Succeed,
        ],
        8,
    );
    let handle = client.start();
    let mut session_established_rx = handle.session_established_rx();

    let mut router_stream = router_stream_rx.recv().await.unwrap();
    assert_matches::assert_matches!(router_stream.receive().await, Ok(Some(Message::Hello(_))));
    router_stream
        .send(Message::Welcome(WelcomeMessage {
            session: Id::try_from(7).unwrap(),
            details: Dictionary::default(),
        }))
        .await
        .unwrap();

    assert_matches::assert_matches!(session_established_rx.recv().await, Ok(session_id) => {
        assert_eq!(session_id, Id::try_from(7).unwrap());
    });
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    handle.cancel().unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn successful_connection_resets_the_attempt_budget() {
    test_utils::setup::setup_test_environment();

    // Two failures eat most of the budget; the successful connection must reset it, so the
    // disconnect that follows gets three fresh attempts.
    let (client, attempts, mut router_stream_rx) = scripted_client(
        [
            ConnectOutcome::Fail,
            ConnectOutcome::Fail,
            ConnectOutcome::Succeed,
        ],
        3,
    );
    let handle = client.start();
    let mut error_rx = handle.error_rx();
    let mut session_established_rx = handle.session_established_rx();

    let mut router_stream = router_stream_rx.recv().await.unwrap();
    assert_matches::assert_matches!(router_stream.receive().await, Ok(Some(Message::Hello(_))));
    router_stream
        .send(Message::Welcome(WelcomeMessage {
            session: Id::try_from(7).unwrap(),
            details: Dictionary::default(),
        }))
        .await
        .unwrap();
    assert_matches::assert_matches!(session_established_rx.recv().await, Ok(_));

    // Drop the connection; the reconnect budget is exhausted by the empty script.
    drop(router_stream);

    assert_matches::assert_matches!(error_rx.recv().await, Ok(error) => {
        assert!(
            error.message.contains("after 3 attempts"),
            "unexpected error message: {}",
            error.message
        );
    });
    handle.join().await.unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 6);
}
