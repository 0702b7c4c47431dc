use std::{
    collections::VecDeque,
    time::Duration,
};

use anyhow::{
    Error,
    Result,
};
use log::{
    error,
    info,
    warn,
};
use tokio::{
    sync::broadcast::{
        self,
        error::RecvError,
    },
    task::JoinHandle,
    time::Interval,
};

use crate::{
    client::{
        connection::{
            ConnectionConfig,
            ConnectionManager,
        },
        connector::ConnectorFactory,
        session::{
            Command,
            SessionEvent,
            SessionStateMachine,
            Termination,
        },
    },
    core::{
        error::{
            ChannelTransmittableError,
            ConnectionError,
        },
        hash::HashSet,
        id::Id,
        roles::ClientRole,
        service::{
            Service,
            ServiceHandle,
        },
        types::{
            Dictionary,
            List,
        },
        uri::Uri,
    },
    message::message::Message,
    serializer::serializer::SerializerType,
};

const DEFAULT_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Configuration for a periodic publication, issued on a timer while a session is live.
///
/// The timer starts when a session is established and is torn down whenever the session is
/// lost, so events are never published into a stale or absent session.
#[derive(Debug, Clone)]
pub struct PublicationConfig {
    /// The topic to publish to.
    pub topic: Uri,
    /// How often to publish. The first publication fires as soon as the session is ready.
    pub interval: Duration,
    /// Positional payload arguments.
    pub arguments: List,
    /// Keyword payload arguments.
    pub arguments_keyword: Dictionary,
    /// Request acknowledgment from the router.
    ///
    /// Acknowledged publications are tracked as pending requests, and a rejection is logged
    /// without terminating the client.
    pub acknowledge: bool,
}

impl PublicationConfig {
    /// Creates a new config publishing an empty payload to the given topic.
    pub fn new(topic: Uri, interval: Duration) -> Self {
        Self {
            topic,
            interval,
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
            acknowledge: false,
        }
    }
}

/// Configuration for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name of the client, mostly for logging.
    pub name: String,
    /// Agent name, communicated to the router.
    pub agent: String,
    /// The realm to establish sessions in.
    pub realm: Uri,
    /// The serialization format requested from the connector.
    pub serializer: SerializerType,
    /// Connection and retry configuration.
    pub connection: ConnectionConfig,
    /// Roles implemented by the client.
    pub roles: HashSet<ClientRole>,
    /// Topics subscribed to on every new session.
    pub subscriptions: Vec<Uri>,
    /// Procedures registered on every new session.
    pub registrations: Vec<Uri>,
    /// A periodic publication issued while a session is live.
    pub publication: Option<PublicationConfig>,
}

impl ClientConfig {
    /// Creates a new config for the given connection, with no preconfigured resources.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            name: DEFAULT_AGENT.to_owned(),
            agent: DEFAULT_AGENT.to_owned(),
            realm: Uri::from_known("default"),
            serializer: SerializerType::default(),
            connection,
            roles: HashSet::from_iter([
                ClientRole::Publisher,
                ClientRole::Subscriber,
                ClientRole::Callee,
            ]),
            subscriptions: Vec::new(),
            registrations: Vec::new(),
            publication: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            return Err(Error::msg("at least one role is required"));
        }
        if self
            .publication
            .as_ref()
            .is_some_and(|publication| publication.interval.is_zero())
        {
            return Err(Error::msg("publication interval must be non-zero"));
        }
        Ok(())
    }
}

/// A handle to an asynchronously-running [`Client`].
///
/// The client's ownership is transferred away when it starts. This handle allows interaction
/// with the client as it is running asynchronously.
pub struct ClientHandle {
    start_handle: JoinHandle<()>,
    cancel_tx: broadcast::Sender<()>,
    error_rx: broadcast::Receiver<ChannelTransmittableError>,
    session_established_rx: broadcast::Receiver<Id>,
    session_finished_rx: broadcast::Receiver<()>,
}

impl ClientHandle {
    /// Joins the task running the client.
    pub async fn join(self) -> Result<()> {
        self.start_handle.await.map_err(Error::new)
    }

    /// Cancels the client, closing any live session with a GOODBYE.
    ///
    /// Cancellation is asynchronous. Use [`Self::join`] to wait for the client to stop.
    pub fn cancel(&self) -> Result<()> {
        self.cancel_tx.send(()).map(|_| ()).map_err(Error::new)
    }

    /// The error receiver channel.
    ///
    /// Only errors that are fatal to the client are reported here, which means the client is
    /// no longer running.
    pub fn error_rx(&self) -> broadcast::Receiver<ChannelTransmittableError> {
        self.error_rx.resubscribe()
    }

    /// Receiver channel for newly established sessions, carrying the session ID assigned by
    /// the router.
    pub fn session_established_rx(&self) -> broadcast::Receiver<Id> {
        self.session_established_rx.resubscribe()
    }

    /// Receiver channel for a single session finishing, for observing reconnection.
    pub fn session_finished_rx(&self) -> broadcast::Receiver<()> {
        self.session_finished_rx.resubscribe()
    }
}

/// A WAMP client that connects to a router, establishes a session in a realm, and keeps its
/// preconfigured subscriptions, registrations, and periodic publication alive across
/// sessions.
///
/// The client runs as a single actor: connection attempts are retried with bounded backoff, a
/// lost session loops back to connecting, and the whole lifecycle is driven by one state
/// machine processing one event at a time. The router aborting the session or the attempt
/// budget running out stops the actor; both surface on [`ClientHandle::error_rx`].
pub struct Client {
    config: ClientConfig,
    connector_factory: Box<dyn ConnectorFactory>,
}

impl Client {
    /// Creates a new client.
    pub fn new(config: ClientConfig, connector_factory: Box<dyn ConnectorFactory>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector_factory,
        })
    }

    /// Starts the client asynchronously.
    ///
    /// This method takes ownership of the client. All future interactions with the client
    /// should be made through the returned handle.
    pub fn start(self) -> ClientHandle {
        let (cancel_tx, cancel_rx) = broadcast::channel(16);
        let (error_tx, error_rx) = broadcast::channel(16);
        let (session_established_tx, session_established_rx) = broadcast::channel(16);
        let (session_finished_tx, session_finished_rx) = broadcast::channel(16);

        let manager = ConnectionManager::new(
            self.config.connection.clone(),
            self.config.serializer,
            self.connector_factory,
        );
        let actor = ClientActor {
            name: self.config.name.clone(),
            machine: SessionStateMachine::new(self.config),
            manager,
            connection: None,
            publish_timer: None,
            session_established_tx,
            session_finished_tx,
        };
        let start_handle = tokio::spawn(actor.run(cancel_rx, error_tx));
        ClientHandle {
            start_handle,
            cancel_tx,
            error_rx,
            session_established_rx,
            session_finished_rx,
        }
    }
}

struct ActiveConnection {
    service: ServiceHandle,
    message_rx: broadcast::Receiver<Message>,
    end_rx: broadcast::Receiver<()>,
}

struct ClientActor {
    name: String,
    machine: SessionStateMachine,
    manager: ConnectionManager,
    connection: Option<ActiveConnection>,
    publish_timer: Option<Interval>,
    session_established_tx: broadcast::Sender<Id>,
    session_finished_tx: broadcast::Sender<()>,
}

impl ClientActor {
    async fn run(
        mut self,
        mut cancel_rx: broadcast::Receiver<()>,
        error_tx: broadcast::Sender<ChannelTransmittableError>,
    ) {
        match self.actor_loop(&mut cancel_rx).await {
            Ok(Termination::Closed) => {
                info!("Client {} shut down", self.name);
            }
            Ok(Termination::Failed { error }) => {
                error_tx.send(error).ok();
            }
            Err(err) => {
                error!("Client {} failed unexpectedly: {err:#}", self.name);
                error_tx.send(err.into()).ok();
            }
        }
        // Wait for the service to drain its outbound queue before the actor exits.
        if let Some(connection) = self.connection.take() {
            connection.service.cancel().ok();
            connection.service.join().await.ok();
        }
    }

    /// The main actor loop.
    ///
    /// Events are processed strictly serially: each event runs through the state machine and
    /// all resulting commands are executed before the next event is dequeued.
    async fn actor_loop(
        &mut self,
        cancel_rx: &mut broadcast::Receiver<()>,
    ) -> Result<Termination> {
        let mut events = VecDeque::from_iter([SessionEvent::Start]);
        loop {
            while let Some(event) = events.pop_front() {
                let session_before = self.machine.current_session_id();
                let commands = self.machine.handle(event);
                self.notify_session_changes(session_before);
                for command in commands {
                    if let Some(termination) =
                        self.execute(command, &mut events, cancel_rx).await?
                    {
                        return Ok(termination);
                    }
                }
            }
            let event = self.next_event(cancel_rx).await?;
            events.push_back(event);
        }
    }

    fn notify_session_changes(&self, before: Option<Id>) {
        let after = self.machine.current_session_id();
        if before == after {
            return;
        }
        if before.is_some() {
            self.session_finished_tx.send(()).ok();
        }
        if let Some(session_id) = after {
            self.session_established_tx.send(session_id).ok();
        }
    }

    async fn execute(
        &mut self,
        command: Command,
        events: &mut VecDeque<SessionEvent>,
        cancel_rx: &mut broadcast::Receiver<()>,
    ) -> Result<Option<Termination>> {
        match command {
            Command::Send(message) => {
                let message_name = message.message_name();
                match &self.connection {
                    Some(connection) => {
                        if let Err(err) = connection.service.message_tx().send(message) {
                            warn!(
                                "Client {} failed to send {message_name} message: {err}",
                                self.name
                            );
                        }
                    }
                    None => warn!(
                        "Client {} cannot send {message_name} message without a connection",
                        self.name
                    ),
                }
            }
            Command::Connect { delay } => {
                if let Some(delay) = delay {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => (),
                        _ = cancel_rx.recv() => {
                            events.push_back(SessionEvent::Stop);
                            return Ok(None);
                        }
                    }
                }
                self.drop_connection();
                match self.manager.attempt_connect().await {
                    Ok(stream) => {
                        let service = Service::new(self.name.clone(), stream);
                        let message_rx = service.message_rx();
                        let end_rx = service.end_rx();
                        let service = service.start();
                        self.connection = Some(ActiveConnection {
                            service,
                            message_rx,
                            end_rx,
                        });
                        events.push_back(SessionEvent::Connected);
                    }
                    Err(err) => {
                        let retry = self.manager.next_retry();
                        let reason = match retry {
                            Some(_) => format!("{err:#}"),
                            None => format!(
                                "{:#}",
                                err.context(ConnectionError::AttemptsExhausted {
                                    attempts: self.manager.attempts(),
                                })
                            ),
                        };
                        events.push_back(SessionEvent::ConnectionFailed { reason, retry });
                    }
                }
            }
            Command::StartPublishTimer(period) => {
                self.publish_timer = Some(tokio::time::interval(period));
            }
            Command::CancelPublishTimer => {
                self.publish_timer = None;
            }
            Command::Terminate(termination) => return Ok(Some(termination)),
        }
        Ok(None)
    }

    async fn next_event(
        &mut self,
        cancel_rx: &mut broadcast::Receiver<()>,
    ) -> Result<SessionEvent> {
        enum Wake {
            Stop,
            Inbound(Result<Message, RecvError>),
            ConnectionEnded,
            PublishTick,
        }

        let wake = match &mut self.connection {
            Some(connection) => {
                tokio::select! {
                    _ = cancel_rx.recv() => Wake::Stop,
                    message = connection.message_rx.recv() => Wake::Inbound(message),
                    _ = connection.end_rx.recv() => Wake::ConnectionEnded,
                    _ = next_publish_tick(&mut self.publish_timer) => Wake::PublishTick,
                }
            }
            None => {
                tokio::select! {
                    _ = cancel_rx.recv() => Wake::Stop,
                }
            }
        };

        match wake {
            Wake::Stop => Ok(SessionEvent::Stop),
            Wake::Inbound(Ok(message)) => Ok(SessionEvent::Message(message)),
            Wake::Inbound(Err(RecvError::Closed)) | Wake::ConnectionEnded => {
                self.drop_connection();
                Ok(SessionEvent::Disconnected)
            }
            Wake::Inbound(Err(err)) => {
                Err(Error::new(err).context("failed to receive message from the active connection"))
            }
            Wake::PublishTick => Ok(SessionEvent::PublishTick),
        }
    }

    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.service.cancel().ok();
        }
    }
}

async fn next_publish_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
