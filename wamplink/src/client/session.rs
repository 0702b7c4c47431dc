use std::time::Duration;

use log::{
    error,
    info,
    trace,
    warn,
};

use crate::{
    client::client::ClientConfig,
    core::{
        close::CloseReason,
        error::{
            ChannelTransmittableError,
            error_text,
        },
        hash::HashMap,
        id::{
            Id,
            RequestIdGenerator,
        },
        types::{
            Dictionary,
            Integer,
            Value,
        },
        uri::Uri,
    },
    message::{
        common::{
            goodbye_and_out,
            goodbye_with_close_reason,
            hello_for_realm,
        },
        message::{
            AbortMessage,
            Message,
            PublishMessage,
            RegisterMessage,
            SubscribeMessage,
            WelcomeMessage,
        },
    },
};

/// The intent behind an outstanding request, used to correlate asynchronous responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestIntent {
    Subscribe { topic: Uri },
    Register { procedure: Uri },
    Publish { topic: Uri },
}

impl RequestIntent {
    /// The wire tag of the request message this intent issued, as echoed back in the
    /// `request_type` field of an ERROR response.
    fn request_type(&self) -> Integer {
        match self {
            Self::Subscribe { .. } => 32,
            Self::Register { .. } => 64,
            Self::Publish { .. } => 16,
        }
    }
}

/// Data owned by a live session.
///
/// Exists only inside the `Established` and `Subscribed` states, so the session identifier,
/// pending requests, and recorded subscriptions cannot outlive the session itself.
#[derive(Debug)]
pub struct EstablishedSession {
    session_id: Id,
    request_ids: RequestIdGenerator,
    pending_requests: HashMap<Id, RequestIntent>,
    subscriptions: HashMap<Uri, Id>,
}

impl EstablishedSession {
    fn new(session_id: Id) -> Self {
        Self {
            session_id,
            request_ids: RequestIdGenerator::default(),
            pending_requests: HashMap::default(),
            subscriptions: HashMap::default(),
        }
    }

    /// The subscriptions recorded for this session, by topic.
    pub fn subscriptions(&self) -> &HashMap<Uri, Id> {
        &self.subscriptions
    }
}

/// The lifecycle state of the client session.
#[derive(Debug)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Established(EstablishedSession),
    Subscribed(EstablishedSession),
    Failed,
    Closed,
}

impl SessionState {
    /// The state name, mostly for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Established(_) => "established",
            Self::Subscribed(_) => "subscribed",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    /// Whether the state is terminal. A terminal state processes no further events.
    pub fn terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// An input consumed by the session state machine.
#[derive(Debug)]
pub enum SessionEvent {
    /// The client was started.
    Start,
    /// The connection manager produced a live connection.
    Connected,
    /// A connection attempt failed. The retry backoff is decided by the connection manager;
    /// `None` means the attempt budget is exhausted.
    ConnectionFailed {
        reason: String,
        retry: Option<Duration>,
    },
    /// The active connection was lost.
    Disconnected,
    /// A protocol message arrived from the router.
    Message(Message),
    /// The periodic publication timer fired.
    PublishTick,
    /// The client was asked to shut down.
    Stop,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Connected => "connection",
            Self::ConnectionFailed { .. } => "connection failure",
            Self::Disconnected => "disconnect",
            Self::Message(message) => message.message_name(),
            Self::PublishTick => "publish tick",
            Self::Stop => "stop",
        }
    }
}

/// A side effect requested by the state machine, interpreted by the client driver.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Issue a connection attempt, optionally after a backoff delay.
    Connect { delay: Option<Duration> },
    /// Send a message to the router.
    Send(Message),
    /// Start the periodic publication timer.
    StartPublishTimer(Duration),
    /// Cancel the periodic publication timer, if it is running.
    CancelPublishTimer,
    /// Stop processing events entirely.
    Terminate(Termination),
}

/// How the client terminated.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// The client failed fatally: the router aborted the session, a required request was
    /// rejected, or the connection attempt budget was exhausted.
    Failed { error: ChannelTransmittableError },
    /// The client was shut down by its owner.
    Closed,
}

/// The session state machine.
///
/// A pure, synchronous machine: it consumes one [`SessionEvent`] at a time, performs exactly
/// one state transition, and returns the [`Command`]s for the driver to execute. All session
/// data (identifier, pending requests, subscriptions) lives inside the state itself, so
/// clearing a session is a matter of leaving the state that carries it.
pub struct SessionStateMachine {
    config: ClientConfig,
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
        }
    }

    /// The current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The current session ID, as given by the router.
    ///
    /// Present only while a session is established.
    pub fn current_session_id(&self) -> Option<Id> {
        match &self.state {
            SessionState::Established(session) | SessionState::Subscribed(session) => {
                Some(session.session_id)
            }
            _ => None,
        }
    }

    /// Processes a single event, transitioning at most once.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        let state = std::mem::replace(&mut self.state, SessionState::Disconnected);
        let from = state.name();
        let (next, commands) = self.transition(state, event);
        if next.name() != from {
            trace!(
                "Client {} transitioned from {from} to {}",
                self.config.name,
                next.name()
            );
        }
        self.state = next;
        commands
    }

    fn transition(
        &self,
        state: SessionState,
        event: SessionEvent,
    ) -> (SessionState, Vec<Command>) {
        match (state, event) {
            // Shutdown wins over everything else, in any state.
            (state, SessionEvent::Stop) => self.stop(state),
            // Losing the connection is recoverable from any non-terminal state.
            (state, SessionEvent::Disconnected) if !state.terminal() => {
                warn!("Client {} disconnected from the router", self.config.name);
                (
                    SessionState::Connecting,
                    Vec::from_iter([
                        Command::CancelPublishTimer,
                        Command::Connect { delay: None },
                    ]),
                )
            }
            (SessionState::Disconnected, SessionEvent::Start) => (
                SessionState::Connecting,
                Vec::from_iter([Command::Connect { delay: None }]),
            ),
            (SessionState::Connecting, SessionEvent::Connected) => (
                SessionState::Connected,
                Vec::from_iter([Command::Send(hello_for_realm(
                    &self.config.realm,
                    &self.config.agent,
                    self.config.roles.iter().cloned(),
                ))]),
            ),
            (SessionState::Connecting, SessionEvent::ConnectionFailed { reason, retry }) => {
                match retry {
                    Some(delay) => {
                        warn!("Client {} failed to connect: {reason}", self.config.name);
                        (
                            SessionState::Connecting,
                            Vec::from_iter([Command::Connect { delay: Some(delay) }]),
                        )
                    }
                    None => {
                        error!(
                            "Client {} is giving up on connecting to the router: {reason}",
                            self.config.name
                        );
                        let error = ChannelTransmittableError {
                            reason: Uri::from_known("wamp.error.network_failure"),
                            message: reason,
                            request_id: None,
                        };
                        (
                            SessionState::Failed,
                            Vec::from_iter([Command::Terminate(Termination::Failed { error })]),
                        )
                    }
                }
            }
            (SessionState::Connected, SessionEvent::Message(Message::Welcome(message))) => {
                self.welcome(message)
            }
            (SessionState::Connected, SessionEvent::Message(Message::Abort(message))) => {
                self.abort(message)
            }
            (SessionState::Established(session), event) => self.in_session(session, false, event),
            (SessionState::Subscribed(session), event) => self.in_session(session, true, event),
            // Everything else is an event outside its licensed state: logged and dropped.
            (state, event) => {
                warn!(
                    "Client {} dropped {} in state {}",
                    self.config.name,
                    event.name(),
                    state.name()
                );
                (state, Vec::new())
            }
        }
    }

    fn welcome(&self, message: WelcomeMessage) -> (SessionState, Vec<Command>) {
        let mut session = EstablishedSession::new(message.session);
        info!(
            "Client {} started session {} on realm {}",
            self.config.name, session.session_id, self.config.realm
        );

        let mut commands = Vec::new();
        for topic in &self.config.subscriptions {
            let request_id = session.request_ids.generate_id();
            session.pending_requests.insert(
                request_id,
                RequestIntent::Subscribe {
                    topic: topic.clone(),
                },
            );
            commands.push(Command::Send(Message::Subscribe(SubscribeMessage {
                request: request_id,
                options: Dictionary::default(),
                topic: topic.clone(),
            })));
        }
        for procedure in &self.config.registrations {
            let request_id = session.request_ids.generate_id();
            session.pending_requests.insert(
                request_id,
                RequestIntent::Register {
                    procedure: procedure.clone(),
                },
            );
            commands.push(Command::Send(Message::Register(RegisterMessage {
                request: request_id,
                options: Dictionary::default(),
                procedure: procedure.clone(),
            })));
        }
        if let Some(publication) = &self.config.publication {
            commands.push(Command::StartPublishTimer(publication.interval));
        }

        (SessionState::Established(session), commands)
    }

    fn abort(&self, message: AbortMessage) -> (SessionState, Vec<Command>) {
        let error = ChannelTransmittableError {
            message: error_text(&message.details).to_owned(),
            reason: message.reason,
            request_id: None,
        };
        warn!(
            "Client {} session aborted by router: {} ({})",
            self.config.name, error.reason, error.message
        );
        (
            SessionState::Failed,
            Vec::from_iter([
                Command::CancelPublishTimer,
                Command::Terminate(Termination::Failed { error }),
            ]),
        )
    }

    fn stop(&self, state: SessionState) -> (SessionState, Vec<Command>) {
        if state.terminal() {
            return (state, Vec::new());
        }
        let mut commands = Vec::new();
        if let SessionState::Established(_) | SessionState::Subscribed(_) = &state {
            commands.push(Command::Send(goodbye_with_close_reason(CloseReason::Normal)));
            commands.push(Command::CancelPublishTimer);
        }
        commands.push(Command::Terminate(Termination::Closed));
        (SessionState::Closed, commands)
    }

    fn in_session(
        &self,
        mut session: EstablishedSession,
        subscribed: bool,
        event: SessionEvent,
    ) -> (SessionState, Vec<Command>) {
        let stay = |session| {
            if subscribed {
                SessionState::Subscribed(session)
            } else {
                SessionState::Established(session)
            }
        };
        match event {
            SessionEvent::PublishTick => {
                let mut commands = Vec::new();
                if let Some(publication) = &self.config.publication {
                    let request_id = session.request_ids.generate_id();
                    let mut options = Dictionary::default();
                    if publication.acknowledge {
                        options.insert("acknowledge".to_owned(), Value::Bool(true));
                        session.pending_requests.insert(
                            request_id,
                            RequestIntent::Publish {
                                topic: publication.topic.clone(),
                            },
                        );
                    }
                    trace!(
                        "Client {} publishing to {} (request {request_id})",
                        self.config.name, publication.topic
                    );
                    commands.push(Command::Send(Message::Publish(PublishMessage {
                        request: request_id,
                        options,
                        topic: publication.topic.clone(),
                        arguments: publication.arguments.clone(),
                        arguments_keyword: publication.arguments_keyword.clone(),
                    })));
                }
                (stay(session), commands)
            }
            SessionEvent::Message(Message::Subscribed(message)) => {
                match session.pending_requests.remove(&message.subscribe_request) {
                    Some(RequestIntent::Subscribe { topic }) => {
                        info!(
                            "Client {} subscribed to {topic} (subscription {})",
                            self.config.name, message.subscription
                        );
                        session.subscriptions.insert(topic, message.subscription);
                        (SessionState::Subscribed(session), Vec::new())
                    }
                    Some(intent) => {
                        // Not ours to consume; the response does not answer this request.
                        session
                            .pending_requests
                            .insert(message.subscribe_request, intent);
                        warn!(
                            "Client {} dropped SUBSCRIBED for request {}, which is not a subscribe request",
                            self.config.name, message.subscribe_request
                        );
                        (stay(session), Vec::new())
                    }
                    None => {
                        warn!(
                            "Client {} dropped SUBSCRIBED for unknown request {}",
                            self.config.name, message.subscribe_request
                        );
                        (stay(session), Vec::new())
                    }
                }
            }
            SessionEvent::Message(Message::Error(message)) => {
                // An ERROR answers a request only if both the request ID and the echoed
                // request type match what is outstanding.
                let correlated = session
                    .pending_requests
                    .get(&message.request)
                    .is_some_and(|intent| intent.request_type() == message.request_type);
                if !correlated {
                    warn!(
                        "Client {} dropped ERROR for request {} (request type {})",
                        self.config.name, message.request, message.request_type
                    );
                    return (stay(session), Vec::new());
                }
                match session.pending_requests.remove(&message.request) {
                    Some(RequestIntent::Subscribe { .. } | RequestIntent::Register { .. }) => {
                        let error = ChannelTransmittableError {
                            message: error_text(&message.details).to_owned(),
                            reason: message.error,
                            request_id: Some(message.request),
                        };
                        error!(
                            "Client {} cannot operate without request {}: {} ({})",
                            self.config.name, message.request, error.reason, error.message
                        );
                        (
                            SessionState::Failed,
                            Vec::from_iter([
                                Command::CancelPublishTimer,
                                Command::Terminate(Termination::Failed { error }),
                            ]),
                        )
                    }
                    Some(RequestIntent::Publish { topic }) => {
                        warn!(
                            "Client {} failed to publish to {topic}: {}",
                            self.config.name, message.error
                        );
                        (stay(session), Vec::new())
                    }
                    None => (stay(session), Vec::new()),
                }
            }
            SessionEvent::Message(Message::Goodbye(message)) => {
                info!(
                    "Client {} session {} closed by router: {}",
                    self.config.name, session.session_id, message.reason
                );
                (
                    SessionState::Connecting,
                    Vec::from_iter([
                        Command::Send(goodbye_and_out()),
                        Command::CancelPublishTimer,
                        Command::Connect { delay: None },
                    ]),
                )
            }
            SessionEvent::Message(Message::Abort(message)) => self.abort(message),
            event => {
                let state_name = if subscribed { "subscribed" } else { "established" };
                warn!(
                    "Client {} dropped {} in state {state_name}",
                    self.config.name,
                    event.name()
                );
                (stay(session), Vec::new())
            }
        }
    }
}
