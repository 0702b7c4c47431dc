mod client;
mod connection;
mod connector;
mod session;

pub use client::{
    Client,
    ClientConfig,
    ClientHandle,
    PublicationConfig,
};
pub use connection::ConnectionConfig;
pub use connector::{
    Connector,
    ConnectorFactory,
};
pub use session::{
    Command,
    EstablishedSession,
    RequestIntent,
    SessionEvent,
    SessionState,
    SessionStateMachine,
    Termination,
};
