//! # wamplink
//!
//! **wamplink** is a Rust library for running a resilient WAMP (Web Application Messaging
//! Protocol) client session.
//!
//! A WAMP client must do a surprising amount of bookkeeping before it can publish a single
//! event: connect to the router (and retry with backoff when the router is unreachable),
//! negotiate a session in a realm with the HELLO/WELCOME handshake, correlate every
//! SUBSCRIBE/REGISTER/PUBLISH request with its asynchronous response or error, and start the
//! whole dance over when the session is dropped. This library packages that bookkeeping as a
//! single [`Client`][`crate::client::Client`] actor running on [`tokio`](https://tokio.rs):
//! preconfigured subscriptions, registrations, and a periodic publication are reissued on
//! every new session, and the session lifecycle is driven by an explicit state machine with
//! one transition per processed event.
//!
//! The wire transport is abstract. The client consumes a
//! [`Connector`][`crate::client::Connector`] that produces framed
//! [`MessageStream`][`crate::core::stream::MessageStream`]s; a raw byte transport can be
//! bridged with [`TransportMessageStream`][`crate::core::stream::TransportMessageStream`] and
//! a JSON or MessagePack [`Serializer`][`crate::serializer::serializer::Serializer`], and
//! in-process peers can be wired directly with
//! [`direct_message_stream_pair`][`crate::core::stream::direct_message_stream_pair`].

pub mod client;
pub mod core;
pub mod message;
pub mod serializer;
pub mod transport;
