use anyhow::Error;

use crate::{
    core::{
        close::CloseReason,
        roles::{
            ClientRole,
            roles_dictionary,
        },
        types::{
            Dictionary,
            Value,
        },
        uri::Uri,
    },
    message::message::{
        AbortMessage,
        GoodbyeMessage,
        HelloMessage,
        Message,
    },
};

/// Builds the HELLO message announcing the client to the router.
pub fn hello_for_realm<I>(realm: &Uri, agent: &str, roles: I) -> Message
where
    I: IntoIterator<Item = ClientRole>,
{
    Message::Hello(HelloMessage {
        realm: realm.clone(),
        details: Dictionary::from_iter([
            ("agent".to_owned(), Value::String(agent.to_owned())),
            ("roles".to_owned(), Value::Dictionary(roles_dictionary(roles))),
        ]),
    })
}

pub fn abort_message_for_error(error: &Error) -> Message {
    Message::Abort(AbortMessage {
        details: Dictionary::from_iter([("message".to_owned(), Value::String(error.to_string()))]),
        reason: Uri::for_error(error),
    })
}

pub fn goodbye_with_close_reason(close_reason: CloseReason) -> Message {
    Message::Goodbye(GoodbyeMessage {
        details: Dictionary::default(),
        reason: close_reason.uri(),
    })
}

pub fn goodbye_and_out() -> Message {
    goodbye_with_close_reason(CloseReason::GoodbyeAndOut)
}
