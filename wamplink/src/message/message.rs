use serde_struct_tuple::{
    DeserializeStructTuple,
    SerializeStructTuple,
};
use serde_struct_tuple_enum::{
    DeserializeStructTupleEnum,
    SerializeStructTupleEnum,
};

use crate::core::{
    id::Id,
    types::{
        Dictionary,
        Integer,
        List,
    },
    uri::Uri,
};

/// A HELLO message for a peer to initiate a WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct HelloMessage {
    pub realm: Uri,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub details: Dictionary,
}

/// A WELCOME message for a router to confirm a peer's WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct WelcomeMessage {
    pub session: Id,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub details: Dictionary,
}

/// An ABORT message for quickly terminating a WAMP session.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct AbortMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

/// A GOODBYE message for ending a WAMP session with a two-way handshake.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct GoodbyeMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

/// An ERROR message for communicating an error in response to a single request.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct ErrorMessage {
    pub request_type: Integer,
    pub request: Id,
    pub details: Dictionary,
    pub error: Uri,
    #[serde_struct_tuple(default, skip_serializing_if = List::is_empty)]
    pub arguments: List,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub arguments_keyword: Dictionary,
}

/// A PUBLISH message for publishing an event to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct PublishMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
    #[serde_struct_tuple(default, skip_serializing_if = List::is_empty)]
    pub arguments: List,
    #[serde_struct_tuple(default, skip_serializing_if = Dictionary::is_empty)]
    pub arguments_keyword: Dictionary,
}

/// A SUBSCRIBE message for subscribing to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct SubscribeMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
}

/// A SUBSCRIBED message for confirming a peer has subscribed to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct SubscribedMessage {
    pub subscribe_request: Id,
    pub subscription: Id,
}

/// A REGISTER message for registering a procedure in the realm.
#[derive(Debug, Default, Clone, PartialEq, Eq, SerializeStructTuple, DeserializeStructTuple)]
pub struct RegisterMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
}

/// A WAMP message.
///
/// Only the messages involved in the client session lifecycle are modeled; the tags are those
/// assigned by the WAMP basic profile.
#[derive(Debug, Clone, PartialEq, Eq, SerializeStructTupleEnum, DeserializeStructTupleEnum)]
#[tag(Integer)]
pub enum Message {
    #[tag = 1]
    Hello(HelloMessage),
    #[tag = 2]
    Welcome(WelcomeMessage),
    #[tag = 3]
    Abort(AbortMessage),
    #[tag = 6]
    Goodbye(GoodbyeMessage),
    #[tag = 8]
    Error(ErrorMessage),
    #[tag = 16]
    Publish(PublishMessage),
    #[tag = 32]
    Subscribe(SubscribeMessage),
    #[tag = 33]
    Subscribed(SubscribedMessage),
    #[tag = 64]
    Register(RegisterMessage),
}

impl Message {
    /// The message name, mostly for logging.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Hello(_) => "HELLO",
            Self::Welcome(_) => "WELCOME",
            Self::Abort(_) => "ABORT",
            Self::Goodbye(_) => "GOODBYE",
            Self::Error(_) => "ERROR",
            Self::Publish(_) => "PUBLISH",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::Subscribed(_) => "SUBSCRIBED",
            Self::Register(_) => "REGISTER",
        }
    }

}

#[cfg(test)]
mod message_test {
    use std::fmt::Debug;

    use crate::{
        core::{
            id::Id,
            types::{
                Dictionary,
                List,
                Value,
            },
            uri::Uri,
        },
        message::message::{
            HelloMessage,
            Message,
            PublishMessage,
            SubscribeMessage,
            SubscribedMessage,
            WelcomeMessage,
        },
    };

    #[track_caller]
    fn assert_serialize_to_deserialize_equal<'de, T>(value: &T)
    where
        T: Debug + PartialEq + serde::Serialize + serde::de::DeserializeOwned,
    {
        let serialized = serde_json::to_string(value).unwrap();
        let deserialized = serde_json::from_str::<T>(&serialized).unwrap();
        assert_eq!(value, &deserialized);
    }

    #[test]
    fn deserializes_message_from_tuple() {
        assert_matches::assert_matches!(serde_json::from_str(r#"
            [1, "default"]
        "#), Ok(Message::Hello(message)) => {
            assert_eq!(message, HelloMessage {
                realm: Uri::try_from("default").unwrap(),
                details: Dictionary::default(),
            })
        });

        assert_matches::assert_matches!(serde_json::from_str(r#"
            [2, 42, { "agent": "myrouter" }]
        "#), Ok(Message::Welcome(message)) => {
            assert_eq!(message, WelcomeMessage {
                session: Id::try_from(42).unwrap(),
                details: Dictionary::from_iter([("agent".to_owned(), Value::String("myrouter".to_owned()))]),
            })
        });

        assert_matches::assert_matches!(serde_json::from_str(r#"
            [33, 1, 5512315355
        ]"#), Ok(Message::Subscribed(message)) => {
            assert_eq!(message, SubscribedMessage {
                subscribe_request: Id::try_from(1).unwrap(),
                subscription: Id::try_from(5512315355).unwrap(),
            })
        });

        assert_matches::assert_matches!(serde_json::from_str(r#"
            [16, 2, {}, "com.myapp.topic", ["Hello, world!"]]
        "#), Ok(Message::Publish(message)) => {
            assert_eq!(message, PublishMessage {
                request: Id::try_from(2).unwrap(),
                options: Dictionary::default(),
                topic: Uri::try_from("com.myapp.topic").unwrap(),
                arguments: List::from_iter([Value::String("Hello, world!".to_owned())]),
                arguments_keyword: Dictionary::default(),
            })
        });
    }

    #[test]
    fn serializes_message_to_tuple() {
        assert_matches::assert_matches!(
            serde_json::to_string(&Message::Hello(HelloMessage {
                realm: Uri::try_from("default").unwrap(),
                details: Dictionary::default(),
            })),
            Ok(serialized) => {
                assert_eq!(serialized, r#"[1,"default"]"#);
            }
        );

        assert_matches::assert_matches!(
            serde_json::to_string(&Message::Subscribe(SubscribeMessage {
                request: Id::try_from(1).unwrap(),
                options: Dictionary::default(),
                topic: Uri::try_from("com.myapp.topic").unwrap(),
            })),
            Ok(serialized) => {
                assert_eq!(serialized, r#"[32,1,{},"com.myapp.topic"]"#);
            }
        );
    }

    #[test]
    fn serializes_and_deserializes_equivalently() {
        assert_serialize_to_deserialize_equal(&Message::Hello(HelloMessage {
            realm: Uri::try_from("default").unwrap(),
            details: Dictionary::from_iter([
                ("agent".to_owned(), Value::String("wamplink".to_owned())),
                (
                    "roles".to_owned(),
                    Value::Dictionary(Dictionary::from_iter([(
                        "publisher".to_owned(),
                        Value::Dictionary(Dictionary::default()),
                    )])),
                ),
            ]),
        }));

        assert_serialize_to_deserialize_equal(&Message::Publish(PublishMessage {
            request: Id::try_from(7814135).unwrap(),
            options: Dictionary::from_iter([("acknowledge".to_owned(), Value::Bool(true))]),
            topic: Uri::try_from("com.myapp.topic").unwrap(),
            arguments: List::from_iter([Value::Integer(23), Value::Integer(7)]),
            arguments_keyword: Dictionary::default(),
        }));
    }
}
