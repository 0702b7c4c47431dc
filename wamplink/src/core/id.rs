use std::fmt::Display;

use serde::{
    Deserialize,
    Serialize,
    de::{
        Unexpected,
        Visitor,
    },
};
use thiserror::Error;

/// An integer ID, used for identification of sessions, subscriptions, and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Id(u64);

impl Id {
    /// The minimum allowable value of an ID.
    pub const MIN: Id = Id(1);

    /// The maximum allowable value of an ID.
    pub const MAX: Id = Id(1 << 53);
}

impl Default for Id {
    fn default() -> Self {
        Id::MIN
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Error for an ID being out of range.
#[derive(Debug, Error)]
#[error("{value} is out of range for IDs")]
pub struct IdOutOfRange {
    value: u64,
}

impl TryFrom<u64> for Id {
    type Error = IdOutOfRange;
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < Self::MIN.0 || value > Self::MAX.0 {
            Err(IdOutOfRange { value })
        } else {
            Ok(Id(value))
        }
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "an unsigned integer in the range [{}, {}]",
            Id::MIN,
            Id::MAX
        )
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Id::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_u64(IdVisitor)
    }
}

/// A generator for session-scoped request IDs.
///
/// IDs start at [`Id::MIN`] and increase sequentially, so an ID is never repeated within one
/// session. A fresh generator must be allocated for every new session.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: u64,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self { next: Id::MIN.0 }
    }
}

impl RequestIdGenerator {
    /// Generates the next request ID.
    pub fn generate_id(&mut self) -> Id {
        let id = Id(self.next);
        self.next = if self.next == Id::MAX.0 {
            Id::MIN.0
        } else {
            self.next + 1
        };
        id
    }
}

#[cfg(test)]
mod id_test {
    use crate::core::id::{
        Id,
        RequestIdGenerator,
    };

    #[test]
    fn fails_deserialization_out_of_range() {
        assert_matches::assert_matches!(serde_json::from_str::<Id>(r#"0"#), Err(err) => {
            assert!(err.to_string().contains("expected an unsigned integer in the range"));
        });
        assert_matches::assert_matches!(serde_json::from_str::<Id>(r#"9007199254740993"#), Err(err) => {
            assert!(err.to_string().contains("expected an unsigned integer in the range"));
        });
    }

    #[test]
    fn generates_sequential_ids_from_min() {
        let mut generator = RequestIdGenerator::default();
        assert_eq!(generator.generate_id(), Id::MIN);
        assert_eq!(generator.generate_id(), Id::try_from(2).unwrap());
        assert_eq!(generator.generate_id(), Id::try_from(3).unwrap());
    }

    #[test]
    fn new_generator_restarts_sequence() {
        let mut generator = RequestIdGenerator::default();
        generator.generate_id();
        generator.generate_id();
        let mut generator = RequestIdGenerator::default();
        assert_eq!(generator.generate_id(), Id::MIN);
    }
}
