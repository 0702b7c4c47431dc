use crate::core::types::{
    Dictionary,
    Value,
};

/// A role implemented by a WAMP client, announced to the router during session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    Publisher,
    Subscriber,
    Callee,
}

impl ClientRole {
    fn key(&self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
            Self::Callee => "callee",
        }
    }
}

/// Builds the `roles` dictionary embedded in the HELLO details.
///
/// Each role maps to an (empty) feature dictionary, per the WAMP basic profile.
pub fn roles_dictionary<I>(roles: I) -> Dictionary
where
    I: IntoIterator<Item = ClientRole>,
{
    Dictionary::from_iter(
        roles
            .into_iter()
            .map(|role| (role.key().to_owned(), Value::Dictionary(Dictionary::default()))),
    )
}

#[cfg(test)]
mod roles_test {
    use crate::core::{
        roles::{
            ClientRole,
            roles_dictionary,
        },
        types::{
            Dictionary,
            Value,
        },
    };

    #[test]
    fn builds_role_dictionary() {
        let roles = roles_dictionary([ClientRole::Publisher, ClientRole::Subscriber]);
        assert_eq!(roles.len(), 2);
        assert_eq!(
            roles.get("publisher"),
            Some(&Value::Dictionary(Dictionary::default()))
        );
        assert_eq!(
            roles.get("subscriber"),
            Some(&Value::Dictionary(Dictionary::default()))
        );
    }
}
