use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier issued by the service.
            #[inline]
            pub fn new<S: Into<String>>(id: S) -> Self {
                Self(id.into())
            }

            /// Returns the raw identifier.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(
                &self,
                f: &mut ::std::fmt::Formatter<'_>,
            ) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id! {
    /// Opaque handle of a server-side conversation thread.
    ThreadId
}

define_id! {
    /// Opaque identifier of a message within a thread.
    MessageId
}

pub(crate) use define_id;

/// Who authored a thread message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

/// A message stored in a thread, as listed by the service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// The identifier of the message.
    pub id: MessageId,
    /// The author of the message.
    pub role: MessageRole,
    /// All text parts of the message, concatenated.
    pub text: String,
}

/// The order in which messages are listed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

impl SortOrder {
    /// Returns the name used on the wire.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Parameters for listing thread messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageQuery {
    /// The sort order of the result.
    pub order: SortOrder,
    /// The maximum number of messages to return.
    pub limit: u8,
}

impl MessageQuery {
    /// Queries the `limit` most recent messages, newest first.
    #[inline]
    pub fn latest(limit: u8) -> Self {
        Self {
            order: SortOrder::Descending,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_transparent() {
        let id = ThreadId::new("thread_abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"thread_abc\"");
        assert_eq!(id.to_string(), "thread_abc");
    }

    #[test]
    fn test_latest_query() {
        let query = MessageQuery::latest(5);
        assert_eq!(query.order.as_str(), "desc");
        assert_eq!(query.limit, 5);
    }
}
