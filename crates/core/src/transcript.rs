//! Transcript-related types.

use serde::Serialize;
use whatski_model::MessageRole;

/// A message exchanged in the chat.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    role: MessageRole,
    content: String,
}

impl Message {
    /// Creates a message written by the user.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates a message written by the assistant.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Returns the author of this message.
    #[inline]
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// The chronological record of a chat session.
///
/// Messages can only be appended; nothing is ever removed until the
/// transcript itself is dropped.
#[derive(Clone, Default, Debug, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Returns all messages, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the newest message.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns `true` if any message has exactly this content.
    pub fn contains_content(&self, content: &str) -> bool {
        self.messages.iter().any(|msg| msg.content == content)
    }

    #[inline]
    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_append_order() {
        let mut transcript = Transcript::default();
        assert!(transcript.is_empty());
        transcript.push(Message::user("Hi"));
        transcript.push(Message::assistant("Hello!"));

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.messages()[0].role(), MessageRole::User);
        assert_eq!(transcript.last().unwrap().content(), "Hello!");
        assert!(transcript.contains_content("Hi"));
        assert!(!transcript.contains_content("hi"));
    }

    #[test]
    fn test_serialize() {
        let mut transcript = Transcript::default();
        transcript.push(Message::user("Hi"));
        assert_eq!(
            serde_json::to_value(&transcript).unwrap(),
            json!({ "messages": [{ "role": "user", "content": "Hi" }] })
        );
    }
}
