use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One message in a conversation.
///
/// A `streaming` assistant message is mutable (its text grows as partial
/// frames arrive) until a terminal frame marks it final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub streaming: bool,
    pub error: bool,
    pub sources: Option<Vec<String>>,
}

impl Message {
    /// A finished user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: Utc::now(),
            streaming: false,
            error: false,
            sources: None,
        }
    }

    /// An empty assistant placeholder that partial frames will grow.
    pub fn assistant_placeholder() -> Self {
        Self {
            sender: Sender::Assistant,
            text: String::new(),
            timestamp: Utc::now(),
            streaming: true,
            error: false,
            sources: None,
        }
    }
}

/// Observable state of the persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Disconnected,
}

/// An ordered sequence of messages under one session identity.
///
/// Owned by the client; appended to only by the message-send flow and by
/// inbound frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session: SessionId,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            started_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The assistant message currently receiving partial frames, if any.
    pub fn streaming_message_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.sender == Sender::Assistant && m.streaming)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        let msg = Message::user("hello");
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.text, "hello");
        assert!(!msg.streaming);
        assert!(!msg.error);
        assert!(msg.sources.is_none());
    }

    #[test]
    fn test_assistant_placeholder() {
        let msg = Message::assistant_placeholder();
        assert_eq!(msg.sender, Sender::Assistant);
        assert!(msg.text.is_empty());
        assert!(msg.streaming);
    }

    #[test]
    fn test_sender_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Sender::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_streaming_message_mut_finds_latest() {
        let mut conv = Conversation::new(SessionId::new("s1"));
        conv.push(Message::user("q1"));
        conv.push(Message::assistant_placeholder());

        {
            let streaming = conv.streaming_message_mut().unwrap();
            streaming.text = "partial".to_string();
        }
        assert_eq!(conv.last().unwrap().text, "partial");
    }

    #[test]
    fn test_streaming_message_mut_none_when_final() {
        let mut conv = Conversation::new(SessionId::new("s1"));
        conv.push(Message::user("q1"));
        let mut answer = Message::assistant_placeholder();
        answer.streaming = false;
        conv.push(answer);
        assert!(conv.streaming_message_mut().is_none());
    }

    #[test]
    fn test_conversation_append_order() {
        let mut conv = Conversation::new(SessionId::new("s1"));
        conv.push(Message::user("first"));
        conv.push(Message::user("second"));
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].text, "first");
        assert_eq!(conv.messages[1].text, "second");
    }
}
