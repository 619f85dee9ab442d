//! Message and Conversation domain types.
//!
//! These are the value objects that flow through the tuning loop:
//! the loop asks for a decision → the provider answers with an assistant
//! message → tools run → their results come back as tool messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (one tuning run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// System instructions are not part of the conversation; they travel
/// beside it in every [`ProviderRequest`](crate::provider::ProviderRequest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The operator (initial request and per-round feedback)
    User,
    /// The language model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content. Empty for assistant messages that only carry tool calls.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<MessageToolCall>,
    ) -> Self {
        let mut msg = Self::new(Role::Assistant, content.into());
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// The text content, or `None` when the message carries no text.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.content.trim();
        if trimmed.is_empty() { None } else { Some(&self.content) }
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a raw JSON string. Parsing may fail.
    pub arguments: String,
}

/// The conversation memory of one tuning run.
///
/// An append-only ordered log: messages can be pushed and read, never
/// removed, reordered or edited. The whole history is sent to the provider
/// on every think step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// All messages in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recently appended message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Content of the first user message.
    pub fn first_user_request(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The latest assistant message that carries text.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(Message::text)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Run the baseline round");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Run the baseline round");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn tool_result_links_back_to_call() {
        let msg = Message::tool_result("call_7", "ok");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_7"));
    }

    #[test]
    fn tool_only_assistant_message_has_no_text() {
        let msg = Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "bash_execute".into(),
                arguments: r#"{"command":"true"}"#.into(),
            }],
        );
        assert!(msg.text().is_none());
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn conversation_preserves_append_order() {
        let mut conv = Conversation::new();
        let contents: Vec<String> = (0..25).map(|i| format!("message {i}")).collect();
        for c in &contents {
            conv.push(Message::user(c.clone()));
        }

        assert_eq!(conv.len(), 25);
        let seen: Vec<&str> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(seen, contents.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(conv.last().unwrap().content, "message 24");
    }

    #[test]
    fn append_does_not_touch_prior_entries() {
        let mut conv = Conversation::new();
        conv.push(Message::user("first"));
        let first_id = conv.messages()[0].id.clone();

        conv.push(Message::assistant("second"));
        conv.push(Message::tool_result("call_1", "third"));

        assert_eq!(conv.messages()[0].id, first_id);
        assert_eq!(conv.messages()[0].content, "first");
        assert_eq!(conv.messages()[1].content, "second");
    }

    #[test]
    fn summary_helpers() {
        let mut conv = Conversation::new();
        assert!(conv.first_user_request().is_none());
        assert!(conv.last_assistant_text().is_none());

        conv.push(Message::user("baseline please"));
        conv.push(Message::assistant("running defaults"));
        conv.push(Message::assistant_with_tools("", vec![]));
        conv.push(Message::user("feedback"));

        assert_eq!(conv.first_user_request(), Some("baseline please"));
        assert_eq!(conv.last_assistant_text(), Some("running defaults"));
    }
}
