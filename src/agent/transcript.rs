//! Negotiation transcript
//!
//! Append-only message history shared by both agents. Only the negotiation
//! loop appends; agents read it.

use crate::core::{ChatMessage, Message, Role};

/// Ordered message history for the current round (and earlier rounds,
/// until the caller resets it)
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, stamping its sequence index. Returns the stored copy.
    pub fn append(&mut self, mut message: Message) -> &Message {
        message.sequence_index = self.messages.len();
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// The most recently appended message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended at or after `index`
    pub fn since(&self, index: usize) -> &[Message] {
        &self.messages[index.min(self.messages.len())..]
    }

    /// Messages written by the named agent
    pub fn by_author<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.is_from(name))
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render the transcript as chat messages from one agent's point of view.
    ///
    /// The agent's own messages become assistant turns. Everything else is a
    /// user turn prefixed with its author so the model can tell speakers apart.
    pub fn to_chat(&self, system_prompt: &str, perspective: &str) -> Vec<ChatMessage> {
        let mut result = Vec::with_capacity(self.messages.len() + 1);
        result.push(ChatMessage::system(system_prompt));

        for message in &self.messages {
            let chat = match message.role {
                Role::Agent if message.author_name == perspective => {
                    ChatMessage::assistant(message.content.clone())
                }
                Role::Agent => {
                    ChatMessage::user(format!("{}: {}", message.author_name, message.content))
                }
                Role::User => ChatMessage::user(format!("User: {}", message.content)),
            };
            result.push(chat);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_sequence_indices() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("Madrid"));
        let stored = transcript.append(Message::agent("LocalInsider", "9:00 Prado"));
        assert_eq!(stored.sequence_index, 1);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().map(|m| m.content.as_str()), Some("9:00 Prado"));
    }

    #[test]
    fn test_indices_restart_after_clear() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("one"));
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.append(Message::user("two")).sequence_index, 0);
    }

    #[test]
    fn test_since_clamps() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("a"));
        transcript.append(Message::agent("A", "b"));
        assert_eq!(transcript.since(1).len(), 1);
        assert!(transcript.since(10).is_empty());
    }

    #[test]
    fn test_to_chat_uses_perspective() {
        let mut transcript = Transcript::new();
        transcript.append(Message::user("Madrid for a day"));
        transcript.append(Message::agent("LocalInsider", "Prado at 9"));
        transcript.append(Message::agent("TravelExpert", "it's not approved"));

        let chat = transcript.to_chat("be helpful", "LocalInsider");
        assert_eq!(chat.len(), 4);
        assert_eq!(chat[0].role, "system");
        assert_eq!(chat[1].content, "User: Madrid for a day");
        assert_eq!(chat[2].role, "assistant");
        assert_eq!(chat[3].role, "user");
        assert_eq!(chat[3].content, "TravelExpert: it's not approved");
    }

    #[test]
    fn test_by_author() {
        let mut transcript = Transcript::new();
        transcript.append(Message::agent("A", "1"));
        transcript.append(Message::agent("B", "2"));
        transcript.append(Message::agent("A", "3"));
        assert_eq!(transcript.by_author("A").count(), 2);
    }
}
