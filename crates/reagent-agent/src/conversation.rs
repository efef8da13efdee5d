//! Conversation state for one request: an append-only message log.

use reagent_core::types::{Message, Role};

#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the system prompt, prior turns, then the new user message.
    pub fn seeded(system_prompt: &str, history: &[Message], user_message: &str) -> Self {
        let mut conversation = Self::new();
        conversation.push(Message::system(system_prompt));
        conversation.extend(history.iter().cloned());
        conversation.push(Message::user(user_message));
        conversation
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_order() {
        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let conv = Conversation::seeded("You are a test.", &history, "now");

        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(conv.messages()[3].content, "now");
    }

    #[test]
    fn test_last_assistant() {
        let mut conv = Conversation::seeded("sys", &[], "q");
        assert!(conv.last_assistant().is_none());

        conv.push(Message::assistant("first"));
        conv.push(Message::tool("result"));
        conv.push(Message::assistant("second"));
        conv.push(Message::user("answer now"));
        assert_eq!(conv.last_assistant().unwrap().content, "second");
        assert_eq!(conv.len(), 6);
        assert_eq!(conv.into_messages().len(), 6);
    }
}
