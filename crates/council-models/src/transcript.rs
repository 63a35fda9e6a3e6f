use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Append-only record of every message in one conversation.
///
/// There is deliberately no way to remove or edit an entry once it has been
/// appended; the scheduler relies on the length growing by exactly one per turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transcript from the seed task message.
    pub fn seeded(task: Message) -> Self {
        Self {
            messages: vec![task],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Messages that are relayed to the user.
    pub fn text_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_text())
    }

    /// Messages produced by the named participant, oldest first.
    pub fn from_sender<'a>(&'a self, sender: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.sender == sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_transcript_has_task_first() {
        let transcript = Transcript::seeded(Message::task("TSLA"));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].content, "TSLA");
        assert_eq!(transcript.text_messages().count(), 0);
    }

    #[test]
    fn append_preserves_order() {
        let mut transcript = Transcript::seeded(Message::task("TSLA"));
        transcript.append(Message::text("stock_trends_agent", "up 4%"));
        transcript.append(Message::tool_result("news_agent", "raw search"));
        transcript.append(Message::text("sentiment_agent", "positive"));

        let senders: Vec<&str> = transcript.iter().map(|m| m.sender.as_str()).collect();
        assert_eq!(
            senders,
            vec!["user", "stock_trends_agent", "news_agent", "sentiment_agent"]
        );
        assert_eq!(transcript.text_messages().count(), 2);
        assert_eq!(transcript.from_sender("news_agent").count(), 1);
        assert_eq!(transcript.last().unwrap().sender, "sentiment_agent");
    }
}
