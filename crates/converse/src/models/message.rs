use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single text content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

/// One turn of a conversation, in the upstream wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<TextBlock>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            content: Vec::new(),
        }
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content.push(TextBlock { text: text.into() });
        self
    }

    /// Concatenated text of all blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// The ordered turns sent upstream.
///
/// Built fresh for every request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Conversation(Vec<Message>);

impl Conversation {
    /// A conversation holding exactly one user turn with the given text
    pub fn single_turn<S: Into<String>>(question: S) -> Self {
        Self(vec![Message::user().with_text(question)])
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }
}
