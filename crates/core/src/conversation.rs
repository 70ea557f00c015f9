//! Running dialogue context and example emission for oral argument sessions.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::corpus::Conversation;
use crate::helpers::{format_case_facts, order_turns, render_prompt};
use crate::{system_message_content, Tokenizer, DEFAULT_DEVELOPER_PROMPT, REASONING_LANGUAGE};

/// Role tag of a message in the dialogue context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub role: Role,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Copy `context` and drop its oldest non-system messages until the total
/// token count fits `max_tokens`.
///
/// The first message is never dropped. If it alone exceeds the budget the
/// over-budget snapshot is returned as-is.
pub fn snapshot_and_trim<T>(context: &[Message], tokenizer: &T, max_tokens: usize) -> Vec<Message>
where
    T: Tokenizer + ?Sized,
{
    let Some((system, history)) = context.split_first() else {
        return Vec::new();
    };

    let mut total_tokens: usize = context
        .iter()
        .map(|msg| tokenizer.count_tokens(&msg.content))
        .sum();

    let mut dropped = 0;
    while total_tokens > max_tokens && dropped < history.len() {
        total_tokens -= tokenizer.count_tokens(&history[dropped].content);
        dropped += 1;
    }

    let mut snapshot = Vec::with_capacity(context.len() - dropped);
    snapshot.push(system.clone());
    snapshot.extend_from_slice(&history[dropped..]);
    snapshot
}

/// The growing message log of one conversation.
///
/// Seeded with the case summary as its only `system` message and append-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    messages: Vec<Message>,
}

impl ContextWindow {
    pub fn new(case_summary: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(case_summary)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Budget-trimmed copy of the current context.
    pub fn snapshot_and_trim<T>(&self, tokenizer: &T, max_tokens: usize) -> Vec<Message>
    where
        T: Tokenizer + ?Sized,
    {
        snapshot_and_trim(&self.messages, tokenizer, max_tokens)
    }
}

/// One supervised training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub reasoning_language: String,
    pub developer: String,
    pub user: String,
    pub analysis: String,
    /// The Justice utterance the model should learn to produce.
    #[serde(rename = "final")]
    pub final_response: String,
    pub messages: Vec<Message>,
}

impl ExampleRecord {
    pub fn new(developer: &str, user_prompt: String, target: &str) -> Self {
        let messages = vec![
            Message::system(system_message_content(developer)),
            Message::user(user_prompt.clone()),
            Message::assistant(target),
        ];
        Self {
            reasoning_language: REASONING_LANGUAGE.to_string(),
            developer: developer.to_string(),
            user: user_prompt,
            analysis: String::new(),
            final_response: target.to_string(),
            messages,
        }
    }
}

/// Walks conversations and emits one example per Justice turn.
///
/// The tokenizer is provided externally so the word-count approximation can
/// be swapped for a real tokenizer without touching the trimming logic.
pub struct ExampleEmitter<T>
where
    T: Tokenizer,
{
    tokenizer: T,
    max_tokens: usize,
    developer_prompt: String,
}

impl<T> ExampleEmitter<T>
where
    T: Tokenizer,
{
    /// Create a new ExampleEmitter with the default developer instruction.
    pub fn new(tokenizer: T, max_tokens: usize) -> Self {
        Self {
            tokenizer,
            max_tokens,
            developer_prompt: DEFAULT_DEVELOPER_PROMPT.to_string(),
        }
    }

    pub fn with_developer_prompt(mut self, developer_prompt: impl Into<String>) -> Self {
        self.developer_prompt = developer_prompt.into();
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn developer_prompt(&self) -> &str {
        &self.developer_prompt
    }

    /// Emit the examples of a single conversation in chronological order.
    pub fn emit_conversation(&self, conversation: &Conversation) -> Vec<ExampleRecord> {
        let mut context = ContextWindow::new(format_case_facts(&conversation.meta));
        let mut examples = Vec::new();

        for turn in order_turns(&conversation.turns) {
            let role = turn.role();

            // Snapshot before the turn itself joins the context
            if role.is_target() {
                let snapshot = context.snapshot_and_trim(&self.tokenizer, self.max_tokens);
                let user_prompt = render_prompt(&snapshot);
                examples.push(ExampleRecord::new(
                    &self.developer_prompt,
                    user_prompt,
                    &turn.text,
                ));
            }

            if let Some(message_role) = role.message_role() {
                context.push(Message::new(message_role, turn.text.clone()));
            }
        }

        tracing::debug!(
            conversation = %conversation.id,
            turns = conversation.turns.len(),
            context_messages = context.len(),
            examples = examples.len(),
            "processed conversation"
        );

        examples
    }

    /// Emit the examples of every conversation, one conversation at a time.
    pub fn emit_all(&self, conversations: &[Conversation]) -> Vec<ExampleRecord> {
        conversations
            .iter()
            .flat_map(|conversation| self.emit_conversation(conversation))
            .collect()
    }
}

impl<T> ExampleEmitter<T>
where
    T: Tokenizer + Sync,
{
    /// Emit examples with conversations processed in parallel.
    ///
    /// Conversations share no state, and results are concatenated in input
    /// order, so the output matches [`ExampleEmitter::emit_all`].
    pub fn emit_all_parallel(&self, conversations: &[Conversation]) -> Vec<ExampleRecord> {
        let per_conversation: Vec<Vec<ExampleRecord>> = conversations
            .par_iter()
            .map(|conversation| self.emit_conversation(conversation))
            .collect();
        per_conversation.into_iter().flatten().collect()
    }
}
