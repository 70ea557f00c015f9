//! Core serialization logic for oral argument transcripts.
//!
//! This crate provides the `ExampleEmitter` which walks each argument session
//! in chronological order and turns every Justice utterance into a supervised
//! example suitable for fine-tuning language models.

/// Trait for token estimation.
///
/// Implementors provide a token count for a piece of text. The trimming
/// window only relies on this one method, so a real tokenizer can be
/// substituted for the default word-count approximation.
pub trait Tokenizer {
    /// Estimate the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;
}

// Blanket implementation for references to Tokenizers
impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn count_tokens(&self, text: &str) -> usize {
        (*self).count_tokens(text)
    }
}

/// Word-count approximate tokenizer.
///
/// Counts whitespace-delimited words, so `"a b  c"` is 3 tokens. This is a
/// crude proxy and the counts it produces are part of the output contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

mod conversation;
pub mod corpus;
mod error;
mod helpers;
pub mod pipeline;

pub use conversation::{
    snapshot_and_trim, ContextWindow, ExampleEmitter, ExampleRecord, Message, Role,
};
pub use corpus::{
    discover_corpus_dir, Conversation, ConversationSource, ConvoKitCorpus, InMemoryCorpus,
    Metadata, Speaker, SpeakerRole, Turn,
};
pub use error::{Result, SerializerError};
pub use helpers::{format_case_facts, meta_text, order_turns, render_prompt, WinningSide};
pub use pipeline::{
    run_pipeline, ExampleSink, JsonFileSink, OutputFormat, PipelineConfig, PipelineResult,
};

/// Default token budget for the prompt context of each example.
pub const DEFAULT_MAX_TOKENS: usize = 2000;

/// Reasoning language tag attached to every example.
pub const REASONING_LANGUAGE: &str = "English";

/// Header line that opens the dialogue section of a rendered prompt.
pub const HISTORY_HEADER: &str = "Oral Argument History:";

/// Default developer instruction given to the model.
pub const DEFAULT_DEVELOPER_PROMPT: &str = "You are a Supreme Court Justice who will ask a question. \
You are provided with previous conversations from the Oral Argument. \
Continue the line of questioning or raise another constitutional issue related to the case at hand.";

/// Prefix the developer instruction with the reasoning language header used
/// in the system entry of each example's message array.
pub fn system_message_content(developer_prompt: &str) -> String {
    format!("reasoning language: {}\n\n{}", REASONING_LANGUAGE, developer_prompt)
}
