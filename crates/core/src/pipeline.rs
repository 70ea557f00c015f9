//! Pipeline wiring a conversation source, the example emitter and a sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::conversation::{ExampleEmitter, ExampleRecord};
use crate::corpus::{ConversationSource, SpeakerRole};
use crate::error::{Result, SerializerError};
use crate::{Tokenizer, DEFAULT_DEVELOPER_PROMPT, DEFAULT_MAX_TOKENS};

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Token budget for each example's prompt context.
    pub max_tokens: usize,
    pub developer_prompt: String,
    /// Process conversations on the rayon thread pool.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            developer_prompt: DEFAULT_DEVELOPER_PROMPT.to_string(),
            parallel: false,
        }
    }
}

/// Counts gathered over a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub total_conversations: usize,
    pub total_turns: usize,
    pub justice_turns: usize,
    pub advocate_turns: usize,
    pub unmapped_turns: usize,
    pub total_examples: usize,
}

/// Receives the finished examples of a run.
pub trait ExampleSink {
    fn write_examples(&mut self, examples: &[ExampleRecord]) -> Result<()>;
}

impl ExampleSink for Vec<ExampleRecord> {
    fn write_examples(&mut self, examples: &[ExampleRecord]) -> Result<()> {
        self.extend_from_slice(examples);
        Ok(())
    }
}

/// On-disk layout of the written examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// A single pretty-printed JSON array.
    #[default]
    Json,
    /// One JSON object per line.
    Jsonl,
}

/// Writes examples to a JSON or JSONL file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    format: OutputFormat,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExampleSink for JsonFileSink {
    fn write_examples(&mut self, examples: &[ExampleRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SerializerError::io(parent, e))?;
        }

        let file = File::create(&self.path).map_err(|e| SerializerError::io(&self.path, e))?;
        let mut writer = BufWriter::new(file);

        match self.format {
            OutputFormat::Json => serde_json::to_writer_pretty(&mut writer, examples)?,
            OutputFormat::Jsonl => {
                for example in examples {
                    let json_line = serde_json::to_string(example)?;
                    writeln!(writer, "{}", json_line)
                        .map_err(|e| SerializerError::io(&self.path, e))?;
                }
            }
        }

        writer.flush().map_err(|e| SerializerError::io(&self.path, e))
    }
}

/// Load conversations from `source`, turn them into examples and hand the
/// examples to `sink`.
pub fn run_pipeline<S, K, T>(
    source: &S,
    sink: &mut K,
    tokenizer: T,
    config: &PipelineConfig,
) -> Result<PipelineResult>
where
    S: ConversationSource + ?Sized,
    K: ExampleSink + ?Sized,
    T: Tokenizer + Sync,
{
    let conversations = source.load_conversations()?;
    tracing::info!(conversations = conversations.len(), "loaded corpus");

    let mut result = PipelineResult {
        total_conversations: conversations.len(),
        ..Default::default()
    };
    for turn in conversations.iter().flat_map(|c| c.turns.iter()) {
        result.total_turns += 1;
        match turn.role() {
            SpeakerRole::Justice => result.justice_turns += 1,
            SpeakerRole::Advocate => result.advocate_turns += 1,
            SpeakerRole::Other => result.unmapped_turns += 1,
        }
    }

    let emitter = ExampleEmitter::new(tokenizer, config.max_tokens)
        .with_developer_prompt(config.developer_prompt.clone());
    let examples = if config.parallel {
        emitter.emit_all_parallel(&conversations)
    } else {
        emitter.emit_all(&conversations)
    };
    result.total_examples = examples.len();

    tracing::info!(
        examples = result.total_examples,
        justice_turns = result.justice_turns,
        unmapped_turns = result.unmapped_turns,
        "generated examples"
    );

    sink.write_examples(&examples)?;
    Ok(result)
}
