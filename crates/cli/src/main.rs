//! CLI tool for serializing oral argument transcripts.
//!
//! This tool reads a ConvoKit Supreme Court corpus directory and writes one
//! fine-tuning example per Justice utterance, using the word-count token
//! approximation to bound each prompt's dialogue history.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use oral_argument_serializer_core::{
    run_pipeline, ConvoKitCorpus, JsonFileSink, OutputFormat, PipelineConfig, PipelineResult,
    WhitespaceTokenizer, DEFAULT_DEVELOPER_PROMPT,
};

/// Serialize oral argument transcripts into Justice-question training examples.
#[derive(Parser, Debug)]
#[command(name = "oral-argument-serialize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Corpus directory, or a directory to search for one
    #[arg(long)]
    corpus_root: PathBuf,

    /// Output file for the examples
    #[arg(long, default_value = "supreme_court_targeted_examples_enriched.json")]
    output: PathBuf,

    /// Output layout
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    format: FormatArg,

    /// Maximum approximate tokens in each example's prompt context
    #[arg(long, default_value = "2000")]
    max_tokens: usize,

    /// Custom developer instruction (optional)
    #[arg(long)]
    developer_prompt: Option<String>,

    /// Process conversations in parallel
    #[arg(long)]
    parallel: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

fn metadata_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "examples".to_string());
    output.with_file_name(format!("{}.metadata.json", stem))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Locating corpus under {:?}...", args.corpus_root);
    let corpus = ConvoKitCorpus::discover(&args.corpus_root)?;
    info!("Loading corpus from {:?}...", corpus.dir());

    let config = PipelineConfig {
        max_tokens: args.max_tokens,
        developer_prompt: args
            .developer_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVELOPER_PROMPT.to_string()),
        parallel: args.parallel,
    };

    let mut sink = JsonFileSink::new(&args.output, args.format.into());
    info!("Transforming conversations into targeted examples...");
    let result: PipelineResult = run_pipeline(&corpus, &mut sink, WhitespaceTokenizer, &config)?;
    info!("Saved {} examples to {:?}", result.total_examples, sink.path());

    let metadata_path = metadata_path(&args.output);
    let metadata = serde_json::json!({
        "config": {
            "corpus_dir": corpus.dir().to_string_lossy(),
            "output": args.output.to_string_lossy(),
            "format": format!("{:?}", args.format).to_lowercase(),
            "max_tokens": args.max_tokens,
            "custom_developer_prompt": args.developer_prompt.is_some(),
            "parallel": args.parallel,
        },
        "counts": result,
        "stats": {
            "avg_examples_per_conversation": if result.total_conversations > 0 {
                result.total_examples as f64 / result.total_conversations as f64
            } else {
                0.0
            },
        },
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    info!("[summary]");
    info!("  Conversations processed: {}", result.total_conversations);
    info!(
        "  Turns: {} (justice {}, advocate {}, unmapped {})",
        result.total_turns,
        result.justice_turns,
        result.advocate_turns,
        result.unmapped_turns
    );
    info!("  Examples: {}", result.total_examples);
    info!("  Output: {:?}", args.output);
    info!("  Metadata: {:?}", metadata_path);

    Ok(())
}
