//! Corpus model and conversation sources.
//!
//! The pipeline consumes conversations through the [`ConversationSource`]
//! trait. [`ConvoKitCorpus`] reads a ConvoKit corpus directory from disk and
//! [`InMemoryCorpus`] wraps conversations built in code.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::conversation::Role;
use crate::error::{Result, SerializerError};

/// Per-conversation metadata map (title, petitioner, win_side, ...).
pub type Metadata = Map<String, Value>;

const UTTERANCES_FILE: &str = "utterances.jsonl";
const CONVERSATIONS_FILE: &str = "conversations.json";
const SPEAKERS_FILE: &str = "speakers.json";

/// Role classifier of a speaker in an oral argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    /// Asks the questions; every Justice turn becomes a prediction target.
    Justice,
    /// Answers the questions.
    Advocate,
    /// Anyone else. Contributes nothing to the dialogue context.
    Other,
}

impl SpeakerRole {
    /// Map a ConvoKit speaker `type` code (`"J"`, `"A"`) to a role.
    pub fn from_type_code(code: Option<&str>) -> Self {
        match code {
            Some("J") => SpeakerRole::Justice,
            Some("A") => SpeakerRole::Advocate,
            _ => SpeakerRole::Other,
        }
    }

    /// Message role a turn by this speaker takes in the running context.
    ///
    /// Returns `None` for speakers whose turns are dropped from the context.
    pub fn message_role(self) -> Option<Role> {
        match self {
            SpeakerRole::Justice => Some(Role::User),
            SpeakerRole::Advocate => Some(Role::Assistant),
            SpeakerRole::Other => None,
        }
    }

    /// Whether turns by this speaker are emitted as examples.
    pub fn is_target(self) -> bool {
        self == SpeakerRole::Justice
    }
}

/// A speaker identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    pub id: String,
    pub role: SpeakerRole,
}

impl Speaker {
    pub fn new(id: impl Into<String>, role: SpeakerRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// A single utterance within a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: String,
    pub speaker: Speaker,
    pub text: String,
    /// Ordering key. `None` sorts as 0.
    pub timestamp: Option<f64>,
}

impl Turn {
    pub fn new(
        id: impl Into<String>,
        speaker: Speaker,
        text: impl Into<String>,
        timestamp: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            speaker,
            text: text.into(),
            timestamp,
        }
    }

    pub fn role(&self) -> SpeakerRole {
        self.speaker.role
    }
}

/// One oral argument session: case metadata plus its turns in collection order.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub meta: Metadata,
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, meta: Metadata) -> Self {
        Self {
            id: id.into(),
            meta,
            turns: Vec::new(),
        }
    }

    pub fn with_turns(mut self, turns: Vec<Turn>) -> Self {
        self.turns = turns;
        self
    }
}

/// Supplies the conversations a pipeline run works on.
pub trait ConversationSource {
    /// Load every conversation, in corpus order.
    fn load_conversations(&self) -> Result<Vec<Conversation>>;
}

/// Conversations held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    conversations: Vec<Conversation>,
}

impl InMemoryCorpus {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self { conversations }
    }
}

impl ConversationSource for InMemoryCorpus {
    fn load_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.conversations.clone())
    }
}

/// A row of `utterances.jsonl`.
#[derive(Debug, Deserialize)]
struct UtteranceRow {
    id: String,
    #[serde(default)]
    conversation_id: Option<String>,
    speaker: String,
    text: String,
    #[serde(default)]
    timestamp: Option<f64>,
}

/// A ConvoKit corpus directory (`conversations.json`, `speakers.json`,
/// `utterances.jsonl`).
#[derive(Debug, Clone)]
pub struct ConvoKitCorpus {
    dir: PathBuf,
}

impl ConvoKitCorpus {
    /// Use `dir` as the corpus directory.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Search `root` for a corpus directory.
    pub fn discover(root: &Path) -> Result<Self> {
        discover_corpus_dir(root).map(Self::open)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_object_file(&self, name: &str) -> Result<IndexMap<String, Metadata>> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(SerializerError::MissingCorpusFile(path));
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| SerializerError::io(&path, e))?;
        let parsed: IndexMap<String, Value> =
            serde_json::from_str(&raw).map_err(|source| SerializerError::Json {
                path: path.clone(),
                source,
            })?;
        Ok(parsed
            .into_iter()
            .map(|(id, value)| (id, unwrap_meta(value)))
            .collect())
    }
}

/// Entries are either the metadata object itself or `{"meta": {...}, "vectors": [...]}`.
fn unwrap_meta(value: Value) -> Metadata {
    match value {
        Value::Object(mut obj) => match obj.remove("meta") {
            Some(Value::Object(meta)) => meta,
            Some(other) => {
                obj.insert("meta".to_string(), other);
                obj
            }
            None => obj,
        },
        _ => Metadata::new(),
    }
}

impl ConversationSource for ConvoKitCorpus {
    fn load_conversations(&self) -> Result<Vec<Conversation>> {
        let utterances_path = self.dir.join(UTTERANCES_FILE);
        if !utterances_path.exists() {
            return Err(SerializerError::MissingCorpusFile(utterances_path));
        }

        // Without speakers.json no turn can be attributed to a Justice
        let speakers: IndexMap<String, SpeakerRole> = self
            .read_object_file(SPEAKERS_FILE)?
            .into_iter()
            .map(|(id, meta)| {
                let role = SpeakerRole::from_type_code(meta.get("type").and_then(Value::as_str));
                (id, role)
            })
            .collect();

        let conversation_meta = match self.read_object_file(CONVERSATIONS_FILE) {
            Err(SerializerError::MissingCorpusFile(path)) => {
                tracing::warn!(
                    path = ?path,
                    "conversations.json missing, case metadata will be N/A"
                );
                IndexMap::new()
            }
            other => other?,
        };
        let mut conversations: IndexMap<String, Conversation> = conversation_meta
            .into_iter()
            .map(|(id, meta)| (id.clone(), Conversation::new(id, meta)))
            .collect();

        let file = File::open(&utterances_path)
            .map_err(|e| SerializerError::io(&utterances_path, e))?;
        let reader = BufReader::new(file);

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| SerializerError::io(&utterances_path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: UtteranceRow =
                serde_json::from_str(&line).map_err(|source| SerializerError::JsonLine {
                    path: utterances_path.clone(),
                    line: idx + 1,
                    source,
                })?;

            let Some(conversation_id) = row.conversation_id else {
                tracing::warn!(
                    utterance = %row.id,
                    line = idx + 1,
                    "utterance has no conversation_id, skipping"
                );
                continue;
            };

            let role = speakers
                .get(&row.speaker)
                .copied()
                .unwrap_or(SpeakerRole::Other);
            let turn = Turn::new(row.id, Speaker::new(row.speaker, role), row.text, row.timestamp);

            conversations
                .entry(conversation_id.clone())
                .or_insert_with(|| Conversation::new(conversation_id, Metadata::new()))
                .turns
                .push(turn);
        }

        tracing::debug!(
            dir = ?self.dir,
            conversations = conversations.len(),
            speakers = speakers.len(),
            "loaded ConvoKit corpus"
        );

        Ok(conversations.into_values().collect())
    }
}

/// Find the corpus directory under `root`.
///
/// Returns `root` itself if it holds `utterances.jsonl`, otherwise the
/// lexicographically first nested directory that does.
pub fn discover_corpus_dir(root: &Path) -> Result<PathBuf> {
    if root.join(UTTERANCES_FILE).is_file() {
        return Ok(root.to_path_buf());
    }
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == UTTERANCES_FILE)
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs.into_iter()
        .next()
        .ok_or_else(|| SerializerError::CorpusNotFound(root.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_corpus(dir: &Path) {
        std::fs::write(
            dir.join(CONVERSATIONS_FILE),
            r#"{
                "case_b": {"title": "B v. C", "win_side": 2},
                "case_a": {"meta": {"title": "A v. D", "win_side": 1}, "vectors": []}
            }"#,
        )
        .unwrap();
        std::fs::write(
            dir.join(SPEAKERS_FILE),
            r#"{"j__roberts": {"type": "J"}, "advocate_1": {"type": "A"}, "clerk": {}}"#,
        )
        .unwrap();
        let lines = [
            r#"{"id": "u1", "conversation_id": "case_a", "speaker": "j__roberts", "text": "First question", "timestamp": 10}"#,
            r#"{"id": "u2", "conversation_id": "case_a", "speaker": "advocate_1", "text": "An answer", "timestamp": 20.5}"#,
            "",
            r#"{"id": "u3", "conversation_id": "case_b", "speaker": "clerk", "text": "All rise", "timestamp": null}"#,
            r#"{"id": "u4", "conversation_id": "case_z", "speaker": "stranger", "text": "Hello"}"#,
            r#"{"id": "u5", "speaker": "j__roberts", "text": "Orphan"}"#,
        ];
        std::fs::write(dir.join(UTTERANCES_FILE), lines.join("\n")).unwrap();
    }

    #[test]
    fn test_speaker_role_mapping() {
        assert_eq!(SpeakerRole::from_type_code(Some("J")), SpeakerRole::Justice);
        assert_eq!(SpeakerRole::from_type_code(Some("A")), SpeakerRole::Advocate);
        assert_eq!(SpeakerRole::from_type_code(Some("j")), SpeakerRole::Other);
        assert_eq!(SpeakerRole::from_type_code(None), SpeakerRole::Other);

        assert_eq!(SpeakerRole::Justice.message_role(), Some(Role::User));
        assert_eq!(SpeakerRole::Advocate.message_role(), Some(Role::Assistant));
        assert_eq!(SpeakerRole::Other.message_role(), None);
        assert!(SpeakerRole::Justice.is_target());
        assert!(!SpeakerRole::Advocate.is_target());
    }

    #[test]
    fn test_load_convokit_corpus() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());

        let conversations = ConvoKitCorpus::open(temp.path()).load_conversations().unwrap();
        let ids: Vec<&str> = conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["case_b", "case_a", "case_z"]);

        let case_a = &conversations[1];
        assert_eq!(case_a.meta.get("title"), Some(&Value::from("A v. D")));
        assert_eq!(case_a.turns.len(), 2);
        assert_eq!(case_a.turns[0].role(), SpeakerRole::Justice);
        assert_eq!(case_a.turns[0].timestamp, Some(10.0));
        assert_eq!(case_a.turns[1].role(), SpeakerRole::Advocate);
        assert_eq!(case_a.turns[1].timestamp, Some(20.5));

        let case_b = &conversations[0];
        assert_eq!(case_b.turns[0].role(), SpeakerRole::Other);
        assert_eq!(case_b.turns[0].timestamp, None);

        let case_z = &conversations[2];
        assert!(case_z.meta.is_empty());
        assert_eq!(case_z.turns[0].role(), SpeakerRole::Other);
    }

    #[test]
    fn test_missing_utterances_file() {
        let temp = TempDir::new().unwrap();
        let err = ConvoKitCorpus::open(temp.path()).load_conversations().unwrap_err();
        assert!(matches!(err, SerializerError::MissingCorpusFile(_)));
    }

    #[test]
    fn test_missing_speakers_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());
        std::fs::remove_file(temp.path().join(SPEAKERS_FILE)).unwrap();

        let err = ConvoKitCorpus::open(temp.path()).load_conversations().unwrap_err();
        match err {
            SerializerError::MissingCorpusFile(path) => assert!(path.ends_with(SPEAKERS_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_conversations_file_leaves_metadata_empty() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());
        std::fs::remove_file(temp.path().join(CONVERSATIONS_FILE)).unwrap();

        let conversations = ConvoKitCorpus::open(temp.path()).load_conversations().unwrap();
        let ids: Vec<&str> = conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["case_a", "case_b", "case_z"]);
        assert!(conversations.iter().all(|c| c.meta.is_empty()));
        assert_eq!(conversations[0].turns[0].role(), SpeakerRole::Justice);
    }

    #[test]
    fn test_utterance_without_text_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SPEAKERS_FILE), "{}").unwrap();
        std::fs::write(
            temp.path().join(UTTERANCES_FILE),
            r#"{"id": "u1", "conversation_id": "c", "speaker": "s"}"#,
        )
        .unwrap();
        let err = ConvoKitCorpus::open(temp.path()).load_conversations().unwrap_err();
        assert!(matches!(err, SerializerError::JsonLine { line: 1, .. }));
    }

    #[test]
    fn test_discover_corpus_dir() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("downloads/supreme-corpus");
        std::fs::create_dir_all(&nested).unwrap();
        write_corpus(&nested);

        assert_eq!(discover_corpus_dir(temp.path()).unwrap(), nested);
        assert_eq!(discover_corpus_dir(&nested).unwrap(), nested);

        let empty = TempDir::new().unwrap();
        assert!(matches!(
            discover_corpus_dir(empty.path()),
            Err(SerializerError::CorpusNotFound(_))
        ));
    }
}
