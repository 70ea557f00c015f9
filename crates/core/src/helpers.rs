//! Helper functions for case summaries, turn ordering and prompt rendering.

use std::fmt;

use serde_json::Value;

use crate::conversation::{Message, Role};
use crate::corpus::{Metadata, Turn};
use crate::HISTORY_HEADER;

/// Placeholder for metadata that is absent.
const NOT_AVAILABLE: &str = "N/A";

/// Side that won the case, decoded from the numeric `win_side` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinningSide {
    Petitioner,
    Respondent,
    Unknown,
}

impl WinningSide {
    /// `1` is the petitioner, `2` the respondent; anything else is unknown.
    pub fn from_code(code: Option<&Value>) -> Self {
        match code.and_then(Value::as_f64) {
            Some(c) if c == 1.0 => WinningSide::Petitioner,
            Some(c) if c == 2.0 => WinningSide::Respondent,
            _ => WinningSide::Unknown,
        }
    }
}

impl fmt::Display for WinningSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WinningSide::Petitioner => "Petitioner",
            WinningSide::Respondent => "Respondent",
            WinningSide::Unknown => NOT_AVAILABLE,
        };
        f.write_str(label)
    }
}

/// Render a metadata value as text, or `"N/A"` if the key is absent.
///
/// A key stored as `null` renders as `"None"`.
pub fn meta_text(meta: &Metadata, key: &str) -> String {
    match meta.get(key) {
        None => NOT_AVAILABLE.to_string(),
        Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Build the case summary that seeds every conversation's context.
pub fn format_case_facts(meta: &Metadata) -> String {
    let title = meta_text(meta, "title");
    let petitioner = meta_text(meta, "petitioner");
    let respondent = meta_text(meta, "respondent");
    let year = meta_text(meta, "year");
    let docket = meta_text(meta, "docket_no");
    let citation = meta_text(meta, "citation");
    let win_side = WinningSide::from_code(meta.get("win_side"));

    format!(
        "Case Information Summary:\n\
         - Case Title: {title}\n\
         - Docket Number: {docket}\n\
         - Year of Argument: {year}\n\
         - Citation: {citation}\n\n\
         Parties:\n\
         - Petitioner (appealing party): {petitioner}\n\
         - Respondent: {respondent}\n\n\
         Known Outcome (for context): The case was ultimately decided in favor of the {win_side}."
    )
}

/// Order turns chronologically.
///
/// Missing timestamps sort as 0. The sort is stable, so turns sharing a
/// timestamp keep their collection order.
pub fn order_turns(turns: &[Turn]) -> Vec<&Turn> {
    let mut ordered: Vec<&Turn> = turns.iter().collect();
    ordered.sort_by(|a, b| {
        a.timestamp
            .unwrap_or(0.0)
            .total_cmp(&b.timestamp.unwrap_or(0.0))
    });
    ordered
}

/// Flatten a context snapshot into the user prompt.
///
/// The first message is the case summary; every later message becomes a
/// `Justice:` line if it is a `user` message and an `Advocate:` line otherwise.
pub fn render_prompt(messages: &[Message]) -> String {
    let Some((summary, history)) = messages.split_first() else {
        return format!("\n\n{}\n", HISTORY_HEADER);
    };

    let dialogue: Vec<String> = history
        .iter()
        .map(|msg| {
            let speaker = if msg.role == Role::User {
                "Justice"
            } else {
                "Advocate"
            };
            format!("{}: {}", speaker, msg.content)
        })
        .collect();

    format!(
        "{}\n\n{}\n{}",
        summary.content,
        HISTORY_HEADER,
        dialogue.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Speaker, SpeakerRole};
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn turn(id: &str, timestamp: Option<f64>) -> Turn {
        Turn::new(id, Speaker::new("s", SpeakerRole::Justice), id, timestamp)
    }

    #[test]
    fn test_winning_side_codes() {
        assert_eq!(WinningSide::from_code(Some(&json!(1))), WinningSide::Petitioner);
        assert_eq!(WinningSide::from_code(Some(&json!(2))), WinningSide::Respondent);
        assert_eq!(WinningSide::from_code(Some(&json!(1.0))), WinningSide::Petitioner);
        assert_eq!(WinningSide::from_code(Some(&json!(3))), WinningSide::Unknown);
        assert_eq!(WinningSide::from_code(Some(&json!("1"))), WinningSide::Unknown);
        assert_eq!(WinningSide::from_code(None), WinningSide::Unknown);
        assert_eq!(WinningSide::Unknown.to_string(), "N/A");
    }

    #[test]
    fn test_meta_text() {
        let m = meta(json!({"title": "X v. Y", "year": 1999, "citation": null}));
        assert_eq!(meta_text(&m, "title"), "X v. Y");
        assert_eq!(meta_text(&m, "year"), "1999");
        assert_eq!(meta_text(&m, "citation"), "None");
        assert_eq!(meta_text(&m, "docket_no"), "N/A");
    }

    #[test]
    fn test_format_case_facts_null_values() {
        let m = meta(json!({"title": "X v. Y", "citation": null, "win_side": null}));
        let facts = format_case_facts(&m);
        assert!(facts.contains("- Case Title: X v. Y\n"));
        assert!(facts.contains("- Citation: None\n"));
        assert!(facts.contains("- Docket Number: N/A\n"));
        assert!(facts.ends_with("decided in favor of the N/A."));
    }

    #[test]
    fn test_format_case_facts_full() {
        let m = meta(json!({
            "title": "Roe v. Wade",
            "petitioner": "Jane Roe",
            "respondent": "Henry Wade",
            "year": 1971,
            "docket_no": "70-18",
            "citation": "410 US 113",
            "win_side": 1
        }));
        let expected = "Case Information Summary:\n\
- Case Title: Roe v. Wade\n\
- Docket Number: 70-18\n\
- Year of Argument: 1971\n\
- Citation: 410 US 113\n\
\n\
Parties:\n\
- Petitioner (appealing party): Jane Roe\n\
- Respondent: Henry Wade\n\
\n\
Known Outcome (for context): The case was ultimately decided in favor of the Petitioner.";
        assert_eq!(format_case_facts(&m), expected);
    }

    #[test]
    fn test_format_case_facts_defaults() {
        let facts = format_case_facts(&Metadata::new());
        assert!(facts.contains("- Case Title: N/A\n"));
        assert!(facts.contains("- Petitioner (appealing party): N/A\n"));
        assert!(facts.ends_with("decided in favor of the N/A."));
    }

    #[test]
    fn test_order_turns_missing_timestamp_first_and_stable() {
        let turns = vec![
            turn("late", Some(30.0)),
            turn("tie_a", Some(10.0)),
            turn("none", None),
            turn("tie_b", Some(10.0)),
            turn("negative", Some(-5.0)),
        ];
        let ids: Vec<&str> = order_turns(&turns).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["negative", "none", "tie_a", "tie_b", "late"]);
        assert_eq!(turns[0].id, "late");
    }

    #[test]
    fn test_render_prompt() {
        let messages = vec![
            Message::system("FACTS"),
            Message::user("Why?"),
            Message::assistant("Because."),
        ];
        assert_eq!(
            render_prompt(&messages),
            "FACTS\n\nOral Argument History:\nJustice: Why?\nAdvocate: Because."
        );
    }

    #[test]
    fn test_render_prompt_without_history() {
        let messages = vec![Message::system("FACTS")];
        assert_eq!(render_prompt(&messages), "FACTS\n\nOral Argument History:\n");
    }
}
