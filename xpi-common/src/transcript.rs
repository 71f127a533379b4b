//! Interview transcript model
//!
//! A transcript arrives either as free-form text or as a list of chat
//! messages. It is classified once, when the answer is recorded, and stored
//! with its kind so downstream readers never re-sniff the shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Role assigned to plain-text lines without a `role: ` prefix
pub const DEFAULT_ROLE: &str = "system";

/// One chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Stored transcript discriminator (`transcript_kind` column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptKind {
    Plain,
    Structured,
}

impl TranscriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptKind::Plain => "plain",
            TranscriptKind::Structured => "structured",
        }
    }
}

impl fmt::Display for TranscriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(TranscriptKind::Plain),
            "structured" => Ok(TranscriptKind::Structured),
            other => Err(Error::Internal(format!("Unknown transcript kind: {}", other))),
        }
    }
}

/// Expert transcript for one interview step
///
/// Serializes untagged: a string for plain text, an array for messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Transcript {
    /// Line-delimited `role: content` text (unlabeled lines allowed)
    PlainText(String),
    /// Explicit message list
    Structured(Vec<Message>),
}

/// Transcript as accepted on the wire: a string or a message array
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TranscriptInput {
    Messages(Vec<Message>),
    Text(String),
}

impl From<TranscriptInput> for Transcript {
    fn from(input: TranscriptInput) -> Self {
        match input {
            TranscriptInput::Messages(messages) => Transcript::Structured(messages),
            TranscriptInput::Text(text) => Transcript::classify(&text),
        }
    }
}

impl Transcript {
    /// Classify raw text: a JSON message list becomes `Structured`,
    /// anything else is kept as `PlainText`
    pub fn classify(raw: &str) -> Self {
        match serde_json::from_str::<Vec<Message>>(raw) {
            Ok(messages) => Transcript::Structured(messages),
            Err(_) => Transcript::PlainText(raw.to_string()),
        }
    }

    pub fn kind(&self) -> TranscriptKind {
        match self {
            Transcript::PlainText(_) => TranscriptKind::Plain,
            Transcript::Structured(_) => TranscriptKind::Structured,
        }
    }

    /// Serialize for storage as (kind, body)
    pub fn to_stored(&self) -> Result<(TranscriptKind, String)> {
        let body = match self {
            Transcript::PlainText(text) => text.clone(),
            Transcript::Structured(messages) => serde_json::to_string(messages)?,
        };
        Ok((self.kind(), body))
    }

    /// Rebuild from the stored (kind, body) pair
    pub fn from_stored(kind: TranscriptKind, body: String) -> Result<Self> {
        match kind {
            TranscriptKind::Plain => Ok(Transcript::PlainText(body)),
            TranscriptKind::Structured => {
                let messages = serde_json::from_str(&body).map_err(|e| {
                    Error::Internal(format!("Stored structured transcript is not a message list: {}", e))
                })?;
                Ok(Transcript::Structured(messages))
            }
        }
    }

    /// Normalize to a message list
    pub fn messages(&self) -> Vec<Message> {
        match self {
            Transcript::Structured(messages) => messages.clone(),
            Transcript::PlainText(text) => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| match line.split_once(": ") {
                    Some((role, content)) if !role.trim().is_empty() => {
                        Message::new(role.trim(), content.trim())
                    }
                    _ => Message::new(DEFAULT_ROLE, line.trim()),
                })
                .collect(),
        }
    }

    /// Flatten into a single `role: content` conversation string
    pub fn flatten(&self) -> String {
        self.messages()
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
