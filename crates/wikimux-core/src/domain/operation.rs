//! Operation classification for cross-server policy.
//!
//! Classification is a substring heuristic over operation *names*, not a
//! registry of true semantics: an operation named "update_status_display"
//! that only reads will still classify as Update. The pattern table lives
//! here, in one place, so the rules stay auditable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse mode assigned to an operation for policy purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Read,
    Create,
    Update,
    Delete,
}

/// Direction of a cross-server operation relative to this adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Name-substring classification table. First match wins.
pub const MODE_PATTERNS: &[(&str, OperationMode)] = &[
    ("delete", OperationMode::Delete),
    ("remove", OperationMode::Delete),
    ("destroy", OperationMode::Delete),
    ("update", OperationMode::Update),
    ("edit", OperationMode::Update),
    ("modify", OperationMode::Update),
    ("patch", OperationMode::Update),
    ("create", OperationMode::Create),
    ("add", OperationMode::Create),
    ("insert", OperationMode::Create),
    ("post", OperationMode::Create),
];

impl OperationMode {
    /// Classify an operation name. Falls back to Read when nothing matches.
    pub fn classify(operation: &str) -> Self {
        let lower = operation.to_ascii_lowercase();
        for (pattern, mode) in MODE_PATTERNS {
            if lower.contains(pattern) {
                return *mode;
            }
        }
        OperationMode::Read
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatched cross-server operation, kept for rate accounting.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub source: String,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied context for boundary validation and recording.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    /// Who is issuing the operation (e.g. "confluence", "jira-bridge")
    pub source: String,

    /// Number of items the operation touches, when it is a batch
    pub batch_size: Option<u32>,
}

impl OperationContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            batch_size: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}
