//! Observable scanner state.

use serde::{Deserialize, Serialize};

use crate::capture::resolution::PLACEHOLDER_LABEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    Idle,
    Requesting,
    Active,
    Found,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "Idle",
            ScanState::Requesting => "Requesting",
            ScanState::Active => "Active",
            ScanState::Found => "Found",
        }
    }
}

/// Tone of a status line or banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateSource {
    StructuredDecode,
    TextRecognition,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub code: String,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn new(code: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            code: code.into(),
            source,
        }
    }
}

/// Whether the last accepted code was already on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FoundOutcome {
    New,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub state: ScanState,
    pub status_message: Option<String>,
    pub status_kind: StatusKind,
    pub banner_message: Option<String>,
    pub banner_kind: StatusKind,
    pub resolution_label: String,
    pub last_candidate: Option<Candidate>,
    pub outcome: Option<FoundOutcome>,
    pub total_count: u64,
}

impl Default for ScanSnapshot {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            status_message: None,
            status_kind: StatusKind::Info,
            banner_message: None,
            banner_kind: StatusKind::Info,
            resolution_label: PLACEHOLDER_LABEL.to_string(),
            last_candidate: None,
            outcome: None,
            total_count: 0,
        }
    }
}

impl ScanSnapshot {
    pub fn set_status(&mut self, message: impl Into<String>, kind: StatusKind) {
        self.status_message = Some(message.into());
        self.status_kind = kind;
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
        self.status_kind = StatusKind::Info;
    }

    pub fn set_banner(&mut self, message: impl Into<String>, kind: StatusKind) {
        self.banner_message = Some(message.into());
        self.banner_kind = kind;
    }

    pub fn clear_banner(&mut self) {
        self.banner_message = None;
        self.banner_kind = StatusKind::Info;
    }

    /// Drops everything tied to the previous attempt.
    pub fn clear_attempt(&mut self) {
        self.clear_status();
        self.clear_banner();
        self.last_candidate = None;
        self.outcome = None;
    }
}
