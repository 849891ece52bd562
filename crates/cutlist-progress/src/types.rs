//! Record shapes for batch ingestion progress
//!
//! A [`Snapshot`] is the whole state of one session. It serializes with
//! camelCase field names so a polling endpoint can return it as-is.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Whole-session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Processing,
    Complete,
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Processing => "processing",
            SessionStatus::Complete => "complete",
            SessionStatus::Error => "error",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Processing)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Complete,
    Error,
    Cancelled,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Complete => "complete",
            FileStatus::Error => "error",
            FileStatus::Cancelled => "cancelled",
        }
    }

    /// Complete, error and cancelled files never change status again in a
    /// well-behaved pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::Complete | FileStatus::Error | FileStatus::Cancelled
        )
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step within one file's extraction pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Queued,
    Uploading,
    Detecting,
    Ocr,
    Parsing,
    Validating,
    Done,
}

impl FileStage {
    /// Stages in pipeline order.
    pub const ALL: [FileStage; 7] = [
        FileStage::Queued,
        FileStage::Uploading,
        FileStage::Detecting,
        FileStage::Ocr,
        FileStage::Parsing,
        FileStage::Validating,
        FileStage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStage::Queued => "queued",
            FileStage::Uploading => "uploading",
            FileStage::Detecting => "detecting",
            FileStage::Ocr => "ocr",
            FileStage::Parsing => "parsing",
            FileStage::Validating => "validating",
            FileStage::Done => "done",
        }
    }
}

impl std::fmt::Display for FileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a single file. `file_index` is fixed at session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProgress {
    pub file_index: usize,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    pub status: FileStatus,
    pub stage: FileStage,
    /// 0 to 100
    pub progress: u8,
    pub items_found: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<EpochMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<EpochMillis>,
    /// Present iff `status` is `Error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// 0.0 to 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

/// Statistics derived from the file records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub cancelled_files: usize,
    /// Rounded mean of per-file progress, 0 to 100
    pub overall_progress: u8,
    pub total_items_found: u64,
    pub started_at: EpochMillis,
    pub last_update_at: EpochMillis,
    /// Linear-extrapolation estimate, not a deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f64>,
}

impl OverallStats {
    /// Files in a terminal status.
    pub fn finished_files(&self) -> usize {
        self.processed_files + self.failed_files + self.cancelled_files
    }
}

/// Complete state of one ingestion session.
///
/// Never mutated in place once shared: every operation in this crate takes a
/// snapshot by reference and returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub message: String,
    pub files: Vec<FileProgress>,
    pub overall: OverallStats,
    pub cancel_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Snapshot {
    /// Resolve a file reference to its position in `files`.
    ///
    /// Names match exactly; the first match wins.
    pub fn find_file(&self, file: &FileRef) -> Option<usize> {
        match file {
            FileRef::Index(index) => (*index < self.files.len()).then_some(*index),
            FileRef::Name(name) => self.files.iter().position(|f| &f.file_name == name),
        }
    }

    pub fn file(&self, file: impl Into<FileRef>) -> Option<&FileProgress> {
        self.find_file(&file.into()).map(|i| &self.files[i])
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One file submitted to a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl FileInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    pub fn with_size(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
        }
    }
}

/// Ownership tags carried on a session for the caller's access checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
}

/// Addresses a file by position or by exact name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    Index(usize),
    Name(String),
}

impl From<usize> for FileRef {
    fn from(index: usize) -> Self {
        FileRef::Index(index)
    }
}

impl From<&str> for FileRef {
    fn from(name: &str) -> Self {
        FileRef::Name(name.to_string())
    }
}

impl From<String> for FileRef {
    fn from(name: String) -> Self {
        FileRef::Name(name)
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRef::Index(index) => write!(f, "#{}", index),
            FileRef::Name(name) => f.write_str(name),
        }
    }
}

/// Partial update merged onto a [`FileProgress`].
///
/// `Some` fields overwrite; `None` fields keep the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdate {
    pub status: Option<FileStatus>,
    pub stage: Option<FileStage>,
    pub progress: Option<u8>,
    pub items_found: Option<u32>,
    pub started_at: Option<EpochMillis>,
    pub finished_at: Option<EpochMillis>,
    pub error_message: Option<String>,
    pub confidence: Option<f64>,
    pub template_detected: Option<bool>,
    pub template_id: Option<String>,
}

/// Optional recognition results reported when a file completes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionDetails {
    pub confidence: Option<f64>,
    pub template_detected: Option<bool>,
    pub template_id: Option<String>,
}

impl CompletionDetails {
    pub fn with_confidence(confidence: f64) -> Self {
        Self {
            confidence: Some(confidence),
            ..Self::default()
        }
    }
}
