//! Notification data model.
//!
//! A [`Notification`] describes one change observed somewhere in the content
//! pipeline or the script-execution subsystem. Content changes travel in the
//! compact pipe-delimited wire format (see [`crate::codec`]); job, run,
//! progress, state and error notifications travel as tagged JSON objects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Placeholder used when a publisher does not identify itself.
pub const NO_SENDER: &str = "No Sender Specified";

/// Domain entity a content change refers to.
///
/// The integer codes are part of the wire format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Generic file content
    File,
    /// Image content
    Image,
    /// Line (track) content
    Line,
    /// Link content
    Link,
    /// Map content
    Map,
    /// Note content
    Note,
    /// Photo content
    Photo,
    /// Point content
    Point,
    /// Detail attached to a point
    PointDetail,
    /// Post content
    Post,
    /// GeoJSON content
    GeoJson,
    /// Site generation log stream
    GenerationLog,
    /// File transfer script log stream
    FileTransferScriptLog,
    /// Anything the producer could not classify
    Unknown,
}

impl ContentKind {
    /// Every kind, in wire-code order.
    pub const ALL: [ContentKind; 14] = [
        Self::File,
        Self::Image,
        Self::Line,
        Self::Link,
        Self::Map,
        Self::Note,
        Self::Photo,
        Self::Point,
        Self::PointDetail,
        Self::Post,
        Self::GeoJson,
        Self::GenerationLog,
        Self::FileTransferScriptLog,
        Self::Unknown,
    ];

    /// Wire code for this kind.
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Kind for a wire code. Codes outside the table map to [`ContentKind::Unknown`]
    /// so that newer publishers do not break older subscribers.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(Self::Unknown)
    }

    /// Map a producer-side tag onto the closed enumeration.
    ///
    /// Tags are matched case-insensitively; `_` and `-` are interchangeable.
    #[must_use]
    pub fn from_producer_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "file" => Self::File,
            "image" => Self::Image,
            "line" => Self::Line,
            "link" => Self::Link,
            "map" => Self::Map,
            "note" => Self::Note,
            "photo" => Self::Photo,
            "point" => Self::Point,
            "point-detail" => Self::PointDetail,
            "post" => Self::Post,
            "geojson" | "geo-json" => Self::GeoJson,
            "generation-log" => Self::GenerationLog,
            "file-transfer-script-log" => Self::FileTransferScriptLog,
            _ => Self::Unknown,
        }
    }

    /// Log-stream kinds carry no content identity.
    #[must_use]
    pub fn is_log_stream(self) -> bool {
        matches!(self, Self::GenerationLog | Self::FileTransferScriptLog)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Image => "image",
            Self::Line => "line",
            Self::Link => "link",
            Self::Map => "map",
            Self::Note => "note",
            Self::Photo => "photo",
            Self::Point => "point",
            Self::PointDetail => "point-detail",
            Self::Post => "post",
            Self::GeoJson => "geojson",
            Self::GenerationLog => "generation-log",
            Self::FileTransferScriptLog => "file-transfer-script-log",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Nature of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Entity was created
    New,
    /// Entity was modified
    Update,
    /// Entity was removed
    Delete,
    /// Only local (non-database) content changed
    LocalContent,
}

impl UpdateKind {
    /// Every kind, in wire-code order.
    pub const ALL: [UpdateKind; 4] = [Self::New, Self::Update, Self::Delete, Self::LocalContent];

    /// Wire code for this kind.
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Kind for a wire code, `None` when the code is not defined.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::LocalContent => write!(f, "local-content"),
        }
    }
}

/// Content entities were created, changed or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChange {
    /// Publisher identification, already cleaned for the wire
    pub sender: String,
    /// Kind of content that changed
    pub content_kind: ContentKind,
    /// Nature of the change
    pub update_kind: UpdateKind,
    /// Affected content ids (unique, unordered)
    pub content_ids: BTreeSet<Uuid>,
}

impl DataChange {
    /// Build a change, cleaning the sender the same way the wire does.
    pub fn new(
        sender: &str,
        content_kind: ContentKind,
        update_kind: UpdateKind,
        content_ids: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        Self {
            sender: clean_sender(sender),
            content_kind,
            update_kind,
            content_ids: content_ids.into_iter().collect(),
        }
    }

    /// Whether this change mentions `id`.
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.content_ids.contains(id)
    }

    /// Check the content identity invariant: only log streams may omit ids.
    pub fn validate(&self) -> crate::Result<()> {
        if self.content_ids.is_empty() && !self.content_kind.is_log_stream() {
            return Err(crate::Error::InvalidNotification(format!(
                "{} change for {} content carries no content ids",
                self.update_kind, self.content_kind
            )));
        }
        Ok(())
    }
}

/// A scheduled job definition changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChange {
    /// Database the job lives in
    pub database_id: Uuid,
    /// Job identifier
    pub job_id: Uuid,
    /// Nature of the change
    pub update_kind: UpdateKind,
}

/// A job run was created, changed or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunChange {
    /// Database the run lives in
    pub database_id: Uuid,
    /// Owning job
    pub job_id: Uuid,
    /// Run identifier
    pub run_id: Uuid,
    /// Nature of the change
    pub update_kind: UpdateKind,
}

/// Free-text progress from a running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Database the run lives in
    pub database_id: Uuid,
    /// Owning job
    pub job_id: Uuid,
    /// Run identifier
    pub run_id: Uuid,
    /// Publisher identification
    pub sender: String,
    /// Progress text
    pub message: String,
}

/// A running job moved to another pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Database the run lives in
    pub database_id: Uuid,
    /// Owning job
    pub job_id: Uuid,
    /// Run identifier
    pub run_id: Uuid,
    /// Publisher identification
    pub sender: String,
    /// Human-readable description of the transition
    pub message: String,
    /// New pipeline state as reported by the runner
    pub pipeline_state: String,
}

/// Something went wrong somewhere on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error description
    pub message: String,
}

/// Every notification that can travel on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Content change
    DataChange(DataChange),
    /// Job definition change
    JobChange(JobChange),
    /// Job run change
    RunChange(RunChange),
    /// Job run progress
    Progress(Progress),
    /// Job run state transition
    StateChange(StateChange),
    /// Error report
    Error(ErrorReport),
}

/// Variant tag of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// [`Notification::DataChange`]
    DataChange,
    /// [`Notification::JobChange`]
    JobChange,
    /// [`Notification::RunChange`]
    RunChange,
    /// [`Notification::Progress`]
    Progress,
    /// [`Notification::StateChange`]
    StateChange,
    /// [`Notification::Error`]
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DataChange => "data_change",
            Self::JobChange => "job_change",
            Self::RunChange => "run_change",
            Self::Progress => "progress",
            Self::StateChange => "state_change",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

impl Notification {
    /// Variant tag.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::DataChange(_) => NotificationKind::DataChange,
            Self::JobChange(_) => NotificationKind::JobChange,
            Self::RunChange(_) => NotificationKind::RunChange,
            Self::Progress(_) => NotificationKind::Progress,
            Self::StateChange(_) => NotificationKind::StateChange,
            Self::Error(_) => NotificationKind::Error,
        }
    }

    /// Publisher identification, for variants that carry one.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::DataChange(n) => Some(&n.sender),
            Self::Progress(n) => Some(&n.sender),
            Self::StateChange(n) => Some(&n.sender),
            Self::JobChange(_) | Self::RunChange(_) | Self::Error(_) => None,
        }
    }

    /// Database id, for job-related variants.
    #[must_use]
    pub fn database_id(&self) -> Option<Uuid> {
        match self {
            Self::JobChange(n) => Some(n.database_id),
            Self::RunChange(n) => Some(n.database_id),
            Self::Progress(n) => Some(n.database_id),
            Self::StateChange(n) => Some(n.database_id),
            Self::DataChange(_) | Self::Error(_) => None,
        }
    }

    /// Job id, for job-related variants.
    #[must_use]
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::JobChange(n) => Some(n.job_id),
            Self::RunChange(n) => Some(n.job_id),
            Self::Progress(n) => Some(n.job_id),
            Self::StateChange(n) => Some(n.job_id),
            Self::DataChange(_) | Self::Error(_) => None,
        }
    }

    /// Run id, for run-related variants.
    #[must_use]
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Self::RunChange(n) => Some(n.run_id),
            Self::Progress(n) => Some(n.run_id),
            Self::StateChange(n) => Some(n.run_id),
            Self::DataChange(_) | Self::JobChange(_) | Self::Error(_) => None,
        }
    }
}

impl From<DataChange> for Notification {
    fn from(n: DataChange) -> Self {
        Self::DataChange(n)
    }
}

impl From<JobChange> for Notification {
    fn from(n: JobChange) -> Self {
        Self::JobChange(n)
    }
}

impl From<RunChange> for Notification {
    fn from(n: RunChange) -> Self {
        Self::RunChange(n)
    }
}

impl From<Progress> for Notification {
    fn from(n: Progress) -> Self {
        Self::Progress(n)
    }
}

impl From<StateChange> for Notification {
    fn from(n: StateChange) -> Self {
        Self::StateChange(n)
    }
}

impl From<ErrorReport> for Notification {
    fn from(n: ErrorReport) -> Self {
        Self::Error(n)
    }
}

/// Clean a sender for the wire: `|` becomes a space, blank becomes [`NO_SENDER`].
#[must_use]
pub fn clean_sender(sender: &str) -> String {
    let cleaned = sender.replace('|', " ");
    if cleaned.trim().is_empty() {
        return NO_SENDER.to_string();
    }
    cleaned
}
