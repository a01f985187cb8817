use serde::{Deserialize, Serialize};
use std::fmt;

/// Run/batch status values exposed to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// No status has been recorded yet
    #[default]
    NotStarted,
    /// A worker accepted the run/batch
    Started,
    /// Work is under way
    InProgress,
    /// Finished without failures
    Completed,
    /// Finished, some paths failed
    CompletedWithError,
    /// Stopped by an error that prevented finishing
    Failed,
}

impl RunState {
    pub const ALL: [RunState; 6] = [
        Self::NotStarted,
        Self::Started,
        Self::InProgress,
        Self::Completed,
        Self::CompletedWithError,
        Self::Failed,
    ];

    /// Started or in progress
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Started | Self::InProgress)
    }

    /// Terminal: no further progress will be reported
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithError | Self::Failed
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::Started => write!(f, "STARTED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::CompletedWithError => write!(f, "COMPLETED_WITH_ERROR"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "STARTED" => Ok(Self::Started),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "COMPLETED_WITH_ERROR" => Ok(Self::CompletedWithError),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid run state: {s}")),
        }
    }
}
