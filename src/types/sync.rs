use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reconciliation state of an agenda's mirrored calendar event.
///
/// Every attempt starts by moving to `Pending`; an attempt then settles in
/// exactly one of the other states. Failure detail (message, timestamp) is
/// kept on the agenda, not in the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
    AuthError,
    RateLimited,
    Deleted,
    DeleteFailed,
}

impl SyncStatus {
    /// States the retry sweep picks up.
    pub const RETRYABLE: [SyncStatus; 4] = [
        SyncStatus::Failed,
        SyncStatus::AuthError,
        SyncStatus::RateLimited,
        SyncStatus::DeleteFailed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Synced => "SYNCED",
            Self::Failed => "FAILED",
            Self::AuthError => "AUTH_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::Deleted => "DELETED",
            Self::DeleteFailed => "DELETE_FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SYNCED" => Some(Self::Synced),
            "FAILED" => Some(Self::Failed),
            "AUTH_ERROR" => Some(Self::AuthError),
            "RATE_LIMITED" => Some(Self::RateLimited),
            "DELETED" => Some(Self::Deleted),
            "DELETE_FAILED" => Some(Self::DeleteFailed),
            _ => None,
        }
    }

    /// Transition table: any state may begin a new attempt, and only a
    /// pending attempt may settle.
    #[must_use]
    pub const fn can_transition_to(self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (_, SyncStatus::Pending)
                | (
                    SyncStatus::Pending,
                    SyncStatus::Synced
                        | SyncStatus::Failed
                        | SyncStatus::AuthError
                        | SyncStatus::RateLimited
                        | SyncStatus::Deleted
                        | SyncStatus::DeleteFailed
                )
        )
    }

    pub fn transition(self, next: SyncStatus) -> Result<SyncStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Classifies a failed create/update by the provider's HTTP status.
    #[must_use]
    pub const fn for_failure(status: Option<u16>) -> SyncStatus {
        match status {
            Some(401 | 403) => SyncStatus::AuthError,
            Some(429) => SyncStatus::RateLimited,
            _ => SyncStatus::Failed,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded in the sync log for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncLogStatus {
    Success,
    Failed,
    NotFound,
    Skipped,
    AlreadyExists,
    RedirectedToCreate,
}

impl SyncLogStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::Skipped => "SKIPPED",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::RedirectedToCreate => "REDIRECTED_TO_CREATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "NOT_FOUND" => Some(Self::NotFound),
            "SKIPPED" => Some(Self::Skipped),
            "ALREADY_EXISTS" => Some(Self::AlreadyExists),
            "REDIRECTED_TO_CREATE" => Some(Self::RedirectedToCreate),
            _ => None,
        }
    }
}

impl fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation names written to the sync log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOperation {
    Create,
    Update,
    UpdateRecreate,
    Delete,
    DeleteDbUpdate,
    Retry,
    AddToGroup,
    BatchAddToGroup,
    RemoveFromGroup,
    RetryAddToGroup,
    CheckMembership,
}

impl SyncOperation {
    /// Group operations whose failures the invite sweep re-attempts.
    pub const GROUP_ADDS: [SyncOperation; 2] =
        [SyncOperation::AddToGroup, SyncOperation::BatchAddToGroup];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateRecreate => "update-recreate",
            Self::Delete => "delete",
            Self::DeleteDbUpdate => "delete-db-update",
            Self::Retry => "retry",
            Self::AddToGroup => "add-to-group",
            Self::BatchAddToGroup => "batch-add-to-group",
            Self::RemoveFromGroup => "remove-from-group",
            Self::RetryAddToGroup => "retry-add-to-group",
            Self::CheckMembership => "check-membership",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "update-recreate" => Some(Self::UpdateRecreate),
            "delete" => Some(Self::Delete),
            "delete-db-update" => Some(Self::DeleteDbUpdate),
            "retry" => Some(Self::Retry),
            "add-to-group" => Some(Self::AddToGroup),
            "batch-add-to-group" => Some(Self::BatchAddToGroup),
            "remove-from-group" => Some(Self::RemoveFromGroup),
            "retry-add-to-group" => Some(Self::RetryAddToGroup),
            "check-membership" => Some(Self::CheckMembership),
            _ => None,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
