use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::log::SyncLogger;
use super::provider::{GroupDirectory, ProviderError};
use super::retry::{RetryPolicy, with_retry};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{SyncLogStatus, SyncOperation, User};

#[derive(Debug, Clone, Error)]
#[error("{operation} failed for {}: {message}", subject_label(.user_email, .user_id))]
pub struct GroupSyncError {
    pub operation: SyncOperation,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub message: String,
    pub status: Option<u16>,
}

fn subject_label<'a>(email: &'a Option<String>, id: &'a Option<String>) -> &'a str {
    email
        .as_deref()
        .or(id.as_deref())
        .unwrap_or("unknown user")
}

impl GroupSyncError {
    fn missing_email(operation: SyncOperation, user: &User) -> Self {
        Self {
            operation,
            user_id: Some(user.id.clone()),
            user_email: None,
            message: "User has no email".to_string(),
            status: None,
        }
    }

    fn provider(operation: SyncOperation, user: Option<&User>, email: &str, err: &ProviderError) -> Self {
        Self {
            operation,
            user_id: user.map(|u| u.id.clone()),
            user_email: Some(email.to_string()),
            message: err.message.clone(),
            status: err.status,
        }
    }
}

/// Reads the configured group address.
pub fn resolve_group_email(store: &dyn Store) -> Result<String> {
    store
        .get_group_shareable()?
        .map(|g| g.group_email)
        .ok_or_else(|| Error::Config("No Google Group configured".to_string()))
}

/// Rate-limit pacing for batch adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPacing {
    pub batch_size: usize,
    /// Pause between adds inside one chunk.
    pub request_delay: Duration,
    /// Pause between chunks.
    pub batch_delay: Duration,
}

impl Default for GroupPacing {
    fn default() -> Self {
        Self {
            batch_size: 20,
            request_delay: Duration::from_millis(100),
            batch_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMember {
    pub id: String,
    pub email: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAddReport {
    pub success_count: usize,
    pub failed_users: Vec<FailedMember>,
}

/// Keeps the external group's membership in line with the user roster.
pub struct GroupSync {
    store: Arc<dyn Store>,
    directory: Arc<dyn GroupDirectory>,
    log: SyncLogger,
    retry: RetryPolicy,
    pacing: GroupPacing,
}

impl GroupSync {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn GroupDirectory>,
        retry: RetryPolicy,
        pacing: GroupPacing,
    ) -> Self {
        Self {
            log: SyncLogger::new(store.clone()),
            store,
            directory,
            retry,
            pacing,
        }
    }

    fn group_email(&self) -> std::result::Result<String, ProviderError> {
        resolve_group_email(self.store.as_ref()).map_err(ProviderError::from)
    }

    async fn insert(&self, email: &str) -> std::result::Result<(), ProviderError> {
        let group = self.group_email()?;
        with_retry(self.retry, ProviderError::is_transient, || {
            self.directory.insert_member(&group, email)
        })
        .await
    }

    /// Adds the user as a group member. An existing membership counts as
    /// success.
    pub async fn add(&self, user: &User) -> Result<()> {
        let email = user
            .email
            .as_deref()
            .ok_or_else(|| GroupSyncError::missing_email(SyncOperation::AddToGroup, user))?;

        match self.insert(email).await {
            Ok(()) => {
                self.log
                    .record(&user.id, SyncOperation::AddToGroup, SyncLogStatus::Success, None);
                info!(user_id = %user.id, email, "Added user to group");
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                self.log.record(
                    &user.id,
                    SyncOperation::AddToGroup,
                    SyncLogStatus::AlreadyExists,
                    Some("User is already a member"),
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    user_id = %user.id,
                    email,
                    status = ?err.status,
                    "Failed to add user to group: {}",
                    err.message
                );
                self.log.record(
                    &user.id,
                    SyncOperation::AddToGroup,
                    SyncLogStatus::Failed,
                    Some(&err.message),
                );
                Err(GroupSyncError::provider(SyncOperation::AddToGroup, Some(user), email, &err).into())
            }
        }
    }

    /// Removes the user's address from the group. An absent member counts
    /// as success.
    pub async fn remove(&self, user: &User) -> Result<()> {
        let email = user
            .email
            .as_deref()
            .ok_or_else(|| GroupSyncError::missing_email(SyncOperation::RemoveFromGroup, user))?;
        self.remove_address(user, email).await
    }

    /// Like [`GroupSync::remove`] for an address the user no longer carries,
    /// such as the previous email after a change.
    pub async fn remove_address(&self, user: &User, email: &str) -> Result<()> {
        let result = match self.group_email() {
            Ok(group) => {
                with_retry(self.retry, ProviderError::is_transient, || {
                    self.directory.delete_member(&group, email)
                })
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.log.record(
                    &user.id,
                    SyncOperation::RemoveFromGroup,
                    SyncLogStatus::Success,
                    None,
                );
                info!(user_id = %user.id, email, "Removed user from group");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                self.log.record(
                    &user.id,
                    SyncOperation::RemoveFromGroup,
                    SyncLogStatus::NotFound,
                    Some("Member already removed from Google Group"),
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    user_id = %user.id,
                    email,
                    status = ?err.status,
                    "Failed to remove user from group: {}",
                    err.message
                );
                self.log.record(
                    &user.id,
                    SyncOperation::RemoveFromGroup,
                    SyncLogStatus::Failed,
                    Some(&err.message),
                );
                Err(GroupSyncError::provider(
                    SyncOperation::RemoveFromGroup,
                    Some(user),
                    email,
                    &err,
                )
                .into())
            }
        }
    }

    pub async fn is_member(&self, email: &str) -> Result<bool> {
        let result = match self.group_email() {
            Ok(group) => {
                with_retry(self.retry, ProviderError::is_transient, || {
                    self.directory.get_member(&group, email)
                })
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => {
                Err(GroupSyncError::provider(SyncOperation::CheckMembership, None, email, &err).into())
            }
        }
    }

    /// Adds users in paced chunks. Never fails: each user's outcome is
    /// logged and failures are collected in the report.
    pub async fn batch_add(&self, users: &[User]) -> BatchAddReport {
        let mut report = BatchAddReport::default();

        let group = match self.group_email() {
            Ok(group) => group,
            Err(err) => {
                error!("Batch add aborted: {}", err.message);
                for user in users {
                    self.log.record(
                        &user.id,
                        SyncOperation::BatchAddToGroup,
                        SyncLogStatus::Failed,
                        Some(&err.message),
                    );
                    report.failed_users.push(FailedMember {
                        id: user.id.clone(),
                        email: user.email.clone(),
                        error: err.message.clone(),
                    });
                }
                return report;
            }
        };

        let batch_size = self.pacing.batch_size.max(1);

        for (chunk_idx, chunk) in users.chunks(batch_size).enumerate() {
            if chunk_idx > 0 {
                tokio::time::sleep(self.pacing.batch_delay).await;
            }

            let mut first = true;
            for user in chunk {
                let Some(email) = user.email.as_deref() else {
                    self.log.record(
                        &user.id,
                        SyncOperation::BatchAddToGroup,
                        SyncLogStatus::Skipped,
                        Some("User has no email"),
                    );
                    report.failed_users.push(FailedMember {
                        id: user.id.clone(),
                        email: None,
                        error: "User has no email".to_string(),
                    });
                    continue;
                };

                if !first {
                    tokio::time::sleep(self.pacing.request_delay).await;
                }
                first = false;

                let result = with_retry(self.retry, ProviderError::is_transient, || {
                    self.directory.insert_member(&group, email)
                })
                .await;

                match result {
                    Ok(()) => {
                        self.log.record(
                            &user.id,
                            SyncOperation::BatchAddToGroup,
                            SyncLogStatus::Success,
                            None,
                        );
                        report.success_count += 1;
                    }
                    Err(err) if err.is_conflict() => {
                        self.log.record(
                            &user.id,
                            SyncOperation::BatchAddToGroup,
                            SyncLogStatus::AlreadyExists,
                            Some("User is already a member"),
                        );
                        report.success_count += 1;
                    }
                    Err(err) => {
                        warn!(user_id = %user.id, email, "Batch add failed: {}", err.message);
                        self.log.record(
                            &user.id,
                            SyncOperation::BatchAddToGroup,
                            SyncLogStatus::Failed,
                            Some(&err.message),
                        );
                        report.failed_users.push(FailedMember {
                            id: user.id.clone(),
                            email: Some(email.to_string()),
                            error: err.message,
                        });
                    }
                }
            }
        }

        info!(
            "Batch add finished: {} succeeded, {} failed",
            report.success_count,
            report.failed_users.len()
        );
        report
    }

    /// Re-attempts the oldest `limit` unresolved failed adds. Returns how
    /// many succeeded.
    pub async fn retry_failed_invites(&self, limit: i64) -> Result<usize> {
        let failures = self
            .store
            .list_unresolved_failures(&SyncOperation::GROUP_ADDS, limit)?;

        let mut success_count = 0;

        for failure in failures {
            let user = match self.store.get_user(&failure.subject_id)? {
                Some(user) if user.email.is_some() => user,
                _ => {
                    warn!(
                        user_id = %failure.subject_id,
                        "User not found or has no email, skipping"
                    );
                    continue;
                }
            };

            match self.add(&user).await {
                Ok(()) => success_count += 1,
                Err(e) => {
                    warn!(user_id = %user.id, "Retry failed: {}", e);
                    self.log.record(
                        &user.id,
                        SyncOperation::RetryAddToGroup,
                        SyncLogStatus::Failed,
                        Some(&e.to_string()),
                    );
                }
            }
        }

        info!("Group retry sweep finished: {} succeeded", success_count);
        Ok(success_count)
    }
}
