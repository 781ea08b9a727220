use std::sync::Arc;

use tracing::error;

use crate::store::Store;
use crate::types::{SyncLogStatus, SyncOperation};

/// Longest message kept in a sync log row or an agenda's `sync_error`.
pub const MAX_MESSAGE_CHARS: usize = 255;

/// Cuts `message` to [`MAX_MESSAGE_CHARS`] characters on a char boundary.
pub fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Appends audit rows for external sync attempts.
///
/// Writing the audit row must never mask the outcome being recorded, so a
/// store failure here is reported through tracing and otherwise ignored.
#[derive(Clone)]
pub struct SyncLogger {
    store: Arc<dyn Store>,
}

impl SyncLogger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn record(
        &self,
        subject_id: &str,
        operation: SyncOperation,
        status: SyncLogStatus,
        message: Option<&str>,
    ) {
        let message = message.map(truncate_message);
        if let Err(e) =
            self.store
                .append_sync_log(subject_id, operation, status, message.as_deref())
        {
            error!(
                subject_id,
                %operation,
                %status,
                "Failed to write sync log: {}",
                e
            );
        }
    }
}
