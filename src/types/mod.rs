mod kinds;
mod models;
mod sync;

pub use kinds::{NotificationType, Priority, Role};
pub use models::*;
pub use sync::{SyncLogStatus, SyncOperation, SyncStatus};
