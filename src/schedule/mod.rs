mod access;
mod conflict;

pub use access::{AccessDiff, AccessResolver, diff_access};
pub use conflict::{ConflictDetector, overlaps};
