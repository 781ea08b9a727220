mod password;
mod session;

pub use password::PasswordHashing;
pub use session::{AccessDenied, Session, require_admin};
