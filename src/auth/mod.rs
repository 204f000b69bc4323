pub mod guard;
pub mod session;

pub use guard::{GuardDecision, Route};
pub use session::{Session, SessionError, SessionStatus};
