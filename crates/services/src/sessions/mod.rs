mod progress;
mod session;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::{AttemptResult, SessionProgress};
pub use session::{QuizSession, SessionState};
pub use workflow::QuizService;
