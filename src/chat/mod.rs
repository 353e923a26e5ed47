pub mod reasoning;
pub mod session;

pub use session::{ChatSession, SessionStatus, SessionUpdate, Step};
