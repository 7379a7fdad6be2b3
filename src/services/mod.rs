//! Service module

pub mod session;

pub use session::{SessionHistory, SessionService, create_session_service};
