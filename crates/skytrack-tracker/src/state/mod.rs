//! Session state shared between the poller, renderer and controls.

pub mod session;

pub use session::{Session, SessionError, SessionStatus};
