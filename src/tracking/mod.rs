//! Tracking runs and code revision lookup.

pub mod revision;
pub mod session;

pub use revision::CodeRevision;
pub use session::TrackingSession;
