//! Attendance session and recognition reconciliation engine.
//!
//! Everything with real invariants lives here: the session open/close state
//! machine, the recognition reconciler that turns image batches into
//! deduplicated student marks, the shared record-update algorithm, manual
//! overrides, and alert derivation.

pub mod alerts;
pub mod error;
pub mod manual;
pub mod reconciler;
pub mod record_update;
pub mod session_lifecycle;

pub use error::AttendanceError;
pub use record_update::MarkMode;
