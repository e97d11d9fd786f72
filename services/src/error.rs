use sea_orm::DbErr;
use thiserror::Error;

/// Error taxonomy of the attendance core.
///
/// Authorization failures and scope conflicts are client errors and are never
/// retried internally. Per-image and per-student hiccups inside a recognition
/// batch are deliberately absent here: those are logged skips, not errors.
#[derive(Error, Debug)]
pub enum AttendanceError {
    /// The requesting teacher is not the teacher assigned to the class subject.
    #[error("Teacher is not assigned to this class subject")]
    NotAssigned,

    /// The caller is not the teacher who started the session.
    #[error("Only the teacher who started the session may modify it")]
    NotAuthorized,

    /// An open session already exists for the (class subject, date) scope.
    /// Carries the existing session so callers can offer "use existing".
    #[error("An open attendance session already exists (session {existing_id})")]
    SessionAlreadyOpen { existing_id: i64 },

    /// The session does not exist. Used by operations that address a session
    /// directly, such as close.
    #[error("Attendance session not found")]
    SessionNotFound,

    /// The session does not exist or is no longer open. Recognition and
    /// manual marking require an open session.
    #[error("Attendance session is closed or does not exist")]
    SessionClosedOrNotFound,

    /// The given id does not resolve to a student-role user.
    #[error("Student not found")]
    StudentNotFound,

    /// The session was opened without permission for manual marking.
    #[error("Manual marking is not allowed for this session")]
    ManualNotAllowed,

    #[error(transparent)]
    Db(#[from] DbErr),
}
