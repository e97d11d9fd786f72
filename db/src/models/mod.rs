pub mod attendance_alert;
pub mod attendance_record;
pub mod attendance_session;
pub mod class;
pub mod class_enrollment;
pub mod class_subject;
pub mod face_encoding;
pub mod subject;
pub mod user;

pub use attendance_alert::Entity as AttendanceAlert;
pub use attendance_record::Entity as AttendanceRecord;
pub use attendance_session::Entity as AttendanceSession;
pub use class::Entity as Class;
pub use class_enrollment::Entity as ClassEnrollment;
pub use class_subject::Entity as ClassSubject;
pub use face_encoding::Entity as FaceEncoding;
pub use subject::Entity as Subject;
pub use user::Entity as User;
