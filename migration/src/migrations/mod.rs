pub mod m202606010001_create_users;
pub mod m202606010002_create_classes;
pub mod m202606010003_create_subjects;
pub mod m202606010004_create_class_subjects;
pub mod m202606010005_create_class_enrollments;
pub mod m202606080001_create_face_encodings;
pub mod m202606150001_create_attendance;
