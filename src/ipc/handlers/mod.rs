pub mod attendance;
pub mod backup;
pub mod core;
pub mod exams;
pub mod reports;
pub mod students;
