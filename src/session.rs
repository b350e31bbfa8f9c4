use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ManageStudents,
    ReadStudents,
    MarkAttendance,
    ReadAttendance,
    ManageExams,
    ReadExams,
    AttendanceReports,
    PerformanceReports,
    Notifications,
    Backup,
}

const ADMIN: &[Capability] = &[
    Capability::ManageStudents,
    Capability::ReadStudents,
    Capability::ReadAttendance,
    Capability::ManageExams,
    Capability::ReadExams,
    Capability::AttendanceReports,
    Capability::PerformanceReports,
    Capability::Notifications,
    Capability::Backup,
];

const TEACHER: &[Capability] = &[
    Capability::ReadStudents,
    Capability::MarkAttendance,
    Capability::ReadAttendance,
    Capability::AttendanceReports,
];

const STUDENT: &[Capability] = &[
    Capability::ReadStudents,
    Capability::ReadAttendance,
    Capability::ReadExams,
    Capability::PerformanceReports,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
    /// A student only ever sees their own records.
    Student { roll_no: String },
}

impl Role {
    pub fn parse(role: &str, roll_no: Option<&str>) -> Option<Self> {
        match role.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => roll_no.map(|r| Role::Student {
                roll_no: r.to_string(),
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student { .. } => "student",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin => ADMIN,
            Role::Teacher => TEACHER,
            Role::Student { .. } => STUDENT,
        }
    }

    pub fn permits(&self, cap: Capability) -> bool {
        self.capabilities().contains(&cap)
    }

    pub fn own_roll_no(&self) -> Option<&str> {
        match self {
            Role::Student { roll_no } => Some(roll_no.as_str()),
            _ => None,
        }
    }
}

/// State of the front end's current login, passed to every handler.
#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    notifications: Vec<String>,
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            notifications: Vec::new(),
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notifications.push(message.into());
    }

    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }
}
