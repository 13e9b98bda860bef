//! Typed inputs of the mutating operations.
//!
//! Each entity has its own input struct carrying only that entity's fields.
//! [`Payload`] and [`Target`] close over them so the guard can branch with an
//! exhaustive `match` instead of probing field names at runtime.

use chrono::NaiveDate;
use entity::{Day, Sex};
use platform_authz::{EntityKind, Operation};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use crate::error::{ActionError, ActionResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInput {
    pub name: String,
    /// Teachers linked to the subject; replaces the existing set on update.
    #[serde(default)]
    pub teachers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInput {
    pub name: String,
    pub capacity: i32,
    pub grade_id: i32,
    #[serde(default)]
    pub supervisor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherInput {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    #[serde(default)]
    pub img: Option<String>,
    pub blood_type: String,
    #[serde(alias = "gender")]
    pub sex: Sex,
    pub birthday: NaiveDate,
    #[serde(default)]
    pub subjects: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    #[serde(default)]
    pub img: Option<String>,
    pub blood_type: String,
    #[serde(alias = "gender")]
    pub sex: Sex,
    pub birthday: NaiveDate,
    pub grade_id: i32,
    pub class_id: i32,
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentInput {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInput {
    pub name: String,
    pub day: Day,
    pub start_time: DateTimeWithTimeZone,
    pub end_time: DateTimeWithTimeZone,
    pub subject_id: i32,
    pub class_id: i32,
    pub teacher_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamInput {
    pub title: String,
    pub start_time: DateTimeWithTimeZone,
    pub end_time: DateTimeWithTimeZone,
    pub lesson_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    pub title: String,
    pub start_date: DateTimeWithTimeZone,
    pub due_date: DateTimeWithTimeZone,
    pub lesson_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInput {
    pub score: i32,
    #[serde(default)]
    pub exam_id: Option<i32>,
    #[serde(default)]
    pub assignment_id: Option<i32>,
    pub student_id: String,
}

/// What a result is graded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Graded {
    Exam(i32),
    Assignment(i32),
}

impl ResultInput {
    /// `None` unless exactly one of exam and assignment is set.
    pub fn graded(&self) -> Option<Graded> {
        match (self.exam_id, self.assignment_id) {
            (Some(exam), None) => Some(Graded::Exam(exam)),
            (None, Some(assignment)) => Some(Graded::Assignment(assignment)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub start_time: DateTimeWithTimeZone,
    pub end_time: DateTimeWithTimeZone,
    /// `None` makes the event school-wide.
    #[serde(default)]
    pub class_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementInput {
    pub title: String,
    pub description: String,
    pub date: DateTimeWithTimeZone,
    #[serde(default)]
    pub class_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceInput {
    pub date: DateTimeWithTimeZone,
    pub present: bool,
    pub student_id: String,
    pub lesson_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Subject(SubjectInput),
    Class(ClassInput),
    Teacher(TeacherInput),
    Student(StudentInput),
    Parent(ParentInput),
    Lesson(LessonInput),
    Exam(ExamInput),
    Assignment(AssignmentInput),
    Result(ResultInput),
    Event(EventInput),
    Announcement(AnnouncementInput),
    Attendance(AttendanceInput),
}

/// Identifier of an existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Subject(i32),
    Class(i32),
    Teacher(String),
    Student(String),
    Parent(String),
    Lesson(i32),
    Exam(i32),
    Assignment(i32),
    Result(i32),
    Event(i32),
    Announcement(i32),
    Attendance(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create(Payload),
    Update(Target, Payload),
    Delete(Target),
}

impl Payload {
    pub fn kind(&self) -> EntityKind {
        match self {
            Payload::Subject(_) => EntityKind::Subject,
            Payload::Class(_) => EntityKind::Class,
            Payload::Teacher(_) => EntityKind::Teacher,
            Payload::Student(_) => EntityKind::Student,
            Payload::Parent(_) => EntityKind::Parent,
            Payload::Lesson(_) => EntityKind::Lesson,
            Payload::Exam(_) => EntityKind::Exam,
            Payload::Assignment(_) => EntityKind::Assignment,
            Payload::Result(_) => EntityKind::Result,
            Payload::Event(_) => EntityKind::Event,
            Payload::Announcement(_) => EntityKind::Announcement,
            Payload::Attendance(_) => EntityKind::Attendance,
        }
    }

    pub fn validate(&self) -> ActionResult<()> {
        match self {
            Payload::Subject(input) => required("name", &input.name),
            Payload::Class(input) => {
                required("name", &input.name)?;
                at_least_one("capacity", input.capacity)?;
                at_least_one("gradeId", input.grade_id)
            }
            Payload::Teacher(input) => {
                person(&input.username, input.password.as_deref(), &input.name, &input.surname)?;
                email(input.email.as_deref())?;
                required("bloodType", &input.blood_type)
            }
            Payload::Student(input) => {
                person(&input.username, input.password.as_deref(), &input.name, &input.surname)?;
                email(input.email.as_deref())?;
                required("bloodType", &input.blood_type)?;
                at_least_one("gradeId", input.grade_id)?;
                at_least_one("classId", input.class_id)?;
                required("parentId", &input.parent_id)
            }
            Payload::Parent(input) => {
                person(&input.username, input.password.as_deref(), &input.name, &input.surname)?;
                email(input.email.as_deref())?;
                required("phone", &input.phone)?;
                required("address", &input.address)
            }
            Payload::Lesson(input) => {
                required("name", &input.name)?;
                required("teacherId", &input.teacher_id)?;
                ordered("endTime", &input.start_time, &input.end_time)
            }
            Payload::Exam(input) => {
                required("title", &input.title)?;
                ordered("endTime", &input.start_time, &input.end_time)
            }
            Payload::Assignment(input) => {
                required("title", &input.title)?;
                ordered("dueDate", &input.start_date, &input.due_date)
            }
            Payload::Result(input) => {
                if !(0..=100).contains(&input.score) {
                    return Err(ActionError::invalid("score must be between 0 and 100"));
                }
                required("studentId", &input.student_id)?;
                if input.graded().is_none() {
                    return Err(ActionError::invalid(
                        "result must reference exactly one of examId or assignmentId",
                    ));
                }
                Ok(())
            }
            Payload::Event(input) => {
                required("title", &input.title)?;
                required("description", &input.description)?;
                ordered("endTime", &input.start_time, &input.end_time)
            }
            Payload::Announcement(input) => {
                required("title", &input.title)?;
                required("description", &input.description)
            }
            Payload::Attendance(input) => required("studentId", &input.student_id),
        }
    }
}

impl Target {
    pub fn kind(&self) -> EntityKind {
        match self {
            Target::Subject(_) => EntityKind::Subject,
            Target::Class(_) => EntityKind::Class,
            Target::Teacher(_) => EntityKind::Teacher,
            Target::Student(_) => EntityKind::Student,
            Target::Parent(_) => EntityKind::Parent,
            Target::Lesson(_) => EntityKind::Lesson,
            Target::Exam(_) => EntityKind::Exam,
            Target::Assignment(_) => EntityKind::Assignment,
            Target::Result(_) => EntityKind::Result,
            Target::Event(_) => EntityKind::Event,
            Target::Announcement(_) => EntityKind::Announcement,
            Target::Attendance(_) => EntityKind::Attendance,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Target::Teacher(id) | Target::Student(id) | Target::Parent(id) => id.clone(),
            Target::Subject(id)
            | Target::Class(id)
            | Target::Lesson(id)
            | Target::Exam(id)
            | Target::Assignment(id)
            | Target::Result(id)
            | Target::Event(id)
            | Target::Announcement(id)
            | Target::Attendance(id) => id.to_string(),
        }
    }
}

impl Action {
    /// Entity the action is about. For an update the target decides; a
    /// payload of another kind is rejected during validation.
    pub fn kind(&self) -> EntityKind {
        match self {
            Action::Create(payload) => payload.kind(),
            Action::Update(target, _) | Action::Delete(target) => target.kind(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Action::Create(_) => Operation::Create,
            Action::Update(..) => Operation::Update,
            Action::Delete(_) => Operation::Delete,
        }
    }

    pub fn validate(&self) -> ActionResult<()> {
        match self {
            Action::Create(payload) => payload.validate(),
            Action::Update(target, payload) => {
                if target.kind() != payload.kind() {
                    return Err(ActionError::invalid(format!(
                        "{} payload cannot update a {}",
                        payload.kind(),
                        target.kind()
                    )));
                }
                payload.validate()
            }
            Action::Delete(_) => Ok(()),
        }
    }
}

fn required(field: &str, value: &str) -> ActionResult<()> {
    if value.trim().is_empty() {
        return Err(ActionError::invalid(format!("{field} is required")));
    }
    Ok(())
}

fn at_least_one(field: &str, value: i32) -> ActionResult<()> {
    if value < 1 {
        return Err(ActionError::invalid(format!("{field} must be at least 1")));
    }
    Ok(())
}

fn ordered(field: &str, start: &DateTimeWithTimeZone, end: &DateTimeWithTimeZone) -> ActionResult<()> {
    if end <= start {
        return Err(ActionError::invalid(format!("{field} must be after the start")));
    }
    Ok(())
}

fn person(username: &str, password: Option<&str>, name: &str, surname: &str) -> ActionResult<()> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(ActionError::invalid(
            "username must be between 3 and 20 characters",
        ));
    }
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        if password.chars().count() < 8 {
            return Err(ActionError::invalid("password must be at least 8 characters"));
        }
    }
    required("name", name)?;
    required("surname", surname)
}

fn email(value: Option<&str>) -> ActionResult<()> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ActionError::invalid("invalid email address")),
    }
}

/// Empty optional strings are stored as `NULL`.
pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn at(rfc3339: &str) -> DateTimeWithTimeZone {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    fn exam(title: &str) -> ExamInput {
        let start = at("2024-09-02T09:00:00Z");
        ExamInput {
            title: title.into(),
            start_time: start,
            end_time: start + Duration::hours(1),
            lesson_id: 1,
        }
    }

    #[test]
    fn mismatched_update_is_invalid() {
        let action = Action::Update(Target::Lesson(3), Payload::Exam(exam("Algebra")));
        assert_eq!(action.kind(), EntityKind::Lesson);
        assert!(matches!(action.validate(), Err(ActionError::InvalidInput(_))));
    }

    #[test]
    fn blank_titles_and_reversed_times_are_rejected() {
        assert!(Payload::Exam(exam("  ")).validate().is_err());

        let mut reversed = exam("Algebra");
        reversed.end_time = reversed.start_time - Duration::minutes(5);
        assert!(Payload::Exam(reversed).validate().is_err());

        assert!(Payload::Exam(exam("Algebra")).validate().is_ok());
    }

    #[test]
    fn result_needs_exactly_one_graded_item() {
        let mut result = ResultInput {
            score: 80,
            exam_id: Some(1),
            assignment_id: Some(2),
            student_id: "s1".into(),
        };
        assert!(Payload::Result(result.clone()).validate().is_err());

        result.assignment_id = None;
        assert_eq!(result.graded(), Some(Graded::Exam(1)));
        assert!(Payload::Result(result.clone()).validate().is_ok());

        result.score = 101;
        assert!(Payload::Result(result).validate().is_err());
    }

    #[test]
    fn usernames_are_bounded_and_blank_passwords_skip_checks() {
        let mut parent = ParentInput {
            username: "ma".into(),
            password: Some(String::new()),
            name: "Molly".into(),
            surname: "Weasley".into(),
            email: Some(String::new()),
            phone: "555-0100".into(),
            address: "The Burrow".into(),
        };
        assert!(Payload::Parent(parent.clone()).validate().is_err());
        parent.username = "mweasley".into();
        assert!(Payload::Parent(parent.clone()).validate().is_ok());
        parent.email = Some("molly-at-burrow".into());
        assert!(Payload::Parent(parent).validate().is_err());
    }

    #[test]
    fn inputs_accept_camel_case_documents() {
        let input: LessonInput = serde_json::from_value(serde_json::json!({
            "name": "Math 1A",
            "day": "MONDAY",
            "startTime": "2024-09-02T08:00:00+00:00",
            "endTime": "2024-09-02T08:45:00+00:00",
            "subjectId": 1,
            "classId": 2,
            "teacherId": "t1"
        }))
        .unwrap();
        assert_eq!(input.day, Day::Monday);
        assert_eq!(input.teacher_id, "t1");
    }

    #[test]
    fn empty_optional_strings_become_null() {
        assert_eq!(non_empty(&Some("  ".into())), None);
        assert_eq!(non_empty(&Some(" a@b.c ".into())), Some("a@b.c".into()));
    }
}
