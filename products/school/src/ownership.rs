//! Resolution of teacher ownership.
//!
//! A teacher owns a row when its ownership link leads to a lesson they
//! teach. Links that point at rows which no longer exist resolve as not
//! owned.

use entity::{
    announcement, assignment, attendance, class, event, exam, lesson, parent, result, student,
    subject, teacher,
};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};

use crate::payload::{Graded, Payload, Target};

/// Where ownership of a row is decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Link {
    /// The row names its teacher directly.
    Teacher(String),
    Lesson(i32),
    Exam(i32),
    Assignment(i32),
    /// Owned through any lesson taught in the class; `None` is school-wide.
    Class(Option<i32>),
    /// No teacher can own the row.
    Unowned,
}

impl From<Graded> for Link {
    fn from(graded: Graded) -> Self {
        match graded {
            Graded::Exam(id) => Link::Exam(id),
            Graded::Assignment(id) => Link::Assignment(id),
        }
    }
}

impl Payload {
    pub(crate) fn link(&self) -> Link {
        match self {
            Payload::Lesson(input) => Link::Teacher(input.teacher_id.clone()),
            Payload::Exam(input) => Link::Lesson(input.lesson_id),
            Payload::Assignment(input) => Link::Lesson(input.lesson_id),
            Payload::Attendance(input) => Link::Lesson(input.lesson_id),
            Payload::Result(input) => input.graded().map_or(Link::Unowned, Link::from),
            Payload::Event(input) => Link::Class(input.class_id),
            Payload::Announcement(input) => Link::Class(input.class_id),
            Payload::Subject(_)
            | Payload::Class(_)
            | Payload::Teacher(_)
            | Payload::Student(_)
            | Payload::Parent(_) => Link::Unowned,
        }
    }
}

/// Ownership link of the row `target` names, or `None` when it does not
/// exist.
pub(crate) async fn existing_link<C: ConnectionTrait>(
    db: &C,
    target: &Target,
) -> Result<Option<Link>, DbErr> {
    let link = match target {
        Target::Lesson(id) => lesson::Entity::find_by_id(*id)
            .one(db)
            .await?
            .map(|row| Link::Teacher(row.teacher_id)),
        Target::Exam(id) => exam::Entity::find_by_id(*id)
            .one(db)
            .await?
            .map(|row| Link::Lesson(row.lesson_id)),
        Target::Assignment(id) => assignment::Entity::find_by_id(*id)
            .one(db)
            .await?
            .map(|row| Link::Lesson(row.lesson_id)),
        Target::Attendance(id) => attendance::Entity::find_by_id(*id)
            .one(db)
            .await?
            .map(|row| Link::Lesson(row.lesson_id)),
        Target::Result(id) => result::Entity::find_by_id(*id).one(db).await?.map(|row| {
            match (row.exam_id, row.assignment_id) {
                (Some(exam), _) => Link::Exam(exam),
                (None, Some(assignment)) => Link::Assignment(assignment),
                (None, None) => Link::Unowned,
            }
        }),
        Target::Event(id) => event::Entity::find_by_id(*id)
            .one(db)
            .await?
            .map(|row| Link::Class(row.class_id)),
        Target::Announcement(id) => announcement::Entity::find_by_id(*id)
            .one(db)
            .await?
            .map(|row| Link::Class(row.class_id)),
        Target::Subject(id) => exists(subject::Entity::find_by_id(*id).count(db).await?),
        Target::Class(id) => exists(class::Entity::find_by_id(*id).count(db).await?),
        Target::Teacher(id) => exists(teacher::Entity::find_by_id(id.clone()).count(db).await?),
        Target::Student(id) => exists(student::Entity::find_by_id(id.clone()).count(db).await?),
        Target::Parent(id) => exists(parent::Entity::find_by_id(id.clone()).count(db).await?),
    };
    Ok(link)
}

fn exists(count: u64) -> Option<Link> {
    (count > 0).then_some(Link::Unowned)
}

pub(crate) async fn owns<C: ConnectionTrait>(
    db: &C,
    teacher_id: &str,
    link: &Link,
) -> Result<bool, DbErr> {
    match link {
        Link::Teacher(owner) => Ok(owner == teacher_id),
        Link::Lesson(lesson_id) => teaches_lesson(db, teacher_id, *lesson_id).await,
        Link::Exam(exam_id) => match exam::Entity::find_by_id(*exam_id).one(db).await? {
            Some(row) => teaches_lesson(db, teacher_id, row.lesson_id).await,
            None => Ok(false),
        },
        Link::Assignment(assignment_id) => {
            match assignment::Entity::find_by_id(*assignment_id).one(db).await? {
                Some(row) => teaches_lesson(db, teacher_id, row.lesson_id).await,
                None => Ok(false),
            }
        }
        Link::Class(Some(class_id)) => teaches_class(db, teacher_id, *class_id).await,
        Link::Class(None) | Link::Unowned => Ok(false),
    }
}

pub(crate) async fn teaches_lesson<C: ConnectionTrait>(
    db: &C,
    teacher_id: &str,
    lesson_id: i32,
) -> Result<bool, DbErr> {
    let count = lesson::Entity::find_by_id(lesson_id)
        .filter(lesson::Column::TeacherId.eq(teacher_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Whether the teacher has at least one lesson in the class.
pub(crate) async fn teaches_class<C: ConnectionTrait>(
    db: &C,
    teacher_id: &str,
    class_id: i32,
) -> Result<bool, DbErr> {
    let count = lesson::Entity::find()
        .filter(lesson::Column::ClassId.eq(class_id))
        .filter(lesson::Column::TeacherId.eq(teacher_id))
        .count(db)
        .await?;
    Ok(count > 0)
}
