//! Single persistence step of an admitted action.

use std::collections::BTreeSet;

use chrono::Utc;
use entity::{
    announcement, assignment, attendance, class, event, exam, lesson, result, subject,
    teacher_subject,
};
use platform_authn::IdentityDirectory;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DeleteResult, EntityTrait, QueryFilter, TransactionTrait,
};

use crate::error::{ActionError, ActionResult};
use crate::payload::{Payload, Target, non_empty};
use crate::people;

pub(crate) async fn create(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    payload: &Payload,
) -> ActionResult<String> {
    let id = match payload {
        Payload::Subject(input) => {
            let txn = db.begin().await?;
            let row = subject::ActiveModel {
                name: Set(input.name.trim().to_string()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            link_subject_teachers(&txn, row.id, &input.teachers).await?;
            txn.commit().await?;
            row.id
        }
        Payload::Class(input) => {
            class::ActiveModel {
                name: Set(input.name.trim().to_string()),
                capacity: Set(input.capacity),
                grade_id: Set(input.grade_id),
                supervisor_id: Set(non_empty(&input.supervisor_id)),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Teacher(input) => return people::create_teacher(db, directory, input).await,
        Payload::Student(input) => return people::create_student(db, directory, input).await,
        Payload::Parent(input) => return people::create_parent(db, directory, input).await,
        Payload::Lesson(input) => {
            lesson::ActiveModel {
                name: Set(input.name.trim().to_string()),
                day: Set(input.day),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                subject_id: Set(input.subject_id),
                class_id: Set(input.class_id),
                teacher_id: Set(input.teacher_id.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Exam(input) => {
            exam::ActiveModel {
                title: Set(input.title.trim().to_string()),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                lesson_id: Set(input.lesson_id),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Assignment(input) => {
            assignment::ActiveModel {
                title: Set(input.title.trim().to_string()),
                start_date: Set(input.start_date),
                due_date: Set(input.due_date),
                lesson_id: Set(input.lesson_id),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Result(input) => {
            result::ActiveModel {
                score: Set(input.score),
                exam_id: Set(input.exam_id),
                assignment_id: Set(input.assignment_id),
                student_id: Set(input.student_id.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Event(input) => {
            event::ActiveModel {
                title: Set(input.title.trim().to_string()),
                description: Set(input.description.clone()),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                class_id: Set(input.class_id),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Announcement(input) => {
            announcement::ActiveModel {
                title: Set(input.title.trim().to_string()),
                description: Set(input.description.clone()),
                date: Set(input.date),
                class_id: Set(input.class_id),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
        Payload::Attendance(input) => {
            attendance::ActiveModel {
                date: Set(in_utc(input.date)),
                present: Set(input.present),
                student_id: Set(input.student_id.clone()),
                lesson_id: Set(input.lesson_id),
                ..Default::default()
            }
            .insert(db)
            .await?
            .id
        }
    };
    Ok(id.to_string())
}

pub(crate) async fn update(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    target: &Target,
    payload: &Payload,
) -> ActionResult<()> {
    match (target, payload) {
        (Target::Subject(id), Payload::Subject(input)) => {
            let txn = db.begin().await?;
            subject::ActiveModel {
                id: Set(*id),
                name: Set(input.name.trim().to_string()),
            }
            .update(&txn)
            .await?;
            teacher_subject::Entity::delete_many()
                .filter(teacher_subject::Column::SubjectId.eq(*id))
                .exec(&txn)
                .await?;
            link_subject_teachers(&txn, *id, &input.teachers).await?;
            txn.commit().await?;
        }
        (Target::Class(id), Payload::Class(input)) => {
            class::ActiveModel {
                id: Set(*id),
                name: Set(input.name.trim().to_string()),
                capacity: Set(input.capacity),
                grade_id: Set(input.grade_id),
                supervisor_id: Set(non_empty(&input.supervisor_id)),
            }
            .update(db)
            .await?;
        }
        (Target::Teacher(id), Payload::Teacher(input)) => {
            people::update_teacher(db, directory, id, input).await?
        }
        (Target::Student(id), Payload::Student(input)) => {
            people::update_student(db, directory, id, input).await?
        }
        (Target::Parent(id), Payload::Parent(input)) => {
            people::update_parent(db, directory, id, input).await?
        }
        (Target::Lesson(id), Payload::Lesson(input)) => {
            lesson::ActiveModel {
                id: Set(*id),
                name: Set(input.name.trim().to_string()),
                day: Set(input.day),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                subject_id: Set(input.subject_id),
                class_id: Set(input.class_id),
                teacher_id: Set(input.teacher_id.clone()),
            }
            .update(db)
            .await?;
        }
        (Target::Exam(id), Payload::Exam(input)) => {
            exam::ActiveModel {
                id: Set(*id),
                title: Set(input.title.trim().to_string()),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                lesson_id: Set(input.lesson_id),
            }
            .update(db)
            .await?;
        }
        (Target::Assignment(id), Payload::Assignment(input)) => {
            assignment::ActiveModel {
                id: Set(*id),
                title: Set(input.title.trim().to_string()),
                start_date: Set(input.start_date),
                due_date: Set(input.due_date),
                lesson_id: Set(input.lesson_id),
            }
            .update(db)
            .await?;
        }
        (Target::Result(id), Payload::Result(input)) => {
            result::ActiveModel {
                id: Set(*id),
                score: Set(input.score),
                exam_id: Set(input.exam_id),
                assignment_id: Set(input.assignment_id),
                student_id: Set(input.student_id.clone()),
            }
            .update(db)
            .await?;
        }
        (Target::Event(id), Payload::Event(input)) => {
            event::ActiveModel {
                id: Set(*id),
                title: Set(input.title.trim().to_string()),
                description: Set(input.description.clone()),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                class_id: Set(input.class_id),
            }
            .update(db)
            .await?;
        }
        (Target::Announcement(id), Payload::Announcement(input)) => {
            announcement::ActiveModel {
                id: Set(*id),
                title: Set(input.title.trim().to_string()),
                description: Set(input.description.clone()),
                date: Set(input.date),
                class_id: Set(input.class_id),
            }
            .update(db)
            .await?;
        }
        (Target::Attendance(id), Payload::Attendance(input)) => {
            attendance::ActiveModel {
                id: Set(*id),
                date: Set(in_utc(input.date)),
                present: Set(input.present),
                student_id: Set(input.student_id.clone()),
                lesson_id: Set(input.lesson_id),
            }
            .update(db)
            .await?;
        }
        (target, payload) => {
            return Err(ActionError::invalid(format!(
                "{} payload cannot update a {}",
                payload.kind(),
                target.kind()
            )));
        }
    }
    Ok(())
}

pub(crate) async fn delete(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    target: &Target,
) -> ActionResult<()> {
    let outcome: DeleteResult = match target {
        Target::Teacher(id) => return people::delete_teacher(db, directory, id).await,
        Target::Student(id) => return people::delete_student(db, directory, id).await,
        Target::Parent(id) => return people::delete_parent(db, directory, id).await,
        Target::Subject(id) => subject::Entity::delete_by_id(*id).exec(db).await?,
        Target::Class(id) => class::Entity::delete_by_id(*id).exec(db).await?,
        Target::Lesson(id) => lesson::Entity::delete_by_id(*id).exec(db).await?,
        Target::Exam(id) => exam::Entity::delete_by_id(*id).exec(db).await?,
        Target::Assignment(id) => assignment::Entity::delete_by_id(*id).exec(db).await?,
        Target::Result(id) => result::Entity::delete_by_id(*id).exec(db).await?,
        Target::Event(id) => event::Entity::delete_by_id(*id).exec(db).await?,
        Target::Announcement(id) => announcement::Entity::delete_by_id(*id).exec(db).await?,
        Target::Attendance(id) => attendance::Entity::delete_by_id(*id).exec(db).await?,
    };
    if outcome.rows_affected == 0 {
        return Err(ActionError::not_found(target.kind(), target.id()));
    }
    Ok(())
}

async fn link_subject_teachers<C: ConnectionTrait>(
    db: &C,
    subject_id: i32,
    teacher_ids: &[String],
) -> ActionResult<()> {
    if teacher_ids.is_empty() {
        return Ok(());
    }
    let unique: BTreeSet<&String> = teacher_ids.iter().collect();
    let links = unique.into_iter().map(|teacher_id| teacher_subject::ActiveModel {
        teacher_id: Set(teacher_id.clone()),
        subject_id: Set(subject_id),
    });
    teacher_subject::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// Attendance days are UTC days, and SQLite compares timestamps as text, so
/// attendance dates are always stored with a zero offset.
pub(crate) fn in_utc(date: DateTimeWithTimeZone) -> DateTimeWithTimeZone {
    date.with_timezone(&Utc).fixed_offset()
}
