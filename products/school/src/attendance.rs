//! Class rosters and bulk attendance marking.

use std::collections::HashSet;

use chrono::{Duration, NaiveTime, Utc};
use entity::{attendance, lesson, student};
use platform_authz::{AuthzError, EntityKind, Operation, Principal, Role};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{ActionError, ActionResult};
use crate::ownership;
use crate::persist::in_utc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub username: String,
}

/// Students enrolled in a class, ordered by surname then name.
///
/// Admins see every class; teachers only classes they hold a lesson in.
pub async fn class_roster(
    db: &DatabaseConnection,
    principal: &Principal,
    class_id: i32,
) -> ActionResult<Vec<RosterEntry>> {
    match principal.role {
        Some(Role::Admin) => {}
        Some(Role::Teacher) => {
            if !ownership::teaches_class(db, &principal.user_id, class_id).await? {
                return Err(
                    AuthzError::forbidden(&principal.user_id, EntityKind::Class, class_id).into(),
                );
            }
        }
        role @ (Some(Role::Student) | Some(Role::Parent) | None) => {
            let err = AuthzError::unauthorized(role, Operation::Read, EntityKind::Student);
            return Err(err.into());
        }
    }

    let roster = student::Entity::find()
        .select_only()
        .column(student::Column::Id)
        .column(student::Column::Name)
        .column(student::Column::Surname)
        .column(student::Column::Username)
        .filter(student::Column::ClassId.eq(class_id))
        .order_by_asc(student::Column::Surname)
        .order_by_asc(student::Column::Name)
        .into_model::<RosterEntry>()
        .all(db)
        .await?;
    Ok(roster)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: String,
    pub present: bool,
}

/// All marks for one lesson on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceBatch {
    pub lesson_id: i32,
    pub date: DateTimeWithTimeZone,
    pub marks: Vec<AttendanceMark>,
}

/// One row of the bulk endpoint's `attendanceRecords` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: DateTimeWithTimeZone,
    pub present: bool,
    pub student_id: String,
    pub lesson_id: i32,
}

impl AttendanceBatch {
    /// Groups flat records into a batch. Every record must name the same
    /// lesson and UTC day as the first one.
    pub fn from_records(records: Vec<AttendanceRecord>) -> ActionResult<Self> {
        let Some(first) = records.first() else {
            return Err(ActionError::invalid("attendance records are empty"));
        };
        let lesson_id = first.lesson_id;
        let date = first.date;
        let day = date.with_timezone(&Utc).date_naive();
        let mut marks = Vec::with_capacity(records.len());
        for record in records {
            if record.lesson_id != lesson_id {
                return Err(ActionError::invalid("attendance records span several lessons"));
            }
            if record.date.with_timezone(&Utc).date_naive() != day {
                return Err(ActionError::invalid("attendance records span several days"));
            }
            marks.push(AttendanceMark {
                student_id: record.student_id,
                present: record.present,
            });
        }
        Ok(Self {
            lesson_id,
            date,
            marks,
        })
    }

    /// `[00:00, next 00:00)` in UTC around the batch date.
    pub fn day_range(&self) -> (DateTimeWithTimeZone, DateTimeWithTimeZone) {
        let start = self
            .date
            .with_timezone(&Utc)
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc()
            .fixed_offset();
        (start, start + Duration::days(1))
    }
}

/// Replaces every attendance row of the batch's lesson and day with the
/// batch. Returns the number of rows written.
pub async fn replace_attendance(
    db: &DatabaseConnection,
    principal: &Principal,
    batch: AttendanceBatch,
) -> ActionResult<u64> {
    let span = tracing::info_span!(
        "school.attendance.replace",
        lesson_id = batch.lesson_id,
        marks = batch.marks.len(),
        user_id = %principal.user_id,
    );
    replace(db, principal, batch).instrument(span).await
}

async fn replace(
    db: &DatabaseConnection,
    principal: &Principal,
    batch: AttendanceBatch,
) -> ActionResult<u64> {
    if !matches!(principal.role, Some(Role::Admin) | Some(Role::Teacher)) {
        let err =
            AuthzError::unauthorized(principal.role, Operation::Update, EntityKind::Attendance);
        return Err(err.into());
    }
    if batch.marks.is_empty() {
        return Err(ActionError::invalid("attendance batch is empty"));
    }
    let mut seen = HashSet::with_capacity(batch.marks.len());
    if let Some(dup) = batch.marks.iter().find(|mark| !seen.insert(mark.student_id.as_str())) {
        return Err(ActionError::invalid(format!(
            "student {} is marked more than once",
            dup.student_id
        )));
    }

    let lesson = lesson::Entity::find_by_id(batch.lesson_id)
        .one(db)
        .await?
        .ok_or_else(|| ActionError::not_found(EntityKind::Lesson, batch.lesson_id))?;
    if principal.role == Some(Role::Teacher) && lesson.teacher_id != principal.user_id {
        let err = AuthzError::forbidden(&principal.user_id, EntityKind::Lesson, lesson.id);
        return Err(err.into());
    }

    let enrolled: HashSet<String> = student::Entity::find()
        .select_only()
        .column(student::Column::Id)
        .filter(student::Column::ClassId.eq(lesson.class_id))
        .into_tuple::<String>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    let stranger = batch
        .marks
        .iter()
        .find(|mark| !enrolled.contains(&mark.student_id));
    if let Some(stranger) = stranger {
        return Err(ActionError::invalid(format!(
            "student {} is not enrolled in class {}",
            stranger.student_id, lesson.class_id
        )));
    }

    let (from, until) = batch.day_range();
    let date = in_utc(batch.date);
    let rows = batch.marks.iter().map(|mark| attendance::ActiveModel {
        date: Set(date),
        present: Set(mark.present),
        student_id: Set(mark.student_id.clone()),
        lesson_id: Set(batch.lesson_id),
        ..Default::default()
    });

    let txn = db.begin().await?;
    let removed = attendance::Entity::delete_many()
        .filter(attendance::Column::LessonId.eq(batch.lesson_id))
        .filter(attendance::Column::Date.gte(from))
        .filter(attendance::Column::Date.lt(until))
        .exec(&txn)
        .await?;
    let created = attendance::Entity::insert_many(rows)
        .exec_without_returning(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(
        removed = removed.rows_affected,
        created,
        "attendance replaced"
    );
    Ok(created)
}
