mod common;

use common::*;
use entity::attendance;
use platform_authz::{AuthzError, EntityKind, Principal};
use school::{
    ActionError, AttendanceBatch, AttendanceMark, AttendanceRecord, class_roster,
    replace_attendance,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};

async fn mark(db: &DatabaseConnection, student_id: &str, lesson_id: i32, date: &str, present: bool) {
    attendance::ActiveModel {
        date: Set(at(date)),
        present: Set(present),
        student_id: Set(student_id.into()),
        lesson_id: Set(lesson_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

async fn rows_between(db: &DatabaseConnection, lesson_id: i32, from: &str, until: &str) -> u64 {
    attendance::Entity::find()
        .filter(attendance::Column::LessonId.eq(lesson_id))
        .filter(attendance::Column::Date.gte(at(from)))
        .filter(attendance::Column::Date.lt(at(until)))
        .count(db)
        .await
        .unwrap()
}

fn batch(lesson_id: i32, date: &str, students: &[&str]) -> AttendanceBatch {
    AttendanceBatch {
        lesson_id,
        date: at(date),
        marks: students
            .iter()
            .enumerate()
            .map(|(i, id)| AttendanceMark {
                student_id: (*id).to_string(),
                present: i % 5 != 0,
            })
            .collect(),
    }
}

#[tokio::test]
async fn replace_leaves_exactly_the_new_batch_for_that_day() {
    let env = setup().await;
    let ids: Vec<String> = (1..=25).map(|n| format!("b{n:02}")).collect();
    for id in &ids {
        add_student(&env.db, id, "Pupil", id, CLASS_2B).await;
    }
    mark(&env.db, "b01", LESSON_T2, "2024-09-02T08:00:00Z", false).await;
    mark(&env.db, "b02", LESSON_T2, "2024-09-02T08:00:00Z", true).await;
    mark(&env.db, "b01", LESSON_T2, "2024-09-03T08:00:00Z", true).await;

    let students: Vec<&str> = ids.iter().map(String::as_str).collect();
    let created = replace_attendance(
        &env.db,
        &Principal::teacher("t2"),
        batch(LESSON_T2, "2024-09-02T10:15:00Z", &students),
    )
    .await
    .unwrap();

    assert_eq!(created, 25);
    assert_eq!(
        rows_between(&env.db, LESSON_T2, "2024-09-02T00:00:00Z", "2024-09-03T00:00:00Z").await,
        25
    );
    assert_eq!(
        rows_between(&env.db, LESSON_T2, "2024-09-03T00:00:00Z", "2024-09-04T00:00:00Z").await,
        1
    );

    let absent = attendance::Entity::find()
        .filter(attendance::Column::StudentId.eq("b01"))
        .filter(attendance::Column::Date.lt(at("2024-09-03T00:00:00Z")))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!absent.present);
}

#[tokio::test]
async fn rejected_batches_change_nothing() {
    let env = setup().await;
    mark(&env.db, "s1", LESSON_T1, "2024-09-02T08:00:00Z", true).await;
    let before = attendance::Entity::find().count(&env.db).await.unwrap();
    let owner = Principal::teacher("t1");

    let err = replace_attendance(
        &env.db,
        &owner,
        batch(LESSON_T1, "2024-09-02T09:00:00Z", &["s1", "s2", "s1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::InvalidInput(_)));

    add_student(&env.db, "x1", "Draco", "Malfoy", CLASS_2B).await;
    let err = replace_attendance(
        &env.db,
        &owner,
        batch(LESSON_T1, "2024-09-02T09:00:00Z", &["s1", "x1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::InvalidInput(_)));

    let err = replace_attendance(
        &env.db,
        &Principal::teacher("t2"),
        batch(LESSON_T1, "2024-09-02T09:00:00Z", &["s1", "s2"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ActionError::Authz(AuthzError::Forbidden { kind: EntityKind::Lesson, .. })
    ));

    let err = replace_attendance(
        &env.db,
        &Principal::student("s1"),
        batch(LESSON_T1, "2024-09-02T09:00:00Z", &["s1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::Authz(AuthzError::Unauthorized { .. })));

    let err = replace_attendance(
        &env.db,
        &Principal::admin("a1"),
        batch(404, "2024-09-02T09:00:00Z", &["s1"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ActionError::NotFound { kind: EntityKind::Lesson, .. }));

    let err = replace_attendance(&env.db, &owner, batch(LESSON_T1, "2024-09-02T09:00:00Z", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::InvalidInput(_)));

    assert_eq!(attendance::Entity::find().count(&env.db).await.unwrap(), before);
}

#[tokio::test]
async fn admin_may_mark_any_lesson() {
    let env = setup().await;
    let created = replace_attendance(
        &env.db,
        &Principal::admin("a1"),
        batch(LESSON_T1, "2024-09-02T09:00:00+02:00", &["s1", "s2"]),
    )
    .await
    .unwrap();
    assert_eq!(created, 2);
}

#[tokio::test]
async fn roster_is_sorted_and_scoped_to_taught_classes() {
    let env = setup().await;
    add_student(&env.db, "s3", "Bill", "Weasley", CLASS_1A).await;
    add_student(&env.db, "s4", "Hermione", "Granger", CLASS_1A).await;

    let roster = class_roster(&env.db, &Principal::teacher("t1"), CLASS_1A)
        .await
        .unwrap();
    let names: Vec<(&str, &str)> = roster
        .iter()
        .map(|entry| (entry.surname.as_str(), entry.name.as_str()))
        .collect();
    assert_eq!(
        names,
        [
            ("Granger", "Hermione"),
            ("Weasley", "Bill"),
            ("Weasley", "Ginny"),
            ("Weasley", "Ron"),
        ]
    );

    let err = class_roster(&env.db, &Principal::teacher("t2"), CLASS_1A)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Authz(AuthzError::Forbidden { .. })));

    let err = class_roster(&env.db, &Principal::parent("p1"), CLASS_1A)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Authz(AuthzError::Unauthorized { .. })));

    let roster = class_roster(&env.db, &Principal::admin("a1"), CLASS_2B)
        .await
        .unwrap();
    assert!(roster.is_empty());
}

#[test]
fn records_must_share_lesson_and_day() {
    let record = |lesson_id, date: &str, student: &str| AttendanceRecord {
        date: at(date),
        present: true,
        student_id: student.into(),
        lesson_id,
    };

    let batch = AttendanceBatch::from_records(vec![
        record(3, "2024-09-02T08:00:00Z", "a"),
        record(3, "2024-09-02T17:30:00Z", "b"),
    ])
    .unwrap();
    assert_eq!(batch.lesson_id, 3);
    assert_eq!(batch.marks.len(), 2);
    assert_eq!(
        batch.day_range(),
        (at("2024-09-02T00:00:00Z"), at("2024-09-03T00:00:00Z"))
    );

    assert!(AttendanceBatch::from_records(vec![]).is_err());
    assert!(
        AttendanceBatch::from_records(vec![
            record(3, "2024-09-02T08:00:00Z", "a"),
            record(4, "2024-09-02T08:00:00Z", "b"),
        ])
        .is_err()
    );
    assert!(
        AttendanceBatch::from_records(vec![
            record(3, "2024-09-02T08:00:00Z", "a"),
            record(3, "2024-09-03T08:00:00Z", "b"),
        ])
        .is_err()
    );
}

#[tokio::test]
async fn single_marks_are_stored_in_utc_and_replaced_with_their_utc_day() {
    let env = setup().await;
    let teacher = Principal::teacher("t1");
    // 01:00 at +02:00 is 23:00 on 1 September in UTC.
    env.guard
        .execute(
            &teacher,
            school::Action::Create(school::Payload::Attendance(school::AttendanceInput {
                date: at("2024-09-02T01:00:00+02:00"),
                present: false,
                student_id: "s1".into(),
                lesson_id: LESSON_T1,
            })),
        )
        .await
        .unwrap();
    let stored = attendance::Entity::find().one(&env.db).await.unwrap().unwrap();
    assert_eq!(stored.date, at("2024-09-01T23:00:00Z"));
    assert_eq!(stored.date.offset().local_minus_utc(), 0);

    replace_attendance(
        &env.db,
        &teacher,
        batch(LESSON_T1, "2024-09-01T12:00:00Z", &["s1", "s2"]),
    )
    .await
    .unwrap();

    let rows = attendance::Entity::find()
        .filter(attendance::Column::StudentId.eq("s1"))
        .all(&env.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, at("2024-09-01T12:00:00Z"));
}
