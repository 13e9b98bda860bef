use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use entity::{Day, Sex, attendance, class, grade, lesson, parent, student, subject, teacher};
use migration::{Migrator, MigratorTrait};
use platform_authz::Principal;
use platform_db::{DatabaseSettings, connect};
use school::{AttendanceBatch, AttendanceMark, replace_attendance};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use suite_tests::postgres;
use testcontainers::clients::Cli;

fn at(rfc3339: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

/// One teacher, one class of `pupils` students and a lesson. Returns the
/// lesson id and the student ids.
async fn school(db: &DatabaseConnection, pupils: usize) -> Result<(i32, Vec<String>)> {
    let created = at("2024-08-26T08:00:00Z");
    let grade = grade::ActiveModel {
        level: Set(1),
        ..Default::default()
    }
    .insert(db)
    .await?;
    let subject = subject::ActiveModel {
        name: Set("Mathematics".into()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    teacher::ActiveModel {
        id: Set("t1".into()),
        username: Set("ada".into()),
        name: Set("Ada".into()),
        surname: Set("Lovelace".into()),
        email: Set(None),
        phone: Set(None),
        address: Set("1 School Lane".into()),
        img: Set(None),
        blood_type: Set("A+".into()),
        sex: Set(Sex::Female),
        birthday: Set(NaiveDate::from_ymd_opt(1985, 12, 10).unwrap()),
        created_at: Set(created),
    }
    .insert(db)
    .await?;
    let class = class::ActiveModel {
        name: Set("1A".into()),
        capacity: Set(30),
        grade_id: Set(grade.id),
        supervisor_id: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    parent::ActiveModel {
        id: Set("p1".into()),
        username: Set("molly".into()),
        name: Set("Molly".into()),
        surname: Set("Weasley".into()),
        email: Set(None),
        phone: Set("555-0101".into()),
        address: Set("The Burrow".into()),
        created_at: Set(created),
    }
    .insert(db)
    .await?;

    let mut ids = Vec::with_capacity(pupils);
    for n in 0..pupils {
        let id = format!("s{n:02}");
        student::ActiveModel {
            id: Set(id.clone()),
            username: Set(format!("pupil{n:02}")),
            name: Set("Pupil".into()),
            surname: Set(format!("No{n:02}")),
            email: Set(None),
            phone: Set(None),
            address: Set("Somewhere".into()),
            img: Set(None),
            blood_type: Set("O+".into()),
            sex: Set(if n % 2 == 0 { Sex::Female } else { Sex::Male }),
            birthday: Set(NaiveDate::from_ymd_opt(2012, 1, 1).unwrap()),
            parent_id: Set("p1".into()),
            class_id: Set(class.id),
            grade_id: Set(grade.id),
            created_at: Set(created),
        }
        .insert(db)
        .await?;
        ids.push(id);
    }

    let lesson = lesson::ActiveModel {
        name: Set("Math 1A".into()),
        day: Set(Day::Monday),
        start_time: Set(at("2024-09-02T08:00:00Z")),
        end_time: Set(at("2024-09-02T08:45:00Z")),
        subject_id: Set(subject.id),
        class_id: Set(class.id),
        teacher_id: Set("t1".into()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok((lesson.id, ids))
}

fn batch(lesson_id: i32, date: &str, students: &[String]) -> AttendanceBatch {
    AttendanceBatch {
        lesson_id,
        date: at(date),
        marks: students
            .iter()
            .map(|id| AttendanceMark {
                student_id: id.clone(),
                present: true,
            })
            .collect(),
    }
}

async fn rows_on_day(db: &DatabaseConnection, lesson_id: i32, day: &str) -> Result<u64> {
    let from = at(&format!("{day}T00:00:00Z"));
    Ok(attendance::Entity::find()
        .filter(attendance::Column::LessonId.eq(lesson_id))
        .filter(attendance::Column::Date.gte(from))
        .filter(attendance::Column::Date.lt(from + chrono::Duration::days(1)))
        .count(db)
        .await?)
}

#[tokio::test]
#[ignore = "needs a Docker daemon"]
async fn replace_is_atomic_per_lesson_day_on_postgres() -> Result<()> {
    let docker = Cli::default();
    let pg = postgres(&docker);
    let db = connect(&DatabaseSettings::new(pg.url.clone())).await?;
    Migrator::up(&db, None).await?;

    let (lesson_id, students) = school(&db, 25).await?;
    let teacher = Principal::teacher("t1");

    let created = replace_attendance(
        &db,
        &teacher,
        batch(lesson_id, "2024-09-02T08:05:00Z", &students),
    )
    .await?;
    assert_eq!(created, 25);
    assert_eq!(rows_on_day(&db, lesson_id, "2024-09-02").await?, 25);

    // 01:30 at +02:00 is still 2 September in UTC.
    let created = replace_attendance(
        &db,
        &teacher,
        batch(lesson_id, "2024-09-03T01:30:00+02:00", &students[..3]),
    )
    .await?;
    assert_eq!(created, 3);
    assert_eq!(rows_on_day(&db, lesson_id, "2024-09-02").await?, 3);
    assert_eq!(rows_on_day(&db, lesson_id, "2024-09-03").await?, 0);

    let mut rejected = batch(lesson_id, "2024-09-02T09:00:00Z", &students[..2]);
    rejected.marks.push(AttendanceMark {
        student_id: "nobody".into(),
        present: false,
    });
    assert!(replace_attendance(&db, &teacher, rejected).await.is_err());
    assert_eq!(rows_on_day(&db, lesson_id, "2024-09-02").await?, 3);
    Ok(())
}
