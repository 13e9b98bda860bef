//! Demo school used for local development and the router tests.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use entity::{
    Day, Sex, announcement, class, event, exam, grade, lesson, parent, student, subject, teacher,
    teacher_subject,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, TransactionTrait,
};
use tracing::info;

pub const TEACHER_ADA: &str = "seed_teacher_ada";
pub const TEACHER_ALAN: &str = "seed_teacher_alan";
pub const PARENT_MOLLY: &str = "seed_parent_molly";
pub const STUDENT_RON: &str = "seed_student_ron";
pub const STUDENT_GINNY: &str = "seed_student_ginny";
pub const STUDENT_LUNA: &str = "seed_student_luna";

fn at(rfc3339: &str) -> Result<DateTime<FixedOffset>> {
    Ok(DateTime::parse_from_rfc3339(rfc3339)?)
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| anyhow::anyhow!("invalid date {y}-{m}-{d}"))
}

/// Inserts the demo school unless any grade already exists.
///
/// Person rows get fixed ids that no identity provider issued, so these
/// accounts cannot sign in; they only populate lists and dashboards.
pub async fn run(db: &DatabaseConnection) -> Result<()> {
    if grade::Entity::find().count(db).await? > 0 {
        info!("database already has data; seed skipped");
        return Ok(());
    }

    let txn = db.begin().await?;
    let created = at("2024-08-26T08:00:00Z")?;

    let mut grades = Vec::new();
    for level in 1..=3 {
        let row = grade::ActiveModel {
            level: Set(level),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        grades.push(row.id);
    }

    let math = insert_subject(&txn, "Mathematics").await?;
    let science = insert_subject(&txn, "Science").await?;
    let english = insert_subject(&txn, "English").await?;

    insert_teacher(&txn, TEACHER_ADA, "Ada", "Lovelace", date(1985, 12, 10)?, created).await?;
    insert_teacher(&txn, TEACHER_ALAN, "Alan", "Turing", date(1982, 6, 23)?, created).await?;
    let links = [(TEACHER_ADA, math), (TEACHER_ALAN, science), (TEACHER_ALAN, english)];
    teacher_subject::Entity::insert_many(links.into_iter().map(|(teacher_id, subject_id)| {
        teacher_subject::ActiveModel {
            teacher_id: Set(teacher_id.to_string()),
            subject_id: Set(subject_id),
        }
    }))
    .exec_without_returning(&txn)
    .await?;

    let class_1a = insert_class(&txn, "1A", grades[0], TEACHER_ADA).await?;
    let class_2b = insert_class(&txn, "2B", grades[1], TEACHER_ALAN).await?;

    parent::ActiveModel {
        id: Set(PARENT_MOLLY.into()),
        username: Set("mweasley".into()),
        name: Set("Molly".into()),
        surname: Set("Weasley".into()),
        email: Set(Some("molly@example.test".into())),
        phone: Set("555-0101".into()),
        address: Set("The Burrow".into()),
        created_at: Set(created),
    }
    .insert(&txn)
    .await?;

    let pupils = [
        (STUDENT_RON, "rweasley", "Ron", "Weasley", class_1a, grades[0]),
        (STUDENT_GINNY, "gweasley", "Ginny", "Weasley", class_1a, grades[0]),
        (STUDENT_LUNA, "llovegood", "Luna", "Lovegood", class_2b, grades[1]),
    ];
    for (id, username, name, surname, class_id, grade_id) in pupils {
        student::ActiveModel {
            id: Set(id.into()),
            username: Set(username.into()),
            name: Set(name.into()),
            surname: Set(surname.into()),
            email: Set(None),
            phone: Set(None),
            address: Set("Ottery St Catchpole".into()),
            img: Set(None),
            blood_type: Set("O+".into()),
            sex: Set(if name == "Ron" { Sex::Male } else { Sex::Female }),
            birthday: Set(date(2012, 3, 1)?),
            parent_id: Set(PARENT_MOLLY.into()),
            class_id: Set(class_id),
            grade_id: Set(grade_id),
            created_at: Set(created),
        }
        .insert(&txn)
        .await?;
    }

    let math_1a = lesson::ActiveModel {
        name: Set("Math 1A".into()),
        day: Set(Day::Monday),
        start_time: Set(at("2024-09-02T08:00:00Z")?),
        end_time: Set(at("2024-09-02T08:45:00Z")?),
        subject_id: Set(math),
        class_id: Set(class_1a),
        teacher_id: Set(TEACHER_ADA.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    lesson::ActiveModel {
        name: Set("Science 2B".into()),
        day: Set(Day::Wednesday),
        start_time: Set(at("2024-09-04T10:00:00Z")?),
        end_time: Set(at("2024-09-04T11:30:00Z")?),
        subject_id: Set(science),
        class_id: Set(class_2b),
        teacher_id: Set(TEACHER_ALAN.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    exam::ActiveModel {
        title: Set("Fractions quiz".into()),
        start_time: Set(at("2024-09-16T08:00:00Z")?),
        end_time: Set(at("2024-09-16T08:30:00Z")?),
        lesson_id: Set(math_1a.id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    event::ActiveModel {
        title: Set("Science fair".into()),
        description: Set("Projects on display in the main hall".into()),
        start_time: Set(at("2024-10-11T13:00:00Z")?),
        end_time: Set(at("2024-10-11T16:00:00Z")?),
        class_id: Set(Some(class_2b)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    announcement::ActiveModel {
        title: Set("Welcome back".into()),
        description: Set("Term starts on Monday 2 September".into()),
        date: Set(created),
        class_id: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(students = pupils.len(), teachers = 2, "demo school seeded");
    Ok(())
}

async fn insert_subject<C: ConnectionTrait>(db: &C, name: &str) -> Result<i32> {
    let row = subject::ActiveModel {
        name: Set(name.into()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row.id)
}

async fn insert_teacher<C: ConnectionTrait>(
    db: &C,
    id: &str,
    name: &str,
    surname: &str,
    birthday: NaiveDate,
    created: DateTime<FixedOffset>,
) -> Result<()> {
    teacher::ActiveModel {
        id: Set(id.into()),
        username: Set(format!("{}{}", &name[..1], surname).to_lowercase()),
        name: Set(name.into()),
        surname: Set(surname.into()),
        email: Set(Some(format!("{}@example.test", name.to_lowercase()))),
        phone: Set(None),
        address: Set("1 School Lane".into()),
        img: Set(None),
        blood_type: Set("A+".into()),
        sex: Set(if name == "Ada" { Sex::Female } else { Sex::Male }),
        birthday: Set(birthday),
        created_at: Set(created),
    }
    .insert(db)
    .await?;
    Ok(())
}

async fn insert_class<C: ConnectionTrait>(
    db: &C,
    name: &str,
    grade_id: i32,
    supervisor_id: &str,
) -> Result<i32> {
    let row = class::ActiveModel {
        name: Set(name.into()),
        capacity: Set(20),
        grade_id: Set(grade_id),
        supervisor_id: Set(Some(supervisor_id.into())),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row.id)
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    use super::*;

    #[tokio::test]
    async fn seeding_twice_is_a_no_op() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        run(&db).await.unwrap();
        run(&db).await.unwrap();

        assert_eq!(student::Entity::find().count(&db).await.unwrap(), 3);
        assert_eq!(lesson::Entity::find().count(&db).await.unwrap(), 2);
    }
}
