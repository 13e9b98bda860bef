#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use entity::{class, exam, grade, lesson, parent, student, subject, teacher, Day, Sex};
use migration::{Migrator, MigratorTrait};
use platform_authn::{DirectoryError, DirectoryUser, IdentityDirectory};
use school::ActionGuard;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Create(DirectoryUser),
    Update(String, DirectoryUser),
    Delete(String),
}

/// In-memory directory that records every call and hands out sequential ids.
#[derive(Debug, Default)]
pub struct RecordingDirectory {
    calls: Mutex<Vec<DirectoryCall>>,
}

impl RecordingDirectory {
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityDirectory for RecordingDirectory {
    async fn create_user(&self, user: &DirectoryUser) -> Result<String, DirectoryError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(DirectoryCall::Create(user.clone()));
        Ok(format!("user_{}", calls.len()))
    }

    async fn update_user(&self, id: &str, user: &DirectoryUser) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .unwrap()
            .push(DirectoryCall::Update(id.to_string(), user.clone()));
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .unwrap()
            .push(DirectoryCall::Delete(id.to_string()));
        Ok(())
    }
}

pub struct TestEnv {
    pub db: DatabaseConnection,
    pub directory: Arc<RecordingDirectory>,
    pub guard: ActionGuard,
}

pub const CLASS_1A: i32 = 1;
pub const CLASS_2B: i32 = 2;
pub const MATH: i32 = 1;
/// Taught by `t1` in class 1A.
pub const LESSON_T1: i32 = 1;
/// Taught by `t2` in class 2B.
pub const LESSON_T2: i32 = 2;
/// Exam of `LESSON_T1`.
pub const EXAM_T1: i32 = 1;

pub fn at(rfc3339: &str) -> DateTimeWithTimeZone {
    DateTime::parse_from_rfc3339(rfc3339).unwrap()
}

/// Schema plus a small school: teachers `t1` and `t2`, parent `p1`, class 1A
/// (capacity 2, full with `s1` and `s2`) and class 2B (capacity 30, empty).
pub async fn setup() -> TestEnv {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    grade::ActiveModel {
        id: Set(1),
        level: Set(1),
    }
    .insert(&db)
    .await
    .unwrap();
    subject::ActiveModel {
        id: Set(MATH),
        name: Set("Mathematics".into()),
    }
    .insert(&db)
    .await
    .unwrap();
    add_teacher(&db, "t1", "Ada").await;
    add_teacher(&db, "t2", "Grace").await;
    add_class(&db, CLASS_1A, "1A", 2).await;
    add_class(&db, CLASS_2B, "2B", 30).await;
    parent::ActiveModel {
        id: Set("p1".into()),
        username: Set("pweasley".into()),
        name: Set("Molly".into()),
        surname: Set("Weasley".into()),
        email: Set(None),
        phone: Set("555-0101".into()),
        address: Set("The Burrow".into()),
        created_at: Set(at("2024-01-01T00:00:00Z")),
    }
    .insert(&db)
    .await
    .unwrap();
    add_student(&db, "s1", "Ron", "Weasley", CLASS_1A).await;
    add_student(&db, "s2", "Ginny", "Weasley", CLASS_1A).await;

    add_lesson(&db, LESSON_T1, "Math 1A", CLASS_1A, "t1").await;
    add_lesson(&db, LESSON_T2, "Math 2B", CLASS_2B, "t2").await;
    exam::ActiveModel {
        id: Set(EXAM_T1),
        title: Set("Fractions quiz".into()),
        start_time: Set(at("2024-09-02T09:00:00Z")),
        end_time: Set(at("2024-09-02T09:30:00Z")),
        lesson_id: Set(LESSON_T1),
    }
    .insert(&db)
    .await
    .unwrap();

    let directory = Arc::new(RecordingDirectory::default());
    let guard = ActionGuard::new(db.clone(), directory.clone());
    TestEnv {
        db,
        directory,
        guard,
    }
}

pub async fn add_teacher(db: &DatabaseConnection, id: &str, name: &str) {
    teacher::ActiveModel {
        id: Set(id.into()),
        username: Set(format!("{id}_user")),
        name: Set(name.into()),
        surname: Set("Teacher".into()),
        email: Set(None),
        phone: Set(None),
        address: Set("School Road 1".into()),
        img: Set(None),
        blood_type: Set("A+".into()),
        sex: Set(Sex::Female),
        birthday: Set(NaiveDate::from_ymd_opt(1980, 5, 17).unwrap()),
        created_at: Set(at("2024-01-01T00:00:00Z")),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn add_class(db: &DatabaseConnection, id: i32, name: &str, capacity: i32) {
    class::ActiveModel {
        id: Set(id),
        name: Set(name.into()),
        capacity: Set(capacity),
        supervisor_id: Set(None),
        grade_id: Set(1),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn add_student(db: &DatabaseConnection, id: &str, name: &str, surname: &str, class_id: i32) {
    student::ActiveModel {
        id: Set(id.into()),
        username: Set(format!("{id}_user")),
        name: Set(name.into()),
        surname: Set(surname.into()),
        email: Set(None),
        phone: Set(None),
        address: Set("Somewhere 2".into()),
        img: Set(None),
        blood_type: Set("0-".into()),
        sex: Set(Sex::Other),
        birthday: Set(NaiveDate::from_ymd_opt(2012, 3, 1).unwrap()),
        parent_id: Set("p1".into()),
        class_id: Set(class_id),
        grade_id: Set(1),
        created_at: Set(at("2024-01-01T00:00:00Z")),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn add_lesson(db: &DatabaseConnection, id: i32, name: &str, class_id: i32, teacher_id: &str) {
    lesson::ActiveModel {
        id: Set(id),
        name: Set(name.into()),
        day: Set(Day::Monday),
        start_time: Set(at("2024-09-02T08:00:00Z")),
        end_time: Set(at("2024-09-02T08:45:00Z")),
        subject_id: Set(MATH),
        class_id: Set(class_id),
        teacher_id: Set(teacher_id.into()),
    }
    .insert(db)
    .await
    .unwrap();
}
