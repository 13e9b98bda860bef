mod common;

use chrono::NaiveDate;
use common::*;
use entity::{parent, student, teacher, teacher_subject, Sex};
use platform_authz::{EntityKind, Principal, Role};
use school::{Action, ActionError, ParentInput, Payload, StudentInput, Target, TeacherInput};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn student_input(username: &str, class_id: i32, parent_id: &str) -> StudentInput {
    StudentInput {
        username: username.into(),
        password: Some("correct horse".into()),
        name: "Luna".into(),
        surname: "Lovegood".into(),
        email: Some(String::new()),
        phone: None,
        address: "Ottery St Catchpole".into(),
        img: None,
        blood_type: "B+".into(),
        sex: Sex::Female,
        birthday: NaiveDate::from_ymd_opt(2012, 2, 13).unwrap(),
        grade_id: 1,
        class_id,
        parent_id: parent_id.into(),
    }
}

#[tokio::test]
async fn full_class_rejects_student_before_any_write() {
    let env = setup().await;
    let before = student::Entity::find().count(&env.db).await.unwrap();

    let err = env
        .guard
        .execute(
            &Principal::admin("a1"),
            Action::Create(Payload::Student(student_input("lluna", CLASS_1A, "p1"))),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ActionError::ClassFull {
            class_id: CLASS_1A,
            capacity: 2
        }
    ));
    assert!(env.directory.calls().is_empty());
    assert_eq!(student::Entity::find().count(&env.db).await.unwrap(), before);
}

#[tokio::test]
async fn student_creation_registers_directory_user_first() {
    let env = setup().await;

    let created = env
        .guard
        .execute(
            &Principal::admin("a1"),
            Action::Create(Payload::Student(student_input("lluna", CLASS_2B, "p1"))),
        )
        .await
        .unwrap();

    let calls = env.directory.calls();
    let [DirectoryCall::Create(user)] = calls.as_slice() else {
        panic!("unexpected directory calls: {calls:?}");
    };
    assert_eq!(user.role, Role::Student);
    assert_eq!(user.username, "lluna");

    let row = student::Entity::find_by_id(created.id.clone())
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.class_id, CLASS_2B);
    assert_eq!(row.email, None);
}

#[tokio::test]
async fn failed_insert_removes_the_directory_user() {
    let env = setup().await;

    let err = env
        .guard
        .execute(
            &Principal::admin("a1"),
            Action::Create(Payload::Student(student_input("orphan", CLASS_2B, "missing-parent"))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Persistence(_)));

    let calls = env.directory.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], DirectoryCall::Create(_)));
    assert_eq!(calls[1], DirectoryCall::Delete("user_1".into()));
    assert!(student::Entity::find_by_id("user_1".to_string())
        .one(&env.db)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn moving_a_student_into_a_full_class_is_refused() {
    let env = setup().await;
    add_student(&env.db, "s3", "Neville", "Longbottom", CLASS_2B).await;

    let err = env
        .guard
        .execute(
            &Principal::admin("a1"),
            Action::Update(
                Target::Student("s3".into()),
                Payload::Student(student_input("nlongbottom", CLASS_1A, "p1")),
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ClassFull { .. }));
    assert!(env.directory.calls().is_empty());
}

#[tokio::test]
async fn teacher_lifecycle_follows_the_directory() {
    let env = setup().await;
    let admin = Principal::admin("a1");
    let input = TeacherInput {
        username: "mmcgonagall".into(),
        password: Some("transfiguration".into()),
        name: "Minerva".into(),
        surname: "McGonagall".into(),
        email: Some("minerva@hogwarts.test".into()),
        phone: None,
        address: "Gryffindor Tower".into(),
        img: None,
        blood_type: "AB+".into(),
        sex: Sex::Female,
        birthday: NaiveDate::from_ymd_opt(1935, 10, 4).unwrap(),
        subjects: vec![MATH],
    };

    let created = env
        .guard
        .execute(&admin, Action::Create(Payload::Teacher(input.clone())))
        .await
        .unwrap();
    let links = teacher_subject::Entity::find()
        .filter(teacher_subject::Column::TeacherId.eq(created.id.as_str()))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(links, 1);

    let mut renamed = input;
    renamed.password = Some(String::new());
    renamed.surname = "McGonagall-Urquart".into();
    renamed.subjects = vec![];
    env.guard
        .execute(
            &admin,
            Action::Update(Target::Teacher(created.id.clone()), Payload::Teacher(renamed)),
        )
        .await
        .unwrap();
    let calls = env.directory.calls();
    let DirectoryCall::Update(id, user) = &calls[1] else {
        panic!("expected an update, got {calls:?}");
    };
    assert_eq!(id, &created.id);
    assert_eq!(user.password, None);
    assert_eq!(user.last_name, "McGonagall-Urquart");
    let links = teacher_subject::Entity::find()
        .filter(teacher_subject::Column::TeacherId.eq(created.id.as_str()))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(links, 0);

    env.guard
        .execute(&admin, Action::Delete(Target::Teacher(created.id.clone())))
        .await
        .unwrap();
    assert_eq!(env.directory.calls()[2], DirectoryCall::Delete(created.id.clone()));
    assert!(teacher::Entity::find_by_id(created.id)
        .one(&env.db)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn parents_are_admin_only() {
    let env = setup().await;
    let input = ParentInput {
        username: "alovegood".into(),
        password: None,
        name: "Xenophilius".into(),
        surname: "Lovegood".into(),
        email: None,
        phone: "555-0199".into(),
        address: "Rook House".into(),
    };

    let err = env
        .guard
        .execute(
            &Principal::teacher("t1"),
            Action::Create(Payload::Parent(input.clone())),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Authz(_)));
    assert!(env.directory.calls().is_empty());

    let created = env
        .guard
        .execute(&Principal::admin("a1"), Action::Create(Payload::Parent(input)))
        .await
        .unwrap();
    assert_eq!(created.kind, EntityKind::Parent);
    assert!(parent::Entity::find_by_id(created.id)
        .one(&env.db)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn concurrent_enrolments_cannot_overfill_a_class() {
    let env = setup().await;
    add_class(&env.db, 3, "3C", 1).await;
    let admin = Principal::admin("a1");

    let (first, second) = tokio::join!(
        env.guard.execute(
            &admin,
            Action::Create(Payload::Student(student_input("lluna", 3, "p1"))),
        ),
        env.guard.execute(
            &admin,
            Action::Create(Payload::Student(student_input("cchang", 3, "p1"))),
        ),
    );

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
    let refused = if first.is_err() { first } else { second };
    assert!(matches!(refused, Err(ActionError::ClassFull { class_id: 3, .. })));
    let enrolled = student::Entity::find()
        .filter(student::Column::ClassId.eq(3))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(enrolled, 1);

    let calls = env.directory.calls();
    let created = calls
        .iter()
        .filter(|call| matches!(call, DirectoryCall::Create(_)))
        .count();
    let removed = calls
        .iter()
        .filter(|call| matches!(call, DirectoryCall::Delete(_)))
        .count();
    assert_eq!(created - removed, 1);
}
