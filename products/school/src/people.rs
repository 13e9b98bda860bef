//! Teachers, students and parents.
//!
//! These rows mirror accounts held by the identity directory, so each
//! mutation writes to the directory as well as the database. Creation goes
//! directory first because the row's primary key is the directory's user id.

use std::collections::BTreeSet;

use entity::{class, parent, student, teacher, teacher_subject};
use platform_authn::{DirectoryUser, IdentityDirectory};
use platform_authz::{EntityKind, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, TransactionTrait,
};

use crate::error::{ActionError, ActionResult};
use crate::payload::{ParentInput, StudentInput, TeacherInput, non_empty};
use crate::persist::now;

fn directory_user(
    role: Role,
    username: &str,
    password: &Option<String>,
    name: &str,
    surname: &str,
) -> DirectoryUser {
    DirectoryUser {
        username: username.trim().to_string(),
        password: non_empty(password),
        first_name: name.trim().to_string(),
        last_name: surname.trim().to_string(),
        role,
    }
}

/// Removes a directory user whose database row could not be written.
async fn compensate(directory: &dyn IdentityDirectory, user_id: &str, cause: &ActionError) {
    match directory.delete_user(user_id).await {
        Ok(()) => tracing::warn!(
            user_id,
            error = %cause,
            "database write failed; directory user removed"
        ),
        Err(err) => tracing::error!(
            user_id,
            error = %cause,
            compensation_error = %err,
            "database write failed and directory user could not be removed"
        ),
    }
}

pub(crate) async fn create_teacher(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    input: &TeacherInput,
) -> ActionResult<String> {
    let user = directory_user(
        Role::Teacher,
        &input.username,
        &input.password,
        &input.name,
        &input.surname,
    );
    let user_id = directory.create_user(&user).await?;
    if let Err(err) = insert_teacher(db, &user_id, input).await {
        compensate(directory, &user_id, &err).await;
        return Err(err);
    }
    Ok(user_id)
}

async fn insert_teacher(
    db: &DatabaseConnection,
    user_id: &str,
    input: &TeacherInput,
) -> ActionResult<()> {
    let txn = db.begin().await?;
    teacher::ActiveModel {
        id: Set(user_id.to_string()),
        username: Set(input.username.trim().to_string()),
        name: Set(input.name.trim().to_string()),
        surname: Set(input.surname.trim().to_string()),
        email: Set(non_empty(&input.email)),
        phone: Set(non_empty(&input.phone)),
        address: Set(input.address.clone()),
        img: Set(non_empty(&input.img)),
        blood_type: Set(input.blood_type.trim().to_string()),
        sex: Set(input.sex),
        birthday: Set(input.birthday),
        created_at: Set(now()),
    }
    .insert(&txn)
    .await?;
    link_teacher_subjects(&txn, user_id, &input.subjects).await?;
    txn.commit().await?;
    Ok(())
}

pub(crate) async fn update_teacher(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    id: &str,
    input: &TeacherInput,
) -> ActionResult<()> {
    let user = directory_user(
        Role::Teacher,
        &input.username,
        &input.password,
        &input.name,
        &input.surname,
    );
    directory.update_user(id, &user).await?;

    let txn = db.begin().await?;
    teacher::ActiveModel {
        id: Set(id.to_string()),
        username: Set(input.username.trim().to_string()),
        name: Set(input.name.trim().to_string()),
        surname: Set(input.surname.trim().to_string()),
        email: Set(non_empty(&input.email)),
        phone: Set(non_empty(&input.phone)),
        address: Set(input.address.clone()),
        img: Set(non_empty(&input.img)),
        blood_type: Set(input.blood_type.trim().to_string()),
        sex: Set(input.sex),
        birthday: Set(input.birthday),
        ..Default::default()
    }
    .update(&txn)
    .await?;
    teacher_subject::Entity::delete_many()
        .filter(teacher_subject::Column::TeacherId.eq(id))
        .exec(&txn)
        .await?;
    link_teacher_subjects(&txn, id, &input.subjects).await?;
    txn.commit().await?;
    Ok(())
}

pub(crate) async fn delete_teacher(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    id: &str,
) -> ActionResult<()> {
    directory.delete_user(id).await?;
    teacher::Entity::delete_by_id(id.to_string()).exec(db).await?;
    Ok(())
}

async fn link_teacher_subjects<C: ConnectionTrait>(
    db: &C,
    teacher_id: &str,
    subject_ids: &[i32],
) -> ActionResult<()> {
    if subject_ids.is_empty() {
        return Ok(());
    }
    let unique: BTreeSet<i32> = subject_ids.iter().copied().collect();
    let links = unique.into_iter().map(|subject_id| teacher_subject::ActiveModel {
        teacher_id: Set(teacher_id.to_string()),
        subject_id: Set(subject_id),
    });
    teacher_subject::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Fails with [`ActionError::ClassFull`] when the class has no free seat.
///
/// The class row is locked (`FOR UPDATE` where the store supports it), so
/// inside a transaction concurrent enrolments into the same class queue up
/// behind the count.
async fn ensure_seat<C: ConnectionTrait>(db: &C, class_id: i32) -> ActionResult<()> {
    let class = class::Entity::find_by_id(class_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| ActionError::invalid(format!("class {class_id} does not exist")))?;
    let enrolled = student::Entity::find()
        .filter(student::Column::ClassId.eq(class_id))
        .count(db)
        .await?;
    if enrolled >= u64::try_from(class.capacity).unwrap_or(0) {
        return Err(ActionError::ClassFull {
            class_id,
            capacity: class.capacity,
        });
    }
    Ok(())
}

fn student_row(id: &str, input: &StudentInput) -> student::ActiveModel {
    student::ActiveModel {
        id: Set(id.to_string()),
        username: Set(input.username.trim().to_string()),
        name: Set(input.name.trim().to_string()),
        surname: Set(input.surname.trim().to_string()),
        email: Set(non_empty(&input.email)),
        phone: Set(non_empty(&input.phone)),
        address: Set(input.address.clone()),
        img: Set(non_empty(&input.img)),
        blood_type: Set(input.blood_type.trim().to_string()),
        sex: Set(input.sex),
        birthday: Set(input.birthday),
        parent_id: Set(input.parent_id.clone()),
        class_id: Set(input.class_id),
        grade_id: Set(input.grade_id),
        ..Default::default()
    }
}

/// Seat check and insert in one transaction.
async fn enrol_student(
    db: &DatabaseConnection,
    user_id: &str,
    input: &StudentInput,
) -> ActionResult<()> {
    let txn = db.begin().await?;
    ensure_seat(&txn, input.class_id).await?;
    let mut row = student_row(user_id, input);
    row.created_at = Set(now());
    row.insert(&txn).await?;
    txn.commit().await?;
    Ok(())
}

pub(crate) async fn create_student(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    input: &StudentInput,
) -> ActionResult<String> {
    ensure_seat(db, input.class_id).await?;

    let user = directory_user(
        Role::Student,
        &input.username,
        &input.password,
        &input.name,
        &input.surname,
    );
    let user_id = directory.create_user(&user).await?;
    if let Err(err) = enrol_student(db, &user_id, input).await {
        compensate(directory, &user_id, &err).await;
        return Err(err);
    }
    Ok(user_id)
}

pub(crate) async fn update_student(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    id: &str,
    input: &StudentInput,
) -> ActionResult<()> {
    let current = student::Entity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| ActionError::not_found(EntityKind::Student, id))?;
    if current.class_id != input.class_id {
        ensure_seat(db, input.class_id).await?;
    }

    let user = directory_user(
        Role::Student,
        &input.username,
        &input.password,
        &input.name,
        &input.surname,
    );
    directory.update_user(id, &user).await?;

    let txn = db.begin().await?;
    if current.class_id != input.class_id {
        ensure_seat(&txn, input.class_id).await?;
    }
    student_row(id, input).update(&txn).await?;
    txn.commit().await?;
    Ok(())
}

pub(crate) async fn delete_student(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    id: &str,
) -> ActionResult<()> {
    directory.delete_user(id).await?;
    student::Entity::delete_by_id(id.to_string()).exec(db).await?;
    Ok(())
}

pub(crate) async fn create_parent(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    input: &ParentInput,
) -> ActionResult<String> {
    let user = directory_user(
        Role::Parent,
        &input.username,
        &input.password,
        &input.name,
        &input.surname,
    );
    let user_id = directory.create_user(&user).await?;
    let inserted = parent::ActiveModel {
        id: Set(user_id.clone()),
        username: Set(input.username.trim().to_string()),
        name: Set(input.name.trim().to_string()),
        surname: Set(input.surname.trim().to_string()),
        email: Set(non_empty(&input.email)),
        phone: Set(input.phone.trim().to_string()),
        address: Set(input.address.clone()),
        created_at: Set(now()),
    }
    .insert(db)
    .await;
    if let Err(err) = inserted {
        let err = ActionError::from(err);
        compensate(directory, &user_id, &err).await;
        return Err(err);
    }
    Ok(user_id)
}

pub(crate) async fn update_parent(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    id: &str,
    input: &ParentInput,
) -> ActionResult<()> {
    let user = directory_user(
        Role::Parent,
        &input.username,
        &input.password,
        &input.name,
        &input.surname,
    );
    directory.update_user(id, &user).await?;

    parent::ActiveModel {
        id: Set(id.to_string()),
        username: Set(input.username.trim().to_string()),
        name: Set(input.name.trim().to_string()),
        surname: Set(input.surname.trim().to_string()),
        email: Set(non_empty(&input.email)),
        phone: Set(input.phone.trim().to_string()),
        address: Set(input.address.clone()),
        ..Default::default()
    }
    .update(db)
    .await?;
    Ok(())
}

pub(crate) async fn delete_parent(
    db: &DatabaseConnection,
    directory: &dyn IdentityDirectory,
    id: &str,
) -> ActionResult<()> {
    directory.delete_user(id).await?;
    parent::Entity::delete_by_id(id.to_string()).exec(db).await?;
    Ok(())
}
