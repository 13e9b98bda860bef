//! Landing-page data for each role.

use chrono::NaiveDate;
use entity::{class, lesson, parent, student, teacher};
use platform_authz::{AuthzError, EntityKind, Operation, Principal, Role};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;

use crate::error::ActionResult;
use crate::schedule::{ScheduleSlot, align_to_week};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeadCounts {
    pub students: u64,
    pub teachers: u64,
    pub parents: u64,
    pub classes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSchedule {
    pub student_id: String,
    pub name: String,
    pub class_id: i32,
    pub class_name: Option<String>,
    pub schedule: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Admin {
        counts: HeadCounts,
    },
    Teacher {
        schedule: Vec<ScheduleSlot>,
    },
    Student {
        #[serde(rename = "classId")]
        class_id: Option<i32>,
        schedule: Vec<ScheduleSlot>,
    },
    Parent {
        children: Vec<ChildSchedule>,
    },
}

pub async fn dashboard(
    db: &DatabaseConnection,
    principal: &Principal,
    today: NaiveDate,
) -> ActionResult<Dashboard> {
    let user_id = principal.user_id.as_str();
    let view = match principal.role {
        Some(Role::Admin) => Dashboard::Admin {
            counts: HeadCounts {
                students: student::Entity::find().count(db).await?,
                teachers: teacher::Entity::find().count(db).await?,
                parents: parent::Entity::find().count(db).await?,
                classes: class::Entity::find().count(db).await?,
            },
        },
        Some(Role::Teacher) => {
            let lessons = lesson::Entity::find()
                .filter(lesson::Column::TeacherId.eq(user_id))
                .order_by_asc(lesson::Column::StartTime)
                .all(db)
                .await?;
            Dashboard::Teacher {
                schedule: weekly(&lessons, today),
            }
        }
        Some(Role::Student) => {
            let class_id = student::Entity::find_by_id(user_id.to_string())
                .one(db)
                .await?
                .map(|row| row.class_id);
            let schedule = match class_id {
                Some(class_id) => weekly(&class_lessons(db, class_id).await?, today),
                None => Vec::new(),
            };
            Dashboard::Student { class_id, schedule }
        }
        Some(Role::Parent) => {
            let children = student::Entity::find()
                .filter(student::Column::ParentId.eq(user_id))
                .order_by_asc(student::Column::Name)
                .find_also_related(class::Entity)
                .all(db)
                .await?;
            let mut views = Vec::with_capacity(children.len());
            for (child, class) in children {
                let lessons = class_lessons(db, child.class_id).await?;
                views.push(ChildSchedule {
                    student_id: child.id,
                    name: child.name,
                    class_id: child.class_id,
                    class_name: class.map(|c| c.name),
                    schedule: weekly(&lessons, today),
                });
            }
            Dashboard::Parent { children: views }
        }
        None => {
            let err = AuthzError::unauthorized(None, Operation::Read, EntityKind::Lesson);
            return Err(err.into());
        }
    };
    Ok(view)
}

async fn class_lessons(
    db: &DatabaseConnection,
    class_id: i32,
) -> Result<Vec<lesson::Model>, sea_orm::DbErr> {
    lesson::Entity::find()
        .filter(lesson::Column::ClassId.eq(class_id))
        .order_by_asc(lesson::Column::StartTime)
        .all(db)
        .await
}

fn weekly(lessons: &[lesson::Model], today: NaiveDate) -> Vec<ScheduleSlot> {
    let slots: Vec<ScheduleSlot> = lessons.iter().map(ScheduleSlot::from).collect();
    align_to_week(&slots, today)
}
