//! Paged, role-scoped list queries.
//!
//! Students and parents reach these lists too, so the principal narrows the
//! query itself; the action guard is not involved in reads.

use entity::{attendance, class, lesson, student, subject, teacher};
use platform_authz::{AuthzError, EntityKind, Operation, Principal, Role};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func, IntoColumnRef, LikeExpr};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};

use crate::error::ActionResult;

pub const ITEM_PER_PAGE: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(ITEM_PER_PAGE)
    }
}

/// Databases bind OFFSET as a signed 64-bit integer.
const MAX_PAGE: u64 = i64::MAX as u64 / ITEM_PER_PAGE;

/// 1-based; anything below 1 reads as the first page and anything past
/// [`MAX_PAGE`] as the last addressable one.
fn offset(page: u64) -> (u64, u64) {
    let page = page.clamp(1, MAX_PAGE);
    (page, (page - 1) * ITEM_PER_PAGE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFilter {
    pub class_id: Option<i32>,
    pub student_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub id: i32,
    pub date: DateTimeWithTimeZone,
    pub present: bool,
    pub student_id: String,
    pub student_name: String,
    pub student_surname: String,
    pub student_username: String,
    pub lesson_id: i32,
    pub lesson_name: String,
    pub subject_name: String,
    pub class_name: String,
}

const LIKE_ESCAPE: char = '\\';

/// Lower-cased substring pattern. `%` and `_` in the search text are
/// escaped so they match themselves; pair it with [`like`].
fn search_pattern(search: &Option<String>) -> Option<String> {
    let search = search.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.to_lowercase().chars() {
        if matches!(ch, '%' | '_') || ch == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}

fn like(pattern: &str) -> LikeExpr {
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

fn lower<C: IntoColumnRef>(column: C) -> Expr {
    Expr::expr(Func::lower(Expr::col(column)))
}

/// Attendance visible to the principal: everything for admins, rows of
/// their own lessons for teachers, their own rows for students and their
/// children's rows for parents. Newest first unless sorted by student name.
pub async fn list_attendance(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &AttendanceFilter,
    page: u64,
    sort: Option<SortOrder>,
) -> ActionResult<Page<AttendanceRow>> {
    let mut query = attendance::Entity::find()
        .join(JoinType::InnerJoin, attendance::Relation::Student.def())
        .join(JoinType::InnerJoin, attendance::Relation::Lesson.def())
        .join(JoinType::InnerJoin, lesson::Relation::Subject.def())
        .join(JoinType::InnerJoin, lesson::Relation::Class.def());

    let user_id = principal.user_id.as_str();
    query = match principal.role {
        Some(Role::Admin) => query,
        Some(Role::Teacher) => query.filter(lesson::Column::TeacherId.eq(user_id)),
        Some(Role::Student) => query.filter(attendance::Column::StudentId.eq(user_id)),
        Some(Role::Parent) => query.filter(student::Column::ParentId.eq(user_id)),
        None => {
            let err = AuthzError::unauthorized(None, Operation::Read, EntityKind::Attendance);
            return Err(err.into());
        }
    };

    if let Some(class_id) = filter.class_id {
        query = query.filter(lesson::Column::ClassId.eq(class_id));
    }
    if let Some(student_id) = filter.student_id.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(attendance::Column::StudentId.eq(student_id));
    }
    if let Some(pattern) = search_pattern(&filter.search) {
        let student_name = lower((student::Entity, student::Column::Name));
        query = query.filter(student_name.like(like(&pattern)));
    }

    let total = query.clone().count(db).await?;

    query = match sort {
        Some(SortOrder::Asc) => query.order_by_asc(student::Column::Name),
        Some(SortOrder::Desc) => query.order_by_desc(student::Column::Name),
        None => query.order_by_desc(attendance::Column::Date),
    };
    let (page, skip) = offset(page);
    let items = query
        .order_by_desc(attendance::Column::Id)
        .select_only()
        .column(attendance::Column::Id)
        .column(attendance::Column::Date)
        .column(attendance::Column::Present)
        .column(attendance::Column::StudentId)
        .column(attendance::Column::LessonId)
        .column_as(student::Column::Name, "student_name")
        .column_as(student::Column::Surname, "student_surname")
        .column_as(student::Column::Username, "student_username")
        .column_as(lesson::Column::Name, "lesson_name")
        .column_as(subject::Column::Name, "subject_name")
        .column_as(class::Column::Name, "class_name")
        .limit(ITEM_PER_PAGE)
        .offset(skip)
        .into_model::<AttendanceRow>()
        .all(db)
        .await?;

    Ok(Page { items, total, page })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonFilter {
    pub class_id: Option<i32>,
    pub teacher_id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct LessonRow {
    pub id: i32,
    pub name: String,
    pub subject_name: String,
    pub class_id: i32,
    pub class_name: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub teacher_surname: String,
}

/// Lessons ordered by subject name. Teachers only see lessons they teach.
pub async fn list_lessons(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &LessonFilter,
    page: u64,
    sort: Option<SortOrder>,
) -> ActionResult<Page<LessonRow>> {
    let mut query = lesson::Entity::find()
        .join(JoinType::InnerJoin, lesson::Relation::Subject.def())
        .join(JoinType::InnerJoin, lesson::Relation::Class.def())
        .join(JoinType::InnerJoin, lesson::Relation::Teacher.def());

    let user_id = principal.user_id.as_str();
    query = match principal.role {
        Some(Role::Admin) => query,
        Some(Role::Teacher) => query.filter(lesson::Column::TeacherId.eq(user_id)),
        role @ (Some(Role::Student) | Some(Role::Parent) | None) => {
            let err = AuthzError::unauthorized(role, Operation::Read, EntityKind::Lesson);
            return Err(err.into());
        }
    };

    if let Some(class_id) = filter.class_id {
        query = query.filter(lesson::Column::ClassId.eq(class_id));
    }
    if let Some(teacher_id) = filter.teacher_id.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(lesson::Column::TeacherId.eq(teacher_id));
    }
    if let Some(pattern) = search_pattern(&filter.search) {
        let subject_name = lower((subject::Entity, subject::Column::Name));
        let teacher_name = lower((teacher::Entity, teacher::Column::Name));
        query = query.filter(
            Condition::any()
                .add(subject_name.like(like(&pattern)))
                .add(teacher_name.like(like(&pattern))),
        );
    }

    let total = query.clone().count(db).await?;

    query = match sort {
        Some(SortOrder::Desc) => query.order_by_desc(subject::Column::Name),
        Some(SortOrder::Asc) | None => query.order_by_asc(subject::Column::Name),
    };
    let (page, skip) = offset(page);
    let items = query
        .order_by_asc(lesson::Column::Id)
        .select_only()
        .column(lesson::Column::Id)
        .column(lesson::Column::Name)
        .column(lesson::Column::ClassId)
        .column(lesson::Column::TeacherId)
        .column_as(subject::Column::Name, "subject_name")
        .column_as(class::Column::Name, "class_name")
        .column_as(teacher::Column::Name, "teacher_name")
        .column_as(teacher::Column::Surname, "teacher_surname")
        .limit(ITEM_PER_PAGE)
        .offset(skip)
        .into_model::<LessonRow>()
        .all(db)
        .await?;

    Ok(Page { items, total, page })
}
