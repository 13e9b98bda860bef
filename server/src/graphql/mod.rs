mod me;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Json, Object, Schema, SimpleObject};
use platform_api::{ApiError, ApiResult, internal_error};
use platform_authz::{ActionState, Principal};
use school::{
    Action, ActionError, ActionGuard, AnnouncementInput, AssignmentInput, AttendanceInput, ClassInput,
    EventInput, ExamInput, LessonInput, ParentInput, Payload, ResultInput, StudentInput,
    RosterEntry, SubjectInput, Target, TeacherInput, class_roster,
};
use serde::Serialize;
use tracing::instrument;

pub use me::MePayload;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(guard: ActionGuard) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(guard)
        .finish()
}

fn principal<'c>(ctx: &Context<'c>) -> async_graphql::Result<&'c Principal> {
    ctx.data::<Principal>()
        .map_err(|_| ApiError::Unauthenticated.extend())
}

fn guard<'c>(ctx: &Context<'c>) -> async_graphql::Result<&'c ActionGuard> {
    ctx.data::<ActionGuard>()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("action guard missing")).extend())
}

fn action_error(err: ActionError) -> async_graphql::Error {
    let api = match err {
        ActionError::Directory(_) | ActionError::Persistence(_) => return internal_error(err),
        ActionError::Authz(ref denied) => ApiError::from(denied),
        ActionError::NotFound { .. } => ApiError::NotFound(err.to_string()),
        ActionError::InvalidInput(ref message) => ApiError::InvalidInput(message.clone()),
        ActionError::ClassFull { .. } => ApiError::InvalidInput(err.to_string()),
    };
    tracing::warn!(class = err.class(), error = %err, "query rejected");
    api.extend()
}

/// Runs an action through the guard. Denials and failures come back as
/// `{success: false, error: true}`; only a missing session is a GraphQL
/// error.
async fn run(ctx: &Context<'_>, action: Action) -> async_graphql::Result<ActionStatePayload> {
    let principal = principal(ctx)?;
    Ok(guard(ctx)?.run(principal, action).await.into())
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> ApiResult<HealthPayload> {
        Ok(HealthPayload { ok: true })
    }

    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        Ok(MePayload::from(principal(ctx)?))
    }

    /// Students of a class, for the attendance sheet.
    #[instrument(name = "graphql.class_roster", skip_all, fields(class_id = class_id))]
    async fn class_roster(
        &self,
        ctx: &Context<'_>,
        class_id: i32,
    ) -> async_graphql::Result<Vec<RosterStudent>> {
        let principal = principal(ctx)?;
        let roster = class_roster(guard(ctx)?.db(), principal, class_id)
            .await
            .map_err(action_error)?;
        Ok(roster.into_iter().map(RosterStudent::from).collect())
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> ApiResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RosterStudent {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub username: String,
}

impl From<RosterEntry> for RosterStudent {
    fn from(entry: RosterEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            surname: entry.surname,
            username: entry.username,
        }
    }
}

#[derive(Clone, Copy, Debug, SimpleObject, Serialize)]
#[graphql(name = "ActionState")]
pub struct ActionStatePayload {
    pub success: bool,
    pub error: bool,
}

impl From<ActionState> for ActionStatePayload {
    fn from(state: ActionState) -> Self {
        Self {
            success: state.success,
            error: state.error,
        }
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    #[instrument(name = "graphql.create_subject", skip_all)]
    async fn create_subject(
        &self,
        ctx: &Context<'_>,
        input: Json<SubjectInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Subject(input.0))).await
    }

    #[instrument(name = "graphql.update_subject", skip_all, fields(id = id))]
    async fn update_subject(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<SubjectInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Subject(id), Payload::Subject(input.0))).await
    }

    #[instrument(name = "graphql.delete_subject", skip_all, fields(id = id))]
    async fn delete_subject(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Subject(id))).await
    }

    #[instrument(name = "graphql.create_class", skip_all)]
    async fn create_class(
        &self,
        ctx: &Context<'_>,
        input: Json<ClassInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Class(input.0))).await
    }

    #[instrument(name = "graphql.update_class", skip_all, fields(id = id))]
    async fn update_class(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<ClassInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Class(id), Payload::Class(input.0))).await
    }

    #[instrument(name = "graphql.delete_class", skip_all, fields(id = id))]
    async fn delete_class(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Class(id))).await
    }

    #[instrument(name = "graphql.create_teacher", skip_all)]
    async fn create_teacher(
        &self,
        ctx: &Context<'_>,
        input: Json<TeacherInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Teacher(input.0))).await
    }

    #[instrument(name = "graphql.update_teacher", skip_all, fields(id = %id))]
    async fn update_teacher(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: Json<TeacherInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Teacher(id), Payload::Teacher(input.0))).await
    }

    #[instrument(name = "graphql.delete_teacher", skip_all, fields(id = %id))]
    async fn delete_teacher(
        &self,
        ctx: &Context<'_>,
        id: String,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Teacher(id))).await
    }

    #[instrument(name = "graphql.create_student", skip_all)]
    async fn create_student(
        &self,
        ctx: &Context<'_>,
        input: Json<StudentInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Student(input.0))).await
    }

    #[instrument(name = "graphql.update_student", skip_all, fields(id = %id))]
    async fn update_student(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: Json<StudentInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Student(id), Payload::Student(input.0))).await
    }

    #[instrument(name = "graphql.delete_student", skip_all, fields(id = %id))]
    async fn delete_student(
        &self,
        ctx: &Context<'_>,
        id: String,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Student(id))).await
    }

    #[instrument(name = "graphql.create_parent", skip_all)]
    async fn create_parent(
        &self,
        ctx: &Context<'_>,
        input: Json<ParentInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Parent(input.0))).await
    }

    #[instrument(name = "graphql.update_parent", skip_all, fields(id = %id))]
    async fn update_parent(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: Json<ParentInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Parent(id), Payload::Parent(input.0))).await
    }

    #[instrument(name = "graphql.delete_parent", skip_all, fields(id = %id))]
    async fn delete_parent(
        &self,
        ctx: &Context<'_>,
        id: String,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Parent(id))).await
    }

    #[instrument(name = "graphql.create_lesson", skip_all)]
    async fn create_lesson(
        &self,
        ctx: &Context<'_>,
        input: Json<LessonInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Lesson(input.0))).await
    }

    #[instrument(name = "graphql.update_lesson", skip_all, fields(id = id))]
    async fn update_lesson(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<LessonInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Lesson(id), Payload::Lesson(input.0))).await
    }

    #[instrument(name = "graphql.delete_lesson", skip_all, fields(id = id))]
    async fn delete_lesson(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Lesson(id))).await
    }

    #[instrument(name = "graphql.create_exam", skip_all)]
    async fn create_exam(
        &self,
        ctx: &Context<'_>,
        input: Json<ExamInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Exam(input.0))).await
    }

    #[instrument(name = "graphql.update_exam", skip_all, fields(id = id))]
    async fn update_exam(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<ExamInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Exam(id), Payload::Exam(input.0))).await
    }

    #[instrument(name = "graphql.delete_exam", skip_all, fields(id = id))]
    async fn delete_exam(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Exam(id))).await
    }

    #[instrument(name = "graphql.create_assignment", skip_all)]
    async fn create_assignment(
        &self,
        ctx: &Context<'_>,
        input: Json<AssignmentInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Assignment(input.0))).await
    }

    #[instrument(name = "graphql.update_assignment", skip_all, fields(id = id))]
    async fn update_assignment(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<AssignmentInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(
            ctx,
            Action::Update(Target::Assignment(id), Payload::Assignment(input.0)),
        )
        .await
    }

    #[instrument(name = "graphql.delete_assignment", skip_all, fields(id = id))]
    async fn delete_assignment(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Assignment(id))).await
    }

    #[instrument(name = "graphql.create_result", skip_all)]
    async fn create_result(
        &self,
        ctx: &Context<'_>,
        input: Json<ResultInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Result(input.0))).await
    }

    #[instrument(name = "graphql.update_result", skip_all, fields(id = id))]
    async fn update_result(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<ResultInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Result(id), Payload::Result(input.0))).await
    }

    #[instrument(name = "graphql.delete_result", skip_all, fields(id = id))]
    async fn delete_result(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Result(id))).await
    }

    #[instrument(name = "graphql.create_event", skip_all)]
    async fn create_event(
        &self,
        ctx: &Context<'_>,
        input: Json<EventInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Event(input.0))).await
    }

    #[instrument(name = "graphql.update_event", skip_all, fields(id = id))]
    async fn update_event(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<EventInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Update(Target::Event(id), Payload::Event(input.0))).await
    }

    #[instrument(name = "graphql.delete_event", skip_all, fields(id = id))]
    async fn delete_event(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Event(id))).await
    }

    #[instrument(name = "graphql.create_announcement", skip_all)]
    async fn create_announcement(
        &self,
        ctx: &Context<'_>,
        input: Json<AnnouncementInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Announcement(input.0))).await
    }

    #[instrument(name = "graphql.update_announcement", skip_all, fields(id = id))]
    async fn update_announcement(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<AnnouncementInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(
            ctx,
            Action::Update(Target::Announcement(id), Payload::Announcement(input.0)),
        )
        .await
    }

    #[instrument(name = "graphql.delete_announcement", skip_all, fields(id = id))]
    async fn delete_announcement(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Announcement(id))).await
    }

    #[instrument(name = "graphql.create_attendance", skip_all)]
    async fn create_attendance(
        &self,
        ctx: &Context<'_>,
        input: Json<AttendanceInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Create(Payload::Attendance(input.0))).await
    }

    #[instrument(name = "graphql.update_attendance", skip_all, fields(id = id))]
    async fn update_attendance(
        &self,
        ctx: &Context<'_>,
        id: i32,
        input: Json<AttendanceInput>,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(
            ctx,
            Action::Update(Target::Attendance(id), Payload::Attendance(input.0)),
        )
        .await
    }

    #[instrument(name = "graphql.delete_attendance", skip_all, fields(id = id))]
    async fn delete_attendance(
        &self,
        ctx: &Context<'_>,
        id: i32,
    ) -> async_graphql::Result<ActionStatePayload> {
        run(ctx, Action::Delete(Target::Attendance(id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::{Request, Value};
    use migration::{Migrator, MigratorTrait};
    use platform_authn::UnconfiguredDirectory;
    use sea_orm::Database;
    use serde_json::json;
    use std::sync::Arc;

    async fn schema() -> SchemaType {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        build_schema(ActionGuard::new(db, Arc::new(UnconfiguredDirectory)))
    }

    #[tokio::test]
    async fn health_query_returns_ok() {
        let response = schema().await.execute(Request::new("{ health { ok } }")).await;
        assert!(response.errors.is_empty());
        let body = response.data.into_json().unwrap();
        assert_eq!(body, json!({"health": {"ok": true}}));
    }

    #[tokio::test]
    async fn me_requires_a_session() {
        let response = schema().await.execute(Request::new("{ me { userId } }")).await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "login required");

        let request = Request::new("{ me { userId role landingPath } }")
            .data(Principal::parent("p_42"));
        let body = schema().await.execute(request).await.data.into_json().unwrap();
        assert_eq!(
            body,
            json!({"me": {"userId": "p_42", "role": "parent", "landingPath": "/parent"}})
        );
    }

    #[tokio::test]
    async fn denied_mutation_is_a_failed_state_not_an_error() {
        let request = Request::new(
            r#"mutation { createSubject(input: {name: "Latin", teachers: []}) { success error } }"#,
        )
        .data(Principal::teacher("t1"));
        let response = schema().await.execute(request).await;
        assert!(response.errors.is_empty());
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"createSubject": {"success": false, "error": true}})
        );
    }

    #[tokio::test]
    async fn class_roster_reports_denials_with_codes() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        crate::seed::run(&db).await.unwrap();
        let schema = build_schema(ActionGuard::new(db, Arc::new(UnconfiguredDirectory)));
        let query = "{ classRoster(classId: 1) { name surname } }";

        let request = Request::new(query).data(Principal::teacher(crate::seed::TEACHER_ADA));
        let body = schema.execute(request).await.data.into_json().unwrap();
        assert_eq!(
            body,
            json!({"classRoster": [
                {"name": "Ginny", "surname": "Weasley"},
                {"name": "Ron", "surname": "Weasley"},
            ]})
        );

        for (principal, code) in [
            (Principal::teacher(crate::seed::TEACHER_ALAN), "FORBIDDEN"),
            (Principal::student(crate::seed::STUDENT_RON), "UNAUTHORIZED"),
        ] {
            let response = schema.execute(Request::new(query).data(principal)).await;
            assert_eq!(response.errors.len(), 1);
            let extensions = response.errors[0].extensions.as_ref().unwrap();
            assert_eq!(extensions.get("code"), Some(&Value::from(code)));
        }
    }
}
