use std::sync::Arc;

use platform_authn::IdentityDirectory;
use platform_authz::{ActionState, AuthzError, EntityKind, Operation, Principal, Rule, rule_for};
use sea_orm::DatabaseConnection;
use tracing::Instrument;

use crate::error::{ActionError, ActionResult};
use crate::ownership::{self, Link};
use crate::payload::Action;
use crate::persist;

/// Row written by an admitted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    pub kind: EntityKind,
    pub op: Operation,
    pub id: String,
}

/// Gate in front of every mutation.
///
/// Checks run in a fixed order: role rule, payload validation, existence of
/// the target, ownership, and only then the single persistence step. The
/// guard keeps no state between calls.
#[derive(Clone)]
pub struct ActionGuard {
    db: DatabaseConnection,
    directory: Arc<dyn IdentityDirectory>,
}

impl ActionGuard {
    pub fn new(db: DatabaseConnection, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { db, directory }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn execute(&self, principal: &Principal, action: Action) -> ActionResult<Persisted> {
        let kind = action.kind();
        let op = action.operation();
        let span = tracing::info_span!(
            "school.action",
            %kind,
            %op,
            user_id = %principal.user_id,
            role = principal.role.map_or("none", |role| role.as_str()),
        );
        self.evaluate(principal, action, kind, op)
            .instrument(span)
            .await
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        action: Action,
        kind: EntityKind,
        op: Operation,
    ) -> ActionResult<Persisted> {
        let rule = rule_for(principal.role, kind, op);
        if rule == Rule::Deny {
            return Err(AuthzError::unauthorized(principal.role, op, kind).into());
        }

        action.validate()?;

        let existing = match &action {
            Action::Update(target, _) | Action::Delete(target) => {
                let link = ownership::existing_link(&self.db, target)
                    .await?
                    .ok_or_else(|| ActionError::not_found(kind, target.id()))?;
                Some((target.id(), link))
            }
            Action::Create(_) => None,
        };

        if rule == Rule::RequireOwnership {
            if let Some((id, link)) = &existing {
                self.require_owned(principal, kind, id, link).await?;
            }
            if let Action::Create(payload) | Action::Update(_, payload) = &action {
                let id = existing.as_ref().map_or("new", |(id, _)| id.as_str());
                self.require_owned(principal, kind, id, &payload.link())
                    .await?;
            }
        }

        let directory = self.directory.as_ref();
        let id = match &action {
            Action::Create(payload) => persist::create(&self.db, directory, payload).await?,
            Action::Update(target, payload) => {
                persist::update(&self.db, directory, target, payload).await?;
                target.id()
            }
            Action::Delete(target) => {
                persist::delete(&self.db, directory, target).await?;
                target.id()
            }
        };
        tracing::info!(%id, "action persisted");
        Ok(Persisted { kind, op, id })
    }

    async fn require_owned(
        &self,
        principal: &Principal,
        kind: EntityKind,
        id: &str,
        link: &Link,
    ) -> ActionResult<()> {
        if ownership::owns(&self.db, &principal.user_id, link).await? {
            Ok(())
        } else {
            Err(AuthzError::forbidden(&principal.user_id, kind, id).into())
        }
    }

    /// Caller-facing form of [`execute`](Self::execute): every failure
    /// collapses to `{success: false, error: true}` and the detail is logged.
    pub async fn run(&self, principal: &Principal, action: Action) -> ActionState {
        let kind = action.kind();
        let op = action.operation();
        match self.execute(principal, action).await {
            Ok(_) => ActionState::succeeded(),
            Err(err) => {
                log_failure(principal, kind, op, &err);
                ActionState::failed()
            }
        }
    }
}

pub(crate) fn log_failure(principal: &Principal, kind: EntityKind, op: Operation, err: &ActionError) {
    if err.is_rejection() {
        tracing::warn!(
            user_id = %principal.user_id,
            %kind,
            %op,
            class = err.class(),
            error = %err,
            "action rejected"
        );
    } else {
        tracing::error!(
            user_id = %principal.user_id,
            %kind,
            %op,
            class = err.class(),
            error = %err,
            "action failed"
        );
    }
}

impl std::fmt::Debug for ActionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionGuard").finish_non_exhaustive()
    }
}
