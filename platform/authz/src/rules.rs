use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// Mutable domain entities an action can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Subject,
    Class,
    Teacher,
    Student,
    Parent,
    Lesson,
    Exam,
    Assignment,
    Result,
    Event,
    Announcement,
    Attendance,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Subject => "subject",
            EntityKind::Class => "class",
            EntityKind::Teacher => "teacher",
            EntityKind::Student => "student",
            EntityKind::Parent => "parent",
            EntityKind::Lesson => "lesson",
            EntityKind::Exam => "exam",
            EntityKind::Assignment => "assignment",
            EntityKind::Result => "result",
            EntityKind::Event => "event",
            EntityKind::Announcement => "announcement",
            EntityKind::Attendance => "attendance",
        }
    }

    /// Whether a teacher can own instances of this entity through a lesson
    /// or class they teach.
    pub fn has_teacher_ownership(self) -> bool {
        match self {
            EntityKind::Lesson
            | EntityKind::Exam
            | EntityKind::Assignment
            | EntityKind::Result
            | EntityKind::Event
            | EntityKind::Announcement
            | EntityKind::Attendance => true,
            EntityKind::Subject
            | EntityKind::Class
            | EntityKind::Teacher
            | EntityKind::Student
            | EntityKind::Parent => false,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Only used to describe refused reads; reads are scoped by query rather
    /// than checked against the rule table.
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the guard has to establish before a mutation may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Allow,
    RequireOwnership,
    Deny,
}

/// Guard rule table. Operation is accepted so per-operation exceptions can be
/// expressed here; the current table treats create, update and delete alike.
pub fn rule_for(role: Option<Role>, kind: EntityKind, _op: Operation) -> Rule {
    match role {
        Some(Role::Admin) => Rule::Allow,
        Some(Role::Teacher) if kind.has_teacher_ownership() => Rule::RequireOwnership,
        Some(Role::Teacher) => Rule::Deny,
        Some(Role::Student) | Some(Role::Parent) | None => Rule::Deny,
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{role} may not {op} {kind}")]
    Unauthorized {
        role: String,
        op: Operation,
        kind: EntityKind,
    },
    #[error("{kind} {id} is not owned by {user_id}")]
    Forbidden {
        user_id: String,
        kind: EntityKind,
        id: String,
    },
}

impl AuthzError {
    pub fn unauthorized(role: Option<Role>, op: Operation, kind: EntityKind) -> Self {
        AuthzError::Unauthorized {
            role: role.map_or("anonymous", Role::as_str).to_string(),
            op,
            kind,
        }
    }

    pub fn forbidden(user_id: &str, kind: EntityKind, id: impl ToString) -> Self {
        AuthzError::Forbidden {
            user_id: user_id.to_string(),
            kind,
            id: id.to_string(),
        }
    }
}

/// Uniform result of a server action as seen by the caller. Failure detail
/// goes to the log, never into this value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActionState {
    pub success: bool,
    pub error: bool,
}

impl ActionState {
    pub const fn succeeded() -> Self {
        Self {
            success: true,
            error: false,
        }
    }

    pub const fn failed() -> Self {
        Self {
            success: false,
            error: true,
        }
    }
}
