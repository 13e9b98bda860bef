use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role `{0}`")]
pub struct RoleParseError(pub String);

/// Closed set of roles the identity provider may attach to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Teacher, Role::Student, Role::Parent];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }

    /// Dashboard a principal lands on when redirected away from a route.
    pub fn landing_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Teacher => "/teacher",
            Role::Student => "/student",
            Role::Parent => "/parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// Authenticated caller of a single request.
///
/// `role` is `None` when the session carries no role claim or one this
/// service does not know; such a principal is never granted anything a role
/// is required for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Some(Role::Admin))
    }

    pub fn teacher(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Some(Role::Teacher))
    }

    pub fn student(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Some(Role::Student))
    }

    pub fn parent(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Some(Role::Parent))
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}
