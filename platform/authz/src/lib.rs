//! Authorization primitives for the school suite.
//!
//! Two independent gates live here:
//!
//! * the route policy table, consulted once per HTTP request against the
//!   request path, and
//! * the action rule table, consulted by every mutating operation before it
//!   touches the store.
//!
//! Both take the caller as an explicit [`Principal`]; nothing in this crate
//! reads request-scoped or global session state.

mod role;
mod route;
mod rules;

pub use role::{Principal, Role, RoleParseError};
pub use route::{
    DEFAULT_SIGN_IN_PATH, PolicyEntry, PolicyError, PolicyTable, RouteDecision, RoutePattern,
};
pub use rules::{ActionState, AuthzError, EntityKind, Operation, Rule, rule_for};
