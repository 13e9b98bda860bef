//! Boundary to the hosted identity provider.
//!
//! The provider issues the session token and owns the user accounts. This
//! crate only turns a session token into a [`Principal`](platform_authz::Principal)
//! and forwards account changes to the provider's user directory.

mod directory;
mod session;

pub use directory::{DirectoryError, DirectoryUser, IdentityDirectory, RestDirectory, UnconfiguredDirectory};
pub use session::{AuthnError, SESSION_COOKIE, SessionClaims, SessionMetadata, SessionVerifier};
