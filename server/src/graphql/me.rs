use async_graphql::SimpleObject;
use platform_authz::Principal;

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub user_id: String,
    pub role: Option<String>,
    /// Where the route policy sends this caller; absent without a role.
    pub landing_path: Option<String>,
}

impl From<&Principal> for MePayload {
    fn from(principal: &Principal) -> Self {
        Self {
            user_id: principal.user_id.clone(),
            role: principal.role.map(|role| role.as_str().to_string()),
            landing_path: principal.role.map(|role| role.landing_path().to_string()),
        }
    }
}
