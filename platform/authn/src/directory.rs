use async_trait::async_trait;
use platform_authz::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("identity directory is not configured")]
    NotConfigured,
    #[error("invalid identity directory url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("identity directory request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity directory rejected the request: {0}")]
    Rejected(String),
    #[error("{0:?} is not a usable directory user id")]
    InvalidUserId(String),
}

/// Account fields mirrored into the identity provider. The role is written
/// to the account's public metadata and surfaces later as the session's
/// `metadata.role` claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub username: String,
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// User accounts held by the identity provider.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Create an account and return the provider's user id.
    async fn create_user(&self, user: &DirectoryUser) -> Result<String, DirectoryError>;
    async fn update_user(&self, id: &str, user: &DirectoryUser) -> Result<(), DirectoryError>;
    async fn delete_user(&self, id: &str) -> Result<(), DirectoryError>;
}

#[derive(Serialize)]
struct PublicMetadata<'a> {
    role: &'a str,
}

#[derive(Serialize)]
struct UserBody<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    first_name: &'a str,
    last_name: &'a str,
    public_metadata: PublicMetadata<'a>,
}

impl<'a> From<&'a DirectoryUser> for UserBody<'a> {
    fn from(user: &'a DirectoryUser) -> Self {
        Self {
            username: &user.username,
            password: user.password.as_deref().filter(|p| !p.is_empty()),
            first_name: &user.first_name,
            last_name: &user.last_name,
            public_metadata: PublicMetadata {
                role: user.role.as_str(),
            },
        }
    }
}

#[derive(Deserialize)]
struct CreatedUser {
    id: String,
}

/// Backend REST API of the identity provider.
#[derive(Clone, Debug)]
pub struct RestDirectory {
    client: reqwest::Client,
    base_url: Url,
    secret: String,
}

impl RestDirectory {
    pub fn new(base_url: &str, secret: impl Into<String>) -> Result<Self, DirectoryError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            secret: secret.into(),
        })
    }

    /// `users`, or `users/<id>` with the id percent-encoded as a single
    /// path segment.
    fn users_url(&self, id: Option<&str>) -> Result<Url, DirectoryError> {
        let mut url = self.base_url.join("users")?;
        let Some(id) = id else {
            return Ok(url);
        };
        if matches!(id, "" | "." | "..") {
            return Err(DirectoryError::InvalidUserId(id.to_string()));
        }
        url.path_segments_mut()
            .map_err(|()| DirectoryError::InvalidUserId(id.to_string()))?
            .push(id);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, DirectoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DirectoryError::Rejected(format!("{status}: {body}")))
    }
}

#[async_trait]
impl IdentityDirectory for RestDirectory {
    async fn create_user(&self, user: &DirectoryUser) -> Result<String, DirectoryError> {
        let response = self
            .client
            .post(self.users_url(None)?)
            .bearer_auth(&self.secret)
            .json(&UserBody::from(user))
            .send()
            .await?;
        let created: CreatedUser = Self::check(response).await?.json().await?;
        tracing::info!(user_id = %created.id, role = %user.role, "directory user created");
        Ok(created.id)
    }

    async fn update_user(&self, id: &str, user: &DirectoryUser) -> Result<(), DirectoryError> {
        let response = self
            .client
            .patch(self.users_url(Some(id))?)
            .bearer_auth(&self.secret)
            .json(&UserBody::from(user))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<(), DirectoryError> {
        let response = self
            .client
            .delete(self.users_url(Some(id))?)
            .bearer_auth(&self.secret)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(user_id = %id, "directory user deleted");
        Ok(())
    }
}

/// Stand-in used when no directory credentials are configured; every call
/// fails, so person records cannot be created without a provider account.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredDirectory;

#[async_trait]
impl IdentityDirectory for UnconfiguredDirectory {
    async fn create_user(&self, _user: &DirectoryUser) -> Result<String, DirectoryError> {
        Err(DirectoryError::NotConfigured)
    }

    async fn update_user(&self, _id: &str, _user: &DirectoryUser) -> Result<(), DirectoryError> {
        Err(DirectoryError::NotConfigured)
    }

    async fn delete_user(&self, _id: &str) -> Result<(), DirectoryError> {
        Err(DirectoryError::NotConfigured)
    }
}
