use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_authn::{IdentityDirectory, RestDirectory, SessionVerifier, UnconfiguredDirectory};
use platform_authz::{DEFAULT_SIGN_IN_PATH, PolicyTable};

/// Key the identity provider signs session tokens with.
#[derive(Clone)]
pub enum SessionKey {
    Hs256(Vec<u8>),
    Rs256Pem(String),
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKey::Hs256(_) => f.write_str("Hs256(..)"),
            SessionKey::Rs256Pem(_) => f.write_str("Rs256Pem(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdentityApi {
    pub url: String,
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub session_key: SessionKey,
    pub sign_in_path: String,
    pub route_policy_file: Option<PathBuf>,
    pub identity_api: Option<IdentityApi>,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).map(|val| val.trim().to_string()).filter(|val| !val.is_empty());

        let session_key = match (
            var("SESSION_JWT_SECRET_BASE64"),
            var("SESSION_JWT_PUBLIC_KEY_PEM"),
        ) {
            (Some(_), Some(_)) => {
                return Err(anyhow!(
                    "set only one of SESSION_JWT_SECRET_BASE64 and SESSION_JWT_PUBLIC_KEY_PEM"
                ));
            }
            (Some(secret), None) => {
                let bytes = STANDARD
                    .decode(secret)
                    .context("invalid SESSION_JWT_SECRET_BASE64")?;
                if bytes.len() < 32 {
                    return Err(anyhow!(
                        "SESSION_JWT_SECRET_BASE64 must decode to at least 32 bytes"
                    ));
                }
                SessionKey::Hs256(bytes)
            }
            (None, Some(pem)) => SessionKey::Rs256Pem(pem),
            (None, None) => {
                return Err(anyhow!(
                    "SESSION_JWT_SECRET_BASE64 or SESSION_JWT_PUBLIC_KEY_PEM missing"
                ));
            }
        };

        let sign_in_path = var("SIGN_IN_PATH").unwrap_or_else(|| DEFAULT_SIGN_IN_PATH.into());
        if !sign_in_path.starts_with('/') {
            return Err(anyhow!("SIGN_IN_PATH must start with '/'"));
        }

        let identity_api = match (var("IDENTITY_API_URL"), var("IDENTITY_API_SECRET")) {
            (Some(url), Some(secret)) => Some(IdentityApi { url, secret }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "IDENTITY_API_URL and IDENTITY_API_SECRET must be set together"
                ));
            }
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            session_key,
            sign_in_path,
            route_policy_file: var("ROUTE_POLICY_FILE").map(PathBuf::from),
            identity_api,
            cors_allowed_origins,
        })
    }

    pub fn verifier(&self) -> Result<SessionVerifier> {
        match &self.session_key {
            SessionKey::Hs256(secret) => Ok(SessionVerifier::hs256(secret)),
            SessionKey::Rs256Pem(pem) => {
                // Env files usually carry the PEM on one line with literal `\n`.
                let pem = pem.replace("\\n", "\n");
                Ok(SessionVerifier::rs256_pem(pem.as_bytes())?)
            }
        }
    }

    /// Built-in route access map, or the ordered table in
    /// `ROUTE_POLICY_FILE` when one is configured.
    pub fn policy_table(&self) -> Result<PolicyTable> {
        let table = match &self.route_policy_file {
            Some(path) => {
                let document = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                PolicyTable::from_json(&document)
                    .with_context(|| format!("invalid route policy in {}", path.display()))?
            }
            None => PolicyTable::school_default(),
        };
        Ok(table.with_sign_in_path(self.sign_in_path.clone()))
    }

    pub fn directory(&self) -> Result<Arc<dyn IdentityDirectory>> {
        match &self.identity_api {
            Some(api) => Ok(Arc::new(RestDirectory::new(&api.url, api.secret.clone())?)),
            None => {
                tracing::warn!("identity directory not configured; person records are read-only");
                Ok(Arc::new(UnconfiguredDirectory))
            }
        }
    }
}
