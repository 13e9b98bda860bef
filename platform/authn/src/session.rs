use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use platform_authz::{Principal, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cookie the identity provider's frontend SDK stores the session token in.
pub const SESSION_COOKIE: &str = "__session";

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("session token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("invalid verification key: {0}")]
    Key(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Claims this service reads from the provider's session token. The role
/// lives at `metadata.role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub metadata: SessionMetadata,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
}

impl SessionClaims {
    pub fn new(sub: impl Into<String>, role: Option<&str>, exp: usize) -> Self {
        Self {
            sub: sub.into(),
            metadata: SessionMetadata {
                role: role.map(str::to_string),
            },
            exp,
            iat: None,
        }
    }

    /// Unknown role strings yield a principal without a role rather than an
    /// error, so the caller is treated like any other unprivileged session.
    pub fn principal(&self) -> Principal {
        let role = self
            .metadata
            .role
            .as_deref()
            .and_then(|value| value.parse::<Role>().ok());
        Principal::new(self.sub.clone(), role)
    }
}

/// Verifies session tokens issued by the identity provider.
#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn rs256_pem(pem: &[u8]) -> Result<Self, AuthnError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|err| AuthnError::Key(err.to_string()))?;
        Ok(Self {
            key,
            validation: Validation::new(Algorithm::RS256),
        })
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, AuthnError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }

    /// Principal for a token, or `None` for anything that does not verify.
    pub fn principal(&self, token: &str) -> Option<Principal> {
        match self.decode(token) {
            Ok(claims) => Some(claims.principal()),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring unverifiable session token");
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn far_future() -> usize {
        4_102_444_800
    }

    fn sign(claims: &SessionClaims, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn role_claim_becomes_principal_role() {
        let verifier = SessionVerifier::hs256(SECRET);
        let token = sign(
            &SessionClaims::new("user_t1", Some("teacher"), far_future()),
            SECRET,
        );
        let principal = verifier.principal(&token).unwrap();
        assert_eq!(principal, Principal::teacher("user_t1"));
    }

    #[test]
    fn unknown_or_missing_role_leaves_principal_roleless() {
        let verifier = SessionVerifier::hs256(SECRET);
        for role in [Some("superuser"), None] {
            let token = sign(&SessionClaims::new("user_x", role, far_future()), SECRET);
            let principal = verifier.principal(&token).unwrap();
            assert_eq!(principal.role, None);
        }
    }

    #[test]
    fn tokens_signed_with_another_key_are_ignored() {
        let verifier = SessionVerifier::hs256(SECRET);
        let token = sign(
            &SessionClaims::new("user_a", Some("admin"), far_future()),
            b"another-secret-another-secret-xx",
        );
        assert!(verifier.principal(&token).is_none());
    }

    #[test]
    fn expired_tokens_are_ignored() {
        let verifier = SessionVerifier::hs256(SECRET);
        let token = sign(&SessionClaims::new("user_a", Some("admin"), 1_000), SECRET);
        assert!(matches!(verifier.decode(&token), Err(AuthnError::Token(_))));
    }
}
