//! Bearer-token authentication for routes that need a caller identity.

use crate::{handlers::ApiError, state::AppState};
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use std::sync::Arc;
use tracing::warn;

/// The identity substituted for unauthenticated requests when `SKIP_AUTH=true`.
pub const DEV_USER: &str = "dev_user";

/// The verified user id of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let Some(token) = bearer_token(header) else {
            if state.config.skip_auth {
                return Ok(Self(DEV_USER.to_string()));
            }
            return Err(ApiError::Unauthorized("Unauthorized".to_string()));
        };

        match state.identity.verify(token).await {
            Ok(uid) => Ok(Self(uid)),
            Err(err) => {
                warn!(error = %err, "Token verification failed");
                Err(ApiError::Unauthorized("Invalid token".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(Some("Bearer   ")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(Some("bearer abc")), None);
        assert_eq!(bearer_token(None), None);
    }
}
