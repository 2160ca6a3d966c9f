use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::User,
    users::UserStore,
};

/// Claims
///
/// The payload expected inside the bearer token. Tokens are issued by the
/// external identity provider; this service only validates them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user.
    pub sub: Uuid,
    /// Expiration Time (exp): tokens past this instant are rejected.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved actor of an authenticated request. The `is_org` flag is read
/// from the User Store on every request, never trusted from the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_org: bool,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            is_org: user.is_org,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user
///    is accepted as-is.
/// 2. Otherwise an `Authorization: Bearer <jwt>` header is required and decoded
///    against the configured secret with expiry validation.
/// 3. The subject is looked up so deleted users lose access immediately.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserStore: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Dependency Resolution
        let users = UserStore::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 2. Local Development Bypass
        // Only honoured in Env::Local. An unknown id falls through to the token path.
        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = users.get_user_by_id(user_id).await? {
                    return Ok(AuthUser::from(&user));
                }
            }
        }

        // 3. Token Extraction
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        // 4. Decoding Setup
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        // 5. Token Decoding and Validation (signature, exp)
        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            AppError::Unauthenticated
        })?;

        // 6. Database Lookup
        // `is_org` comes from storage, so a role change applies on the next request.
        let user = users
            .get_user_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser::from(&user))
    }
}
