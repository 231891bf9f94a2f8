//! JWT bearer authentication.
//!
//! Every `/api` route runs behind [`require_auth`], which validates the
//! HS256 token and stashes a [`CurrentUser`] in the request extensions.
//! Handlers pick it up with the `CurrentUser` extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::AppState;
use crate::domain::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserMetadata {
    pub bank_id: Option<i64>,
    pub person_number: Option<String>,
}

/// Token payload. `sub` is the user id; bank handlers carry their
/// bank id in `user_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
    pub exp: usize,
}

/// Authenticated caller, extracted from a validated token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub bank_id: Option<i64>,
    pub person_number: Option<String>,
}

impl CurrentUser {
    /// Bank id claim, required for all deed operations.
    pub fn require_bank_id(&self) -> Result<i64, ApiError> {
        self.bank_id
            .ok_or_else(|| ApiError::Forbidden("Bank ID not found in user claims".to_string()))
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        let metadata = claims.user_metadata.unwrap_or_default();
        Self {
            id: claims.sub,
            email: claims.email.unwrap_or_default(),
            bank_id: metadata.bank_id,
            person_number: metadata.person_number,
        }
    }
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Supabase-style tokens carry an audience we do not check.
    validation.validate_aud = false;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            ApiError::Unauthorized("Invalid authentication credentials".to_string())
        })
}

/// Middleware to require a valid bearer token on protected endpoints.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        Some(auth) if auth.starts_with("Bearer ") => &auth[7..],
        Some(_) => {
            warn!("Invalid Authorization header format (expected Bearer token)");
            return Err(ApiError::Unauthorized(
                "Invalid authentication credentials".to_string(),
            ));
        }
        None => {
            return Err(ApiError::Unauthorized("Not authenticated".to_string()));
        }
    };

    let claims = decode_token(&state.settings.jwt_secret, token)?;
    request.extensions_mut().insert(CurrentUser::from(claims));

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset_secs: i64) -> Claims {
        Claims {
            sub: "user-1".to_string(),
            email: Some("handler@bank.se".to_string()),
            user_metadata: Some(UserMetadata {
                bank_id: Some(42),
                person_number: None,
            }),
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        }
    }

    #[test]
    fn test_valid_token_round_trip() {
        let token = mint("secret", &claims(3600));
        let decoded = decode_token("secret", &token).unwrap();
        assert_eq!(decoded.sub, "user-1");

        let user = CurrentUser::from(decoded);
        assert_eq!(user.require_bank_id().unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint("secret", &claims(3600));
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = mint("secret", &claims(-3600));
        assert!(decode_token("secret", &token).is_err());
    }

    #[test]
    fn test_missing_bank_id_is_forbidden() {
        let user = CurrentUser {
            id: "user-1".to_string(),
            email: String::new(),
            bank_id: None,
            person_number: None,
        };
        assert!(matches!(
            user.require_bank_id(),
            Err(ApiError::Forbidden(_))
        ));
    }
}
