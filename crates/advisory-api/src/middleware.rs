use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;
use uuid::Uuid;

use advisory_types::api::Claims;
use advisory_types::error::CallableError;

use crate::error::ApiError;
use crate::state::AppState;

/// Who is calling. Anonymous when no `Authorization` header was sent.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub auth: Option<Claims>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self { auth: None }
    }

    pub fn authenticated(claims: Claims) -> Self {
        Self { auth: Some(claims) }
    }

    pub fn uid(&self) -> Option<Uuid> {
        self.auth.as_ref().map(|c| c.sub)
    }
}

/// Build the [`CallerContext`] for a callable request.
///
/// A missing header is fine; a header that is present but not a valid
/// bearer token rejects the call with `unauthenticated`.
pub async fn callable_context(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match req.headers().get(header::AUTHORIZATION) {
        None => CallerContext::anonymous(),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|s| s.strip_prefix("Bearer "))
                .ok_or_else(|| CallableError::unauthenticated("Unauthenticated"))?;

            let claims = verify_token(token, &state.jwt_secret)?;
            CallerContext::authenticated(claims)
        }
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

fn verify_token(token: &str, secret: &str) -> Result<Claims, CallableError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        CallableError::unauthenticated("Unauthenticated")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, exp_offset: chrono::Duration) -> (Uuid, String) {
        let sub = Uuid::new_v4();
        let claims = Claims {
            sub,
            username: "grower".into(),
            exp: (chrono::Utc::now() + exp_offset).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .unwrap();
        (sub, token)
    }

    #[test]
    fn valid_token_yields_claims() {
        let (sub, token) = token("s3cret", chrono::Duration::hours(1));
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.username, "grower");
    }

    #[test]
    fn wrong_secret_is_unauthenticated() {
        let (_, token) = token("s3cret", chrono::Duration::hours(1));
        let err = verify_token(&token, "other").unwrap_err();
        assert_eq!(err.code, advisory_types::error::ErrorCode::Unauthenticated);
    }

    #[test]
    fn expired_token_is_rejected() {
        let (_, token) = token("s3cret", chrono::Duration::hours(-2));
        assert!(verify_token(&token, "s3cret").is_err());
    }

    #[test]
    fn anonymous_context_has_no_uid() {
        assert!(CallerContext::anonymous().uid().is_none());
    }
}
