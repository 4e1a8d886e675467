// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// JWT Claims issued by the identity provider.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the numeric user id, as a string.
    pub sub: String,
    /// User's role (e.g., 'student', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// The trusted user id. The engine performs no further identity checks.
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Signs a token for `user_id`.
///
/// Issuance normally belongs to the identity provider; this exists for
/// operator tooling and tests.
pub fn sign_jwt(
    user_id: i64,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects `Claims`
/// into the request extensions. Tokens whose subject is not a numeric user id
/// are rejected here so handlers can rely on `Claims::user_id`.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return Err(AppError::AuthError("Missing bearer token".to_string())),
    };

    let claims = verify_jwt(token, &config.jwt_secret)?;
    claims.user_id()?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be layered inside `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Missing credentials".to_string()))?;

    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_token_round_trips_user_id() {
        let token = sign_jwt(42, "student", "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert!(!claims.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(1, "admin", "secret", 60).unwrap();
        assert!(matches!(
            verify_jwt(&token, "other"),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn non_numeric_subject_is_not_a_user() {
        let claims = Claims {
            sub: "alice".into(),
            role: "student".into(),
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }
}
