//! Verification of Supabase-issued access tokens.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Audience Supabase stamps on tokens of signed-in users.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    pub aud: String,
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "sub", "aud"]);

    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn sign(claims: &AccessClaims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset: Duration, aud: &str) -> AccessClaims {
        AccessClaims {
            sub: Uuid::new_v4(),
            email: Some("dispatch@example.com".to_string()),
            exp: (Utc::now() + exp_offset).timestamp(),
            aud: aud.to_string(),
        }
    }

    #[test]
    fn accepts_valid_token() {
        let claims = claims(Duration::hours(1), AUTHENTICATED_AUDIENCE);
        let token = sign(&claims, SECRET);
        let verified = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.email.as_deref(), Some("dispatch@example.com"));
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign(&claims(Duration::hours(-2), AUTHENTICATED_AUDIENCE), SECRET);
        assert!(matches!(
            verify_access_token(&token, SECRET),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn rejects_wrong_secret_and_audience() {
        let token = sign(&claims(Duration::hours(1), AUTHENTICATED_AUDIENCE), "other-secret");
        assert!(matches!(
            verify_access_token(&token, SECRET),
            Err(JwtError::Invalid(_))
        ));

        let token = sign(&claims(Duration::hours(1), "anon"), SECRET);
        assert!(matches!(
            verify_access_token(&token, SECRET),
            Err(JwtError::Invalid(_))
        ));
    }
}
