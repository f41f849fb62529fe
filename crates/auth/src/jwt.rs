//! Bearer-token decoding (HS256).
//!
//! The wire format carries numeric `iat`/`exp` (seconds) plus our custom
//! `ledger_id` and `roles` claims. Time-window validation is delegated to
//! [`crate::claims::validate_claims`] so it stays deterministic and testable.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use renqing_core::LedgerId;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::{PrincipalId, Role};

/// Token verification boundary used by the HTTP middleware.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: Uuid,
    ledger_id: Uuid,
    #[serde(default)]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// HS256 shared-secret validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            key: DecodingKey::from_secret(&secret),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by validate_claims against the caller's clock.
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<WireClaims>(token, &self.key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    TokenValidationError::BadSignature
                }
                _ => TokenValidationError::Malformed(e.to_string()),
            },
        )?;

        let claims = JwtClaims {
            sub: PrincipalId::from_uuid(data.claims.sub),
            ledger_id: LedgerId::from_uuid(data.claims.ledger_id),
            roles: data.claims.roles.into_iter().map(Role::new).collect(),
            issued_at: timestamp(data.claims.iat)?,
            expires_at: timestamp(data.claims.exp)?,
        };

        validate_claims(&claims, now)?;

        Ok(claims)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenValidationError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TokenValidationError::Malformed(format!("bad unix timestamp: {secs}")))
}

/// Sign a claim set with a shared secret (dev tooling and tests).
pub fn sign_claims(secret: &[u8], claims: &JwtClaims) -> Result<String, TokenValidationError> {
    let wire = WireClaims {
        sub: *claims.sub.as_uuid(),
        ledger_id: *claims.ledger_id.as_uuid(),
        roles: claims.roles.iter().map(|r| r.as_str().to_string()).collect(),
        iat: claims.issued_at.timestamp(),
        exp: claims.expires_at.timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &wire,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenValidationError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh_claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: PrincipalId::new(),
            ledger_id: LedgerId::new(),
            roles: vec![Role::new("admin")],
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn round_trips_signed_token() {
        let now = Utc::now();
        let claims = fresh_claims(now);
        let token = sign_claims(b"secret", &claims).unwrap();

        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let decoded = validator.validate(&token, now).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.ledger_id, claims.ledger_id);
        assert_eq!(decoded.roles, claims.roles);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = sign_claims(b"secret", &fresh_claims(now)).unwrap();

        let validator = Hs256JwtValidator::new(b"other-secret".to_vec());
        assert_eq!(
            validator.validate(&token, now),
            Err(TokenValidationError::BadSignature)
        );
    }

    #[test]
    fn rejects_expired_token_at_validation_time() {
        let now = Utc::now();
        let mut claims = fresh_claims(now);
        claims.expires_at = now - Duration::seconds(30);
        let token = sign_claims(b"secret", &claims).unwrap();

        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        assert_eq!(
            validator.validate(&token, now),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn rejects_garbage_token() {
        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        assert!(matches!(
            validator.validate("not-a-jwt", Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
