//! ID token validation.
//!
//! A token is checked in one of three ways, fixed when the gateway is built:
//! against keys published at a JWKS endpoint, against an HMAC secret shared
//! with the provider, or not at all (payload decode only).

use crate::config::IdTokenVerification;
use crate::oidc::jwks::cache::JwksCache;
use crate::oidc::jwks::{JwksClient, JwksError};
use custom_error::custom_error;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::sync::Arc;

/// Claims of a successfully validated ID token.
pub type IdTokenClaims = serde_json::Map<String, serde_json::Value>;

/// Algorithms accepted for tokens signed with a published key.
pub const JWKS_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Algorithms accepted for tokens signed with the shared secret.
pub const SHARED_SECRET_ALGORITHMS: &[Algorithm] =
    &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Allowed clock skew, in seconds, when checking `exp` and `nbf`.
const LEEWAY: i64 = 60;

custom_error! {
    pub IdTokenError
        Jwt{source: jsonwebtoken::errors::Error} = "could not decode id token: {source}",
        MissingKeyId = "id token header carries no key id",
        DisallowedAlgorithm{alg: String} = "id token algorithm {alg} is not allowed",
        Keys{source: JwksError} = "could not resolve id token signing key: {source}",
        Expired = "id token has expired",
        NotYetValid = "id token is not valid yet",
        EmptyClaims = "id token carries no claims",
}

#[derive(Clone)]
enum Verifier {
    Jwks(JwksClient),
    SharedSecret(DecodingKey),
    Unverified,
}

/// Validates ID tokens issued to one client.
#[derive(Clone)]
pub struct IdTokenValidator {
    verifier: Verifier,
    audience: String,
}

impl std::fmt::Debug for IdTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.verifier {
            Verifier::Jwks(_) => "jwks",
            Verifier::SharedSecret(_) => "shared_secret",
            Verifier::Unverified => "unverified",
        };
        f.debug_struct("IdTokenValidator")
            .field("mode", &mode)
            .field("audience", &self.audience)
            .finish()
    }
}

impl IdTokenValidator {
    pub fn new(
        verification: &IdTokenVerification,
        audience: &str,
        http: reqwest::Client,
        cache: Arc<dyn JwksCache>,
    ) -> Self {
        let verifier = match verification {
            IdTokenVerification::Jwks {
                url,
                headers,
                user_agent,
            } => Verifier::Jwks(JwksClient::new(
                url.clone(),
                headers.clone(),
                user_agent,
                http,
                cache,
            )),
            IdTokenVerification::SharedSecret { secret } => {
                Verifier::SharedSecret(DecodingKey::from_secret(secret.as_bytes()))
            }
            IdTokenVerification::Unverified => Verifier::Unverified,
        };

        Self {
            verifier,
            audience: audience.to_string(),
        }
    }

    pub fn is_verifying(&self) -> bool {
        !matches!(self.verifier, Verifier::Unverified)
    }

    /// Returns the token's claims, or an error when the token cannot be trusted.
    pub async fn validate(&self, token: &str) -> Result<IdTokenClaims, IdTokenError> {
        let header = decode_header(token)?;

        let claims = match &self.verifier {
            Verifier::Jwks(keys) => {
                if !JWKS_ALGORITHMS.contains(&header.alg) {
                    return Err(IdTokenError::DisallowedAlgorithm {
                        alg: format!("{:?}", header.alg),
                    });
                }
                let kid = header.kid.as_deref().ok_or(IdTokenError::MissingKeyId)?;
                let jwk = keys.key(kid).await?;
                let key = DecodingKey::from_jwk(&jwk)?;
                decode::<IdTokenClaims>(token, &key, &self.validation(header.alg))?.claims
            }
            Verifier::SharedSecret(key) => {
                if !SHARED_SECRET_ALGORITHMS.contains(&header.alg) {
                    return Err(IdTokenError::DisallowedAlgorithm {
                        alg: format!("{:?}", header.alg),
                    });
                }
                decode::<IdTokenClaims>(token, key, &self.validation(header.alg))?.claims
            }
            Verifier::Unverified => {
                let mut validation = Validation::new(header.alg);
                validation.insecure_disable_signature_validation();
                validation.validate_exp = false;
                validation.validate_aud = false;
                validation.required_spec_claims.clear();
                decode::<IdTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?.claims
            }
        };

        if self.is_verifying() {
            check_time_claims(&claims, chrono::Utc::now().timestamp())?;
        }

        if claims.is_empty() {
            return Err(IdTokenError::EmptyClaims);
        }

        Ok(claims)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_audience(&[&self.audience]);
        // SystemTime is unavailable on wasm32, so time claims are checked against chrono's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation
    }
}

fn check_time_claims(claims: &IdTokenClaims, now: i64) -> Result<(), IdTokenError> {
    let exp = claims.get("exp").and_then(serde_json::Value::as_i64);
    match exp {
        Some(exp) if exp + LEEWAY >= now => {}
        _ => return Err(IdTokenError::Expired),
    }

    if let Some(nbf) = claims.get("nbf").and_then(serde_json::Value::as_i64) {
        if nbf - LEEWAY > now {
            return Err(IdTokenError::NotYetValid);
        }
    }

    Ok(())
}
