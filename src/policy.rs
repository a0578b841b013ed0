//! Authorization decisions made after a caller has been authenticated.

use crate::error::GatewayError;
use crate::gateway::AuthContext;
use http::StatusCode;
use std::fmt::Debug;

/// Decides whether an authenticated caller may reach the origin.
pub trait Authorizer: Send + Sync + Debug {
    fn authorize(&self, context: &AuthContext) -> Result<(), GatewayError>;
}

/// Admits callers whose ID token `email` claim belongs to one of the listed domains.
///
/// Sessions without ID token claims are admitted unchanged.
#[derive(Clone, Debug)]
pub struct EmailDomainAllowList {
    domains: Vec<String>,
}

impl EmailDomainAllowList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|domain| {
                    let domain: String = domain.into();
                    domain.trim_start_matches('@').to_ascii_lowercase()
                })
                .collect(),
        }
    }
}

impl Authorizer for EmailDomainAllowList {
    fn authorize(&self, context: &AuthContext) -> Result<(), GatewayError> {
        let Some(claims) = &context.claims else {
            return Ok(());
        };

        let Some(email) = claims.get("email").and_then(|email| email.as_str()) else {
            return Err(GatewayError::denied(
                StatusCode::INTERNAL_SERVER_ERROR,
                "ID_TOKEN_NO_EMAIL_CLAIM",
                "Your ID token is missing an email claim",
            ));
        };

        let domain = email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or_default();
        if self.domains.iter().any(|allowed| allowed.eq_ignore_ascii_case(domain)) {
            return Ok(());
        }

        Err(GatewayError::denied(
            StatusCode::BAD_REQUEST,
            "EMAIL_DOMAIN_NOT_ALLOWED",
            format!("Your email address ending with @{domain} is not allowed here."),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use serde_json::json;

    fn context(claims: Option<serde_json::Value>) -> AuthContext {
        AuthContext {
            session: Session {
                token_type: "Bearer".to_string(),
                access_token: "token".to_string(),
                id_token: None,
                refresh_token: None,
                expires_in: None,
                scope: None,
            },
            claims: claims.map(|claims| claims.as_object().cloned().unwrap_or_default()),
        }
    }

    #[test]
    fn test_allows_listed_domain() {
        let policy = EmailDomainAllowList::new(["@example.com", "Someimportantcompany.com"]);

        assert!(policy.authorize(&context(Some(json!({ "email": "jdoe@example.com" })))).is_ok());
        assert!(policy
            .authorize(&context(Some(json!({ "email": "jdoe@SOMEIMPORTANTCOMPANY.COM" }))))
            .is_ok());
    }

    #[test]
    fn test_rejects_other_domain() {
        let policy = EmailDomainAllowList::new(["example.com"]);

        let err = policy
            .authorize(&context(Some(json!({ "email": "jdoe@gmail.com" }))))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "EMAIL_DOMAIN_NOT_ALLOWED");
        assert_eq!(err.description(), "Your email address ending with @gmail.com is not allowed here.");
    }

    #[test]
    fn test_rejects_missing_email_claim() {
        let policy = EmailDomainAllowList::new(["example.com"]);

        let err = policy.authorize(&context(Some(json!({ "sub": "u1" })))).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "ID_TOKEN_NO_EMAIL_CLAIM");
    }

    #[test]
    fn test_allows_sessions_without_claims() {
        let policy = EmailDomainAllowList::new(["example.com"]);

        assert!(policy.authorize(&context(None)).is_ok());
    }
}
