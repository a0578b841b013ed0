//! Error handling for the gateway.
//!
//! [`GatewayError`] is what the gateway shows a browser when it cannot let a
//! request through. Each variant maps to a status, a machine-readable code
//! and a description safe to render on the error page.

use crate::config::ConfigError;
use crate::oidc::id_token::IdTokenError;
use crate::oidc::token_exchange::ExchangeError;
use crate::session::CodecError;
use http::StatusCode;

/// Shown when a failure carries no description of its own.
pub const GENERIC_DESCRIPTION: &str = "Something went wrong trying to sign-in";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing code from query")]
    MissingCode,
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("id token rejected: {0}")]
    IdToken(#[from] IdTokenError),
    #[error("could not encode session cookie: {0}")]
    Codec(#[from] CodecError),
    /// Raised by downstream authorizers.
    #[error("{code}: {description}")]
    Denied {
        status: StatusCode,
        code: String,
        description: String,
    },
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl GatewayError {
    pub fn denied(status: StatusCode, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Denied {
            status,
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCode => StatusCode::BAD_REQUEST,
            Self::Denied { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::MissingCode => "req_missing_code",
            Self::Config(_) => "config_error",
            Self::Exchange(err) => err.code(),
            Self::IdToken(_) => "id_token_invalid",
            Self::Codec(_) => "cookie_error",
            Self::Denied { code, .. } => code.as_str(),
        }
    }

    /// Text for the error page. Never includes secrets or token values.
    pub fn description(&self) -> &str {
        match self {
            Self::MissingCode => "Missing code from query",
            Self::Exchange(err) => err.description().unwrap_or(GENERIC_DESCRIPTION),
            Self::Denied { description, .. } => description.as_str(),
            _ => GENERIC_DESCRIPTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_code() {
        let err = GatewayError::MissingCode;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "req_missing_code");
    }

    #[test]
    fn test_provider_description_is_surfaced() {
        let err = GatewayError::from(ExchangeError::Provider {
            status: 400,
            error_code: Some("invalid_request".to_string()),
            error_description: "Something went really wrong".to_string(),
        });

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.description(), "Something went really wrong");
    }

    #[test]
    fn test_unclassified_failures_are_generic() {
        let err = GatewayError::from(ExchangeError::Upstream { status: 502 });
        assert_eq!(err.code(), "upstream_error");
        assert_eq!(err.description(), GENERIC_DESCRIPTION);

        let err = GatewayError::from(IdTokenError::EmptyClaims);
        assert_eq!(err.code(), "id_token_invalid");
        assert_eq!(err.description(), GENERIC_DESCRIPTION);

        let err = GatewayError::from(ConfigError::MissingValue("base_url"));
        assert_eq!(err.code(), "config_error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_denied() {
        let err = GatewayError::denied(StatusCode::FORBIDDEN, "NOPE", "Not for you");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "NOPE");
        assert_eq!(err.description(), "Not for you");
    }
}
