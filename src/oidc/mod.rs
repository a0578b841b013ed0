//! Identity-provider plumbing: the authorization-code exchange and ID token checks.

pub mod id_token;
pub mod jwks;
pub mod token_exchange;
