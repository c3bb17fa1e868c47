//! `stockledger-auth`: authorization boundary for stock actions.
//!
//! This crate is intentionally decoupled from HTTP and storage: it decides
//! *whether* a principal may act, validates bearer claims and issues/consumes
//! anti-forgery form tokens.

pub mod authorize;
pub mod claims;
pub mod form_token;
pub mod permissions;
pub mod roles;

pub use authorize::{authorize, permissions_for_roles, AuthzError, Principal};
pub use claims::{validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use form_token::{FormTokenError, FormTokens};
pub use permissions::Permission;
pub use roles::Role;
