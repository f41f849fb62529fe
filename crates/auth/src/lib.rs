//! `renqing-auth` — authentication/authorization boundary.
//!
//! Token signature checking, claims validation, and the permission model.
//! Account management (sign-up, passwords) lives outside this service; we
//! only consume bearer tokens minted by the identity provider.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, sign_claims};
pub use permissions::Permission;
pub use principal::{LedgerMembership, PrincipalId};
pub use roles::Role;
