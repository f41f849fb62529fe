use axum::http::StatusCode;

use renqing_auth::{CommandAuthorization, Permission};
use renqing_core::AggregateId;

use crate::app::errors;
use crate::authz;
use crate::context::{LedgerContext, PrincipalContext};

/// Permission requirement checked at the command boundary.
pub struct RequiredPermissions(Vec<Permission>);

impl RequiredPermissions {
    pub fn one(name: &'static str) -> Self {
        Self(vec![Permission::new(name)])
    }
}

impl CommandAuthorization for RequiredPermissions {
    fn required_permissions(&self) -> &[Permission] {
        &self.0
    }
}

/// Authorize or produce the 403 response to return.
pub fn guard(
    ledger: &LedgerContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), axum::response::Response> {
    let required = RequiredPermissions::one(permission);
    authz::authorize_command(ledger, principal, &required)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

/// Parse a path id or produce the 400 response to return.
pub fn parse_id(
    raw: &str,
    what: &'static str,
) -> Result<AggregateId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
