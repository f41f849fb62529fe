//! Command-boundary authorization, checked before dispatch.

use renqing_auth::{
    AuthzError, CommandAuthorization, LedgerMembership, Permission, Principal, authorize,
};

use crate::context::{LedgerContext, PrincipalContext};

/// Check a command's required permissions in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    ledger: &LedgerContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = LedgerMembership {
        ledger_id: ledger.ledger_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_ledger_id: ledger.ledger_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Role→permission mapping.
///
/// The token's ledger IS the boundary: the "owner" role (every account on
/// its own books) and "admin" both grant everything within it.
fn permissions_from_roles(roles: &[renqing_auth::Role]) -> Vec<Permission> {
    if roles
        .iter()
        .any(|r| r.as_str() == "admin" || r.as_str() == "owner")
    {
        return vec![Permission::new("*")];
    }

    Vec::new()
}
