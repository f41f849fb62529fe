use std::collections::HashSet;

use thiserror::Error;

use renqing_core::LedgerId;

use crate::{LedgerMembership, Permission, PrincipalId};

/// Fully resolved principal for authorization decisions.
///
/// API and worker layers build this from token claims plus a policy source;
/// constructing it involves no IO here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_ledger_id: LedgerId,
    pub membership: LedgerMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("ledger mismatch")]
    LedgerMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract, checked before dispatch.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Pure policy check: does the principal hold `required` in its active
/// ledger?
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_ledger_id != principal.membership.ledger_id {
        return Err(AuthzError::LedgerMismatch);
    }

    let perms: HashSet<&str> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn principal(ledger: LedgerId, perms: Vec<Permission>) -> Principal {
        Principal {
            principal_id: PrincipalId::new(),
            active_ledger_id: ledger,
            membership: LedgerMembership {
                ledger_id: ledger,
                roles: vec![Role::new("member")],
                permissions: perms,
            },
        }
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(LedgerId::new(), vec![Permission::new("*")]);
        assert!(authorize(&p, &Permission::new("gifts.reply")).is_ok());
    }

    #[test]
    fn exact_permission_grants() {
        let p = principal(LedgerId::new(), vec![Permission::new("gifts.reply")]);
        assert!(authorize(&p, &Permission::new("gifts.reply")).is_ok());
        assert!(matches!(
            authorize(&p, &Permission::new("inventory.adjust")),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn membership_must_match_active_ledger() {
        let mut p = principal(LedgerId::new(), vec![Permission::new("*")]);
        p.active_ledger_id = LedgerId::new();
        assert_eq!(
            authorize(&p, &Permission::new("gifts.reply")),
            Err(AuthzError::LedgerMismatch)
        );
    }
}
