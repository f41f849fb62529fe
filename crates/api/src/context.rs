use renqing_auth::{PrincipalId, Role};
use renqing_core::LedgerId;

/// Ledger context for a request; present on every domain route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LedgerContext {
    ledger_id: LedgerId,
}

impl LedgerContext {
    pub fn new(ledger_id: LedgerId) -> Self {
        Self { ledger_id }
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }
}

/// Authenticated identity plus granted roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self {
            principal_id,
            roles,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
