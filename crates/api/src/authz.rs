//! API-side authorization guard for stock actions.
//!
//! Enforced at the action boundary (before any service call), while the
//! services still check the permissions they own.

use stockledger_auth::{authorize, AuthzError, Permission, Principal};

use crate::app::actions::StockAction;
use crate::context::PrincipalContext;

/// Permission an action requires.
pub fn required_permission(action: StockAction) -> Permission {
    match action {
        StockAction::ChangeStock => Permission::STOCK_CHANGE,
        StockAction::RebuildMovements | StockAction::RebuildStock => Permission::STOCK_REBUILD,
    }
}

/// Check authorization for an action in the current request context.
pub fn authorize_action(principal: &PrincipalContext, action: StockAction) -> Result<Principal, AuthzError> {
    let principal = principal.principal();
    authorize(&principal, &required_permission(action))?;
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use stockledger_auth::Role;
    use stockledger_core::UserId;

    use super::*;

    #[test]
    fn warehouse_role_may_change_but_not_rebuild() {
        let clerk = PrincipalContext::new(UserId::new(), vec![Role::WAREHOUSE]);

        assert!(authorize_action(&clerk, StockAction::ChangeStock).is_ok());
        assert!(authorize_action(&clerk, StockAction::RebuildStock).is_err());
        assert!(authorize_action(&clerk, StockAction::RebuildMovements).is_err());
    }

    #[test]
    fn admin_may_do_everything() {
        let admin = PrincipalContext::new(UserId::new(), vec![Role::ADMIN]);

        for action in [StockAction::ChangeStock, StockAction::RebuildMovements, StockAction::RebuildStock] {
            assert!(authorize_action(&admin, action).is_ok());
        }
    }

    #[test]
    fn no_roles_no_access() {
        let nobody = PrincipalContext::new(UserId::new(), Vec::new());
        assert!(authorize_action(&nobody, StockAction::ChangeStock).is_err());
    }
}
