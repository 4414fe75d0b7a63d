//! Role and ownership checks shared by services and HTTP handlers.

use common::UserId;

use super::{Role, User};
use crate::error::{DomainError, Result};

/// Requires the requester to hold `role`.
pub fn require_role(requester: &User, role: Role) -> Result<()> {
    if requester.has_role(role) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!("{role} role required")))
    }
}

pub fn require_admin(requester: &User) -> Result<()> {
    require_role(requester, Role::Admin)
}

/// Requires the requester to be the target user or an admin.
pub fn require_self_or_admin(requester: &User, target: UserId) -> Result<()> {
    if requester.id == target || requester.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "not allowed to access another user".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::identity::Email;

    fn user(role: Role) -> User {
        User::new(
            Email::parse("someone@example.com").unwrap(),
            "hash".to_string(),
            "Some",
            "One",
            role,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn admin_passes_every_check() {
        let admin = user(Role::Admin);
        assert!(require_admin(&admin).is_ok());
        assert!(require_self_or_admin(&admin, UserId::new()).is_ok());
    }

    #[test]
    fn customer_only_reaches_themselves() {
        let customer = user(Role::Customer);
        assert!(require_self_or_admin(&customer, customer.id).is_ok());
        assert!(matches!(
            require_self_or_admin(&customer, UserId::new()),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            require_role(&customer, Role::Carrier),
            Err(DomainError::Forbidden(_))
        ));
    }
}
