//! Static role definitions for the pharmacy staff roles.
//!
//! Every user carries exactly one role; permissions are derived from this
//! table at token issue time and embedded in the JWT claims.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_PHARMACIST: &str = "pharmacist";
pub const ROLE_NURSE: &str = "nurse";
pub const ROLE_MEDTECH: &str = "medtech";

pub const ALL_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_PHARMACIST, ROLE_NURSE, ROLE_MEDTECH];

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const USERS_READ: &str = "users:read";
    pub const USERS_MANAGE: &str = "users:manage";

    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_MANAGE: &str = "products:manage";
    pub const BATCHES_MANAGE: &str = "batches:manage";

    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_REVIEW: &str = "orders:review";
    pub const ORDERS_DISPENSE: &str = "orders:dispense";
    pub const ORDERS_CANCEL: &str = "orders:cancel";

    pub const POS_CREATE: &str = "pos:create";
    pub const POS_READ: &str = "pos:read";
    pub const PAYMENTS_MANAGE: &str = "payments:manage";

    pub const PATIENTS_READ: &str = "patients:read";
    pub const PATIENTS_MANAGE: &str = "patients:manage";

    pub const NOTIFICATIONS_READ: &str = "notifications:read";
    pub const ANALYTICS_READ: &str = "analytics:read";
    pub const AUDIT_READ: &str = "audit:read";
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        use consts::*;
        let mut roles = HashMap::new();

        // Admins bypass permission checks entirely; the list is informational.
        roles.insert(
            ROLE_ADMIN.to_string(),
            Role {
                name: ROLE_ADMIN.to_string(),
                description: "Administrator with full access".to_string(),
                permissions: vec!["admin:*".to_string()],
            },
        );

        roles.insert(
            ROLE_PHARMACIST.to_string(),
            Role {
                name: ROLE_PHARMACIST.to_string(),
                description: "Pharmacist: owns inventory, dispensing, and point of sale".to_string(),
                permissions: vec![
                    PRODUCTS_READ.to_string(),
                    PRODUCTS_MANAGE.to_string(),
                    BATCHES_MANAGE.to_string(),
                    ORDERS_READ.to_string(),
                    ORDERS_REVIEW.to_string(),
                    ORDERS_DISPENSE.to_string(),
                    POS_CREATE.to_string(),
                    POS_READ.to_string(),
                    PAYMENTS_MANAGE.to_string(),
                    PATIENTS_READ.to_string(),
                    ANALYTICS_READ.to_string(),
                    NOTIFICATIONS_READ.to_string(),
                ],
            },
        );

        roles.insert(
            ROLE_NURSE.to_string(),
            Role {
                name: ROLE_NURSE.to_string(),
                description: "Ward nurse: raises and tracks medication order requests".to_string(),
                permissions: vec![
                    PRODUCTS_READ.to_string(),
                    ORDERS_READ.to_string(),
                    ORDERS_CREATE.to_string(),
                    ORDERS_CANCEL.to_string(),
                    PATIENTS_READ.to_string(),
                    PATIENTS_MANAGE.to_string(),
                    NOTIFICATIONS_READ.to_string(),
                ],
            },
        );

        roles.insert(
            ROLE_MEDTECH.to_string(),
            Role {
                name: ROLE_MEDTECH.to_string(),
                description: "Medical technologist: raises order requests for lab supplies".to_string(),
                permissions: vec![
                    PRODUCTS_READ.to_string(),
                    ORDERS_READ.to_string(),
                    ORDERS_CREATE.to_string(),
                    ORDERS_CANCEL.to_string(),
                    PATIENTS_READ.to_string(),
                    NOTIFICATIONS_READ.to_string(),
                ],
            },
        );

        roles
    };
}

/// Permissions granted to a role name; unknown roles get none.
pub fn permissions_for_role(role: &str) -> Vec<String> {
    ROLES
        .get(role)
        .map(|r| r.permissions.clone())
        .unwrap_or_default()
}

pub fn is_valid_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_role_is_in_the_table() {
        for role in ALL_ROLES {
            assert!(ROLES.contains_key(*role), "missing role: {}", role);
        }
    }

    #[test]
    fn pharmacist_can_dispense_but_not_create_orders() {
        let perms = permissions_for_role(ROLE_PHARMACIST);
        assert!(perms.iter().any(|p| p == consts::ORDERS_DISPENSE));
        assert!(!perms.iter().any(|p| p == consts::ORDERS_CREATE));
    }

    #[test]
    fn nurse_cannot_review_orders() {
        let perms = permissions_for_role(ROLE_NURSE);
        assert!(perms.iter().any(|p| p == consts::ORDERS_CREATE));
        assert!(!perms.iter().any(|p| p == consts::ORDERS_REVIEW));
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        assert!(permissions_for_role("janitor").is_empty());
    }
}
