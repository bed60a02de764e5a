// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Back-office roles for authorization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Flattened set of role names taken from token claims.
///
/// Names are kept exactly as the identity provider issued them; matching
/// against [`Role`] is case-insensitive.
pub type RoleSet = BTreeSet<String>;

/// Roles the back-office knows how to route.
///
/// ## Landing Areas
///
/// - `Cashier` - point-of-sale checkout
/// - `Manager` - administration
/// - `Warehouse` - catalog and inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Point-of-sale staff
    Cashier,
    /// Store manager
    Manager,
    /// Warehouse staff
    Warehouse,
}

impl Role {
    /// Every known role, in landing precedence order.
    pub const ALL: [Role; 3] = [Role::Cashier, Role::Manager, Role::Warehouse];

    /// Role name as issued by the identity provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "CASHIER",
            Role::Manager => "MANAGER",
            Role::Warehouse => "WAREHOUSE",
        }
    }

    /// Landing view of users holding this role.
    pub fn landing_path(&self) -> &'static str {
        match self {
            Role::Cashier => "/cash",
            Role::Manager => "/admin",
            Role::Warehouse => "/warehouse",
        }
    }

    /// Check whether a role set grants this role, in any letter case.
    pub fn granted_by(&self, roles: &RoleSet) -> bool {
        roles.iter().any(|r| r.eq_ignore_ascii_case(self.as_str()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn precedence_order_and_landings() {
        let landings: Vec<_> = Role::ALL.iter().map(|r| r.landing_path()).collect();
        assert_eq!(landings, ["/cash", "/admin", "/warehouse"]);
    }

    #[test]
    fn granted_by_ignores_case() {
        assert!(Role::Cashier.granted_by(&roles(&["cashier"])));
        assert!(Role::Cashier.granted_by(&roles(&["CASHIER", "uma_authorization"])));
        assert!(!Role::Manager.granted_by(&roles(&["CASHIER"])));
        assert!(!Role::Warehouse.granted_by(&RoleSet::new()));
    }

    #[test]
    fn display_uses_provider_spelling() {
        assert_eq!(Role::Warehouse.to_string(), "WAREHOUSE");
    }
}
