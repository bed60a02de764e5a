// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Post-login landing redirect.
//!
//! The one-shot guard lives in the session (`redirect_fired`) and is flipped
//! by `SessionStore::landing_redirect`; this type only knows where each role
//! lands and which locations count as entry points.

use super::{path_of, Navigate};
use crate::identity::{Role, RoleSet};

/// Landing rule: first matching role in precedence order wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    entry_paths: Vec<String>,
    landings: Vec<(Role, String)>,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            entry_paths: ["/", "/home", "/login"].map(String::from).to_vec(),
            landings: Role::ALL
                .iter()
                .map(|role| (*role, role.landing_path().to_string()))
                .collect(),
        }
    }
}

impl RedirectPolicy {
    pub fn new(entry_paths: Vec<String>, landings: Vec<(Role, String)>) -> Self {
        Self {
            entry_paths,
            landings,
        }
    }

    /// True if `location` is one of the entry views a redirect may leave.
    pub fn is_entry(&self, location: &str) -> bool {
        let path = path_of(location);
        self.entry_paths.iter().any(|p| p == path)
    }

    /// Landing view of the highest-priority role held.
    pub fn landing_for(&self, roles: &RoleSet) -> Option<&str> {
        self.landings
            .iter()
            .find(|(role, _)| role.granted_by(roles))
            .map(|(_, path)| path.as_str())
    }

    /// Where to send a freshly signed-in user currently at `location`.
    ///
    /// Deep links (anything that is not an entry view) are left alone.
    pub fn destination(&self, location: &str, roles: &RoleSet) -> Option<Navigate> {
        if !self.is_entry(location) {
            return None;
        }
        self.landing_for(roles).map(Navigate::replace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cashier_wins_over_other_roles() {
        let policy = RedirectPolicy::default();
        assert_eq!(
            policy.landing_for(&roles(&["WAREHOUSE", "MANAGER", "CASHIER"])),
            Some("/cash")
        );
        assert_eq!(policy.landing_for(&roles(&["warehouse", "manager"])), Some("/admin"));
        assert_eq!(policy.landing_for(&roles(&["warehouse"])), Some("/warehouse"));
    }

    #[test]
    fn unknown_roles_have_no_landing() {
        let policy = RedirectPolicy::default();
        assert_eq!(policy.destination("/home", &roles(&["offline_access"])), None);
    }

    #[test]
    fn only_entry_locations_redirect() {
        let policy = RedirectPolicy::default();
        let cashier = roles(&["CASHIER"]);
        for entry in ["/", "/home", "/login", "/?state=x&code=y"] {
            assert_eq!(
                policy.destination(entry, &cashier),
                Some(Navigate::replace("/cash")),
                "{entry}"
            );
        }
        assert_eq!(policy.destination("/warehouse/categories", &cashier), None);
        assert_eq!(policy.destination("/admin", &cashier), None);
    }

    #[test]
    fn custom_policy() {
        let policy = RedirectPolicy::new(
            vec!["/start".to_string()],
            vec![(Role::Manager, "/reports".to_string())],
        );
        assert!(!policy.is_entry("/home"));
        assert_eq!(
            policy.destination("/start", &roles(&["MANAGER"])),
            Some(Navigate::replace("/reports"))
        );
    }
}
