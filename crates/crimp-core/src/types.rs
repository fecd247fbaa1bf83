// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the crimp workspace.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Name of the queue carrying jobs from the request-handling process to the worker.
pub const TASKS_QUEUE: &str = "tasks";

/// Name of the queue carrying results from the worker to the notifier.
pub const RESULTS_QUEUE: &str = "results";

/// Fixed textual format for expiry dates, in input and display.
pub const DATE_FMT: &str = "%d.%m.%Y";

/// Fixed textual format for visit timestamps, in input and display.
pub const DATE_TIME_FMT: &str = "%d.%m.%Y %H:%M";

/// A user's role tag.
///
/// Replaces the loosely-typed string status of the original data model with
/// a closed set validated at parse time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Known to the bot but has not completed registration.
    Unregistered,
    /// Completed the registration flow (shared contact, confirmed name).
    Registered,
    /// May trigger administrative jobs and receives fallback notifications.
    Admin,
    /// Internal diagnostics access.
    Developer,
}

/// A small set of role tags, stored as a comma-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: BTreeSet<Role>,
}

impl RoleSet {
    /// An empty role set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing exactly one role.
    pub fn single(role: Role) -> Self {
        let mut roles = BTreeSet::new();
        roles.insert(role);
        Self { roles }
    }

    /// Parse a comma-joined tag string. Unknown tags are dropped.
    pub fn parse(raw: &str) -> Self {
        let roles = raw
            .split(',')
            .filter_map(|tag| tag.trim().parse::<Role>().ok())
            .collect();
        Self { roles }
    }

    /// Render back to the comma-joined storage form.
    pub fn encode(&self) -> String {
        self.roles
            .iter()
            .map(Role::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn insert(&mut self, role: Role) {
        self.roles.insert(role);
    }

    pub fn remove(&mut self, role: Role) {
        self.roles.remove(&role);
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::Registered.to_string(), "registered");
        assert_eq!("developer".parse::<Role>().unwrap(), Role::Developer);
    }

    #[test]
    fn role_set_parse_drops_unknown_tags() {
        let set = RoleSet::parse("registered, bogus ,admin");
        assert!(set.contains(Role::Registered));
        assert!(set.contains(Role::Admin));
        assert!(!set.contains(Role::Developer));
        assert_eq!(set.encode(), "registered,admin");
    }

    #[test]
    fn role_set_encode_is_stable() {
        let mut set = RoleSet::single(Role::Admin);
        set.insert(Role::Registered);
        // BTreeSet ordering: declaration order of the enum.
        assert_eq!(set.encode(), "registered,admin");
        assert_eq!(RoleSet::parse(&set.encode()), set);
    }

    #[test]
    fn empty_role_set_encodes_empty() {
        let set = RoleSet::parse("");
        assert!(set.is_empty());
        assert_eq!(set.encode(), "");
    }
}
