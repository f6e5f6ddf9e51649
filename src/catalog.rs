//! The Role Catalog: static mapping from guild role ids to team names.
//!
//! Loaded once from the `[[teams]]` config tables at startup and never
//! mutated afterwards.

use crate::config::TeamEntry;
use crate::types::RoleId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RoleCatalog {
    teams: HashMap<RoleId, String>,
}

impl RoleCatalog {
    pub fn from_entries(entries: &[TeamEntry]) -> Self {
        let teams = entries
            .iter()
            .map(|e| (RoleId(e.role_id), e.name.clone()))
            .collect();
        Self { teams }
    }

    /// The display name for a catalog role, if it is one.
    pub fn team_name(&self, role: RoleId) -> Option<&str> {
        self.teams.get(&role).map(String::as_str)
    }

    pub fn contains(&self, role: RoleId) -> bool {
        self.teams.contains_key(&role)
    }

    /// Find a member's team role among their full role set.
    ///
    /// A member is expected to hold at most one catalog role; if the
    /// directory disagrees, the first match wins and the invariant is
    /// restored on the next release/acceptance.
    pub fn team_role_among(&self, roles: &[RoleId]) -> Option<RoleId> {
        roles.iter().copied().find(|r| self.contains(*r))
    }

    /// Every catalog role a member currently holds.
    pub fn team_roles_among<'a>(
        &'a self,
        roles: &'a [RoleId],
    ) -> impl Iterator<Item = RoleId> + 'a {
        roles.iter().copied().filter(|r| self.contains(*r))
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RoleCatalog {
        RoleCatalog::from_entries(&[
            TeamEntry {
                role_id: 1,
                name: "Arsenal".to_string(),
            },
            TeamEntry {
                role_id: 2,
                name: "AC Milan".to_string(),
            },
        ])
    }

    #[test]
    fn looks_up_team_names() {
        let catalog = catalog();
        assert_eq!(catalog.team_name(RoleId(1)), Some("Arsenal"));
        assert_eq!(catalog.team_name(RoleId(99)), None);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn finds_team_role_in_member_role_set() {
        let catalog = catalog();
        let roles = [RoleId(50), RoleId(2), RoleId(7)];
        assert_eq!(catalog.team_role_among(&roles), Some(RoleId(2)));
        assert_eq!(catalog.team_role_among(&[RoleId(50)]), None);
    }

    #[test]
    fn lists_all_held_catalog_roles() {
        let catalog = catalog();
        let roles = [RoleId(1), RoleId(2), RoleId(3)];
        let held: Vec<_> = catalog.team_roles_among(&roles).collect();
        assert_eq!(held, vec![RoleId(1), RoleId(2)]);
    }
}
