//! Typed capability checks for the command surface.
//!
//! The authorization requirement of every command is declared once in
//! [`required_capability`] instead of being re-derived from raw role-id
//! string comparisons inside each handler.

use crate::error::WorkflowError;
use crate::types::RoleId;
use std::fmt;

/// A capability the caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Granted by the configured manager role.
    Manager,
    /// Granted by the Discord administrator permission bit.
    Administrator,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manager => write!(f, "Manager"),
            Self::Administrator => write!(f, "Administrator"),
        }
    }
}

/// The six inbound command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Offer,
    Release,
    Promote,
    Demote,
    RosterView,
    Say,
}

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "offer" => Some(Self::Offer),
            "release" => Some(Self::Release),
            "promote" => Some(Self::Promote),
            "demote" => Some(Self::Demote),
            "roster_view" => Some(Self::RosterView),
            "say" => Some(Self::Say),
            _ => None,
        }
    }
}

/// The authorization policy table: command -> required capability.
pub fn required_capability(kind: CommandKind) -> Option<Capability> {
    match kind {
        CommandKind::Offer
        | CommandKind::Release
        | CommandKind::Promote
        | CommandKind::Demote => Some(Capability::Manager),
        CommandKind::RosterView => None,
        CommandKind::Say => Some(Capability::Administrator),
    }
}

/// The capabilities an acting member actually holds, derived from their
/// current role set and permission bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilitySet {
    manager: bool,
    administrator: bool,
}

impl CapabilitySet {
    pub fn from_member(roles: &[RoleId], manager_role: RoleId, is_administrator: bool) -> Self {
        Self {
            manager: roles.contains(&manager_role),
            administrator: is_administrator,
        }
    }

    pub fn holds(&self, capability: Capability) -> bool {
        match capability {
            Capability::Manager => self.manager,
            Capability::Administrator => self.administrator,
        }
    }
}

/// Check the caller against the policy table for one command.
pub fn authorize(caps: CapabilitySet, kind: CommandKind) -> Result<(), WorkflowError> {
    match required_capability(kind) {
        Some(required) if !caps.holds(required) => Err(WorkflowError::Unauthorized { required }),
        _ => Ok(()),
    }
}
