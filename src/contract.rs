//! The contract entity and the in-memory store of pending offers.
//!
//! The store is the only mutable shared state in the core. Every
//! operation takes the lock once and finishes without suspending, so an
//! accept attempt, a second accept attempt, and the expiry sweep can
//! interleave freely at the task level while each observes the map
//! atomically. [`ContractStore::claim`] is the check-and-remove that
//! guarantees at-most-one acceptance.

use crate::types::{ContractId, MessageRef, RoleId, UserId};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;

/// Lifecycle of a single offer.
///
/// `Pending` is the only state held in the store; the terminal states
/// exist on the value handed back to whichever path resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractState {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

/// A contract offer from a manager to a prospective player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub id: ContractId,
    pub issuer: UserId,
    pub target: UserId,
    /// The role granted on acceptance, always the issuer's own team role.
    pub team_role: RoleId,
    /// Catalog display name snapshotted at offer time.
    pub team_name: String,
    /// Free-text label from the command; display-only.
    pub role_label: String,
    /// Free-text label from the command; display-only.
    pub position: String,
    /// Team headcount at offer time, for the embed.
    pub roster_size: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: ContractState,
    /// The delivered offer DM, recorded after a successful send.
    pub dm_message: Option<MessageRef>,
}

impl Contract {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Time source, injectable so tests can advance virtual time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generate a fresh short contract id.
///
/// Uniqueness is best-effort; the store rejects collisions among pending
/// contracts and the workflow regenerates once on that path.
pub fn random_contract_id() -> ContractId {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    ContractId::new(format!("{:06}", n)).expect("decimal token is always valid")
}

/// Why a claim attempt did not win the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// No pending contract under that id (never existed, already
    /// accepted, or already swept).
    NotFound,
    /// The interacting user is not the offer's target; the contract
    /// stays pending.
    NotTarget,
    /// Past expiry at claim time; the entry is removed.
    Expired,
}

/// In-memory registry of pending contracts, keyed by contract id.
#[derive(Debug, Default)]
pub struct ContractStore {
    pending: Mutex<HashMap<ContractId, Contract>>,
}

/// Insert failure: the id is already taken by a pending contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateContractId(pub ContractId);

impl ContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending contract. Rejects an id already present rather
    /// than silently overwriting it.
    pub fn insert(&self, contract: Contract) -> Result<(), DuplicateContractId> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&contract.id) {
            return Err(DuplicateContractId(contract.id));
        }
        pending.insert(contract.id.clone(), contract);
        Ok(())
    }

    pub fn get(&self, id: &ContractId) -> Option<Contract> {
        self.pending.lock().get(id).cloned()
    }

    /// Remove a contract if present. Idempotent; returns whether an
    /// entry was actually removed.
    pub fn remove(&self, id: &ContractId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    /// Record the delivered DM on a still-pending contract.
    pub fn record_delivery(&self, id: &ContractId, message: MessageRef) {
        if let Some(contract) = self.pending.lock().get_mut(id) {
            contract.dm_message = Some(message);
        }
    }

    /// Atomically claim a contract for acceptance.
    ///
    /// Presence, target identity, and expiry are all checked under one
    /// lock, and the entry is removed before the winner is returned, so
    /// concurrent accept attempts (or an accept racing the sweep) yield
    /// exactly one winner. The side effects of acceptance happen strictly
    /// after the claim.
    pub fn claim(
        &self,
        id: &ContractId,
        claimant: UserId,
        now: DateTime<Utc>,
    ) -> Result<Contract, ClaimError> {
        let mut pending = self.pending.lock();

        let contract = pending.get(id).ok_or(ClaimError::NotFound)?;

        if contract.target != claimant {
            return Err(ClaimError::NotTarget);
        }

        if contract.is_expired(now) {
            pending.remove(id);
            return Err(ClaimError::Expired);
        }

        let mut contract = pending.remove(id).expect("checked above");
        contract.state = ContractState::Accepted;
        Ok(contract)
    }

    /// Remove and return every contract past its expiry.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<Contract> {
        let mut pending = self.pending.lock();
        let expired_ids: Vec<ContractId> = pending
            .values()
            .filter(|c| c.is_expired(now))
            .map(|c| c.id.clone())
            .collect();

        expired_ids
            .into_iter()
            .filter_map(|id| {
                pending.remove(&id).map(|mut c| {
                    c.state = ContractState::Expired;
                    c
                })
            })
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Build a pending contract from offer parameters.
#[allow(clippy::too_many_arguments)]
pub fn new_contract(
    id: ContractId,
    issuer: UserId,
    target: UserId,
    team_role: RoleId,
    team_name: String,
    role_label: String,
    position: String,
    roster_size: usize,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Contract {
    Contract {
        id,
        issuer,
        target,
        team_role,
        team_name,
        role_label,
        position,
        roster_size,
        created_at: now,
        expires_at: now + ttl,
        state: ContractState::Pending,
        dm_message: None,
    }
}
