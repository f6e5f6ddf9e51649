//! The offer workflow: creation, acceptance, release, promotion, and
//! expiry sweeping, expressed over gateway-agnostic collaborator traits
//! so the whole state machine runs in tests without a Discord
//! connection.

use crate::authz::{self, CapabilitySet, CommandKind};
use crate::catalog::RoleCatalog;
use crate::config::Config;
use crate::contract::{new_contract, random_contract_id, Clock, Contract, ContractStore};
use crate::error::{DeliveryError, DirectoryError, WorkflowError};
use crate::types::{ChannelId, ContractId, MessageRef, RoleId, UserId};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

/// External source of truth for a member's role set.
///
/// The guild may be mutated behind our back (manual admin action), so
/// callers re-fetch through this trait immediately before mutating.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn member_role_ids(&self, user: UserId) -> Result<Vec<RoleId>, DirectoryError>;
    async fn add_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError>;
    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError>;
    /// How many members currently hold a role. Display-only.
    async fn role_member_count(&self, role: RoleId) -> Result<usize, DirectoryError>;
}

/// Direct-message delivery of offers to their targets.
#[async_trait]
pub trait OfferMailbox: Send + Sync {
    /// Send the offer DM with its accept control; returns a reference to
    /// the delivered message.
    async fn deliver(&self, contract: &Contract) -> Result<MessageRef, DeliveryError>;
    /// Best-effort notice that an offer lapsed unanswered.
    async fn notify_expired(&self, contract: &Contract);
}

/// Fire-and-forget broadcast sink for the announcement channels.
#[async_trait]
pub trait AnnouncementSink: Send + Sync {
    async fn announce(&self, channel: ChannelId, event: &Announcement);
}

/// Public announcements posted to the per-purpose channels.
#[derive(Debug, Clone)]
pub enum Announcement {
    ContractSigned {
        contract: Contract,
        /// False when the directory rejected the role grant; the signing
        /// is still announced with the partial outcome.
        role_granted: bool,
    },
    PlayerReleased {
        user: UserId,
        team_name: String,
    },
    PlayerPromoted {
        user: UserId,
    },
    PlayerDemoted {
        user: UserId,
    },
}

/// Result of a winning accept.
#[derive(Debug)]
pub struct Acceptance {
    pub contract: Contract,
    /// Set when the role grant failed after the claim; the contract is
    /// not rolled back on this path.
    pub grant_error: Option<DirectoryError>,
}

/// Result of a successful release.
#[derive(Debug, Clone)]
pub struct Release {
    pub team_role: RoleId,
    pub team_name: String,
}

/// Orchestrates a contract's life from `/offer` to acceptance or expiry.
pub struct OfferWorkflow {
    directory: Arc<dyn MembershipDirectory>,
    mailbox: Arc<dyn OfferMailbox>,
    sink: Arc<dyn AnnouncementSink>,
    store: Arc<ContractStore>,
    catalog: Arc<RoleCatalog>,
    clock: Arc<dyn Clock>,
    manager_role: RoleId,
    assistant_role: RoleId,
    contract_channel: ChannelId,
    release_channel: ChannelId,
    promote_channel: ChannelId,
    demote_channel: ChannelId,
    offer_ttl: Duration,
    notify_on_expiry: bool,
}

impl OfferWorkflow {
    pub fn new(
        directory: Arc<dyn MembershipDirectory>,
        mailbox: Arc<dyn OfferMailbox>,
        sink: Arc<dyn AnnouncementSink>,
        store: Arc<ContractStore>,
        catalog: Arc<RoleCatalog>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            directory,
            mailbox,
            sink,
            store,
            catalog,
            clock,
            manager_role: RoleId(config.roles.manager),
            assistant_role: RoleId(config.roles.assistant_manager),
            contract_channel: ChannelId(config.channels.contracts),
            release_channel: ChannelId(config.channels.releases),
            promote_channel: ChannelId(config.channels.promotions),
            demote_channel: ChannelId(config.channels.demotions),
            offer_ttl: Duration::seconds(config.contracts.offer_ttl_secs as i64),
            notify_on_expiry: config.contracts.notify_on_expiry,
        }
    }

    fn authorize(
        &self,
        caller_roles: &[RoleId],
        is_administrator: bool,
        kind: CommandKind,
    ) -> Result<(), WorkflowError> {
        let caps = CapabilitySet::from_member(caller_roles, self.manager_role, is_administrator);
        authz::authorize(caps, kind)
    }

    /// Create a pending contract and deliver the offer DM.
    ///
    /// The granted role is always derived from the issuer's own team
    /// role; the `role_label` argument is carried for display only. A
    /// failed delivery removes the contract again so no undeliverable
    /// offer lingers in the store.
    pub async fn offer(
        &self,
        issuer: UserId,
        issuer_roles: &[RoleId],
        is_administrator: bool,
        target: UserId,
        role_label: String,
        position: String,
    ) -> Result<Contract, WorkflowError> {
        self.authorize(issuer_roles, is_administrator, CommandKind::Offer)?;

        let team_role = self
            .catalog
            .team_role_among(issuer_roles)
            .ok_or(WorkflowError::NoTeamRole { user: issuer })?;
        let team_name = self
            .catalog
            .team_name(team_role)
            .unwrap_or_default()
            .to_string();

        let roster_size = match self.directory.role_member_count(team_role).await {
            Ok(count) => count,
            Err(e) => {
                warn!("roster size lookup failed for {team_role}: {e}");
                0
            }
        };

        let now = self.clock.now();
        let mut contract = new_contract(
            random_contract_id(),
            issuer,
            target,
            team_role,
            team_name,
            role_label,
            position,
            roster_size,
            now,
            self.offer_ttl,
        );

        if self.store.insert(contract.clone()).is_err() {
            // One regeneration on collision, then give up.
            contract.id = random_contract_id();
            self.store
                .insert(contract.clone())
                .map_err(|_| WorkflowError::DuplicateContractId { attempts: 2 })?;
        }

        match self.mailbox.deliver(&contract).await {
            Ok(message) => {
                self.store.record_delivery(&contract.id, message);
                contract.dm_message = Some(message);
                info!(
                    contract = %contract.id,
                    issuer = %issuer,
                    target = %target,
                    team = %contract.team_name,
                    "contract offer delivered"
                );
                Ok(contract)
            }
            Err(source) => {
                self.store.remove(&contract.id);
                Err(WorkflowError::DeliveryFailed { source })
            }
        }
    }

    /// Resolve an accept-control click.
    ///
    /// The claim against the store is the first action taken; every
    /// externally visible side effect happens only after this task has
    /// won the contract, which closes the double-click race.
    pub async fn accept(
        &self,
        claimant: UserId,
        id: &ContractId,
    ) -> Result<Acceptance, WorkflowError> {
        let now = self.clock.now();
        let contract = self
            .store
            .claim(id, claimant, now)
            .map_err(|_| WorkflowError::InvalidOrExpired)?;

        let grant_error = self.grant_team_role(claimant, contract.team_role).await.err();
        if let Some(e) = &grant_error {
            warn!(contract = %contract.id, "role grant failed after claim: {e}");
        } else {
            info!(
                contract = %contract.id,
                signee = %claimant,
                team = %contract.team_name,
                "contract accepted"
            );
        }

        self.sink
            .announce(
                self.contract_channel,
                &Announcement::ContractSigned {
                    contract: contract.clone(),
                    role_granted: grant_error.is_none(),
                },
            )
            .await;

        Ok(Acceptance {
            contract,
            grant_error,
        })
    }

    /// Grant a team role, first clearing any catalog role the member
    /// already holds so the single-team-role invariant survives.
    async fn grant_team_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError> {
        let current = self.directory.member_role_ids(user).await?;
        for held in self.catalog.team_roles_among(&current) {
            if held != role {
                self.directory.remove_role(user, held).await?;
            }
        }
        if !current.contains(&role) {
            self.directory.add_role(user, role).await?;
        }
        Ok(())
    }

    /// Release a player from their team.
    pub async fn release(
        &self,
        caller_roles: &[RoleId],
        is_administrator: bool,
        target: UserId,
    ) -> Result<Release, WorkflowError> {
        self.authorize(caller_roles, is_administrator, CommandKind::Release)?;

        let roles = self.directory.member_role_ids(target).await?;
        let team_role = self
            .catalog
            .team_role_among(&roles)
            .ok_or(WorkflowError::NoTeamRole { user: target })?;
        let team_name = self
            .catalog
            .team_name(team_role)
            .unwrap_or_default()
            .to_string();

        // Remove every held catalog role, not just the first, so a
        // member in an inconsistent state comes out clean.
        for held in self.catalog.team_roles_among(&roles) {
            self.directory.remove_role(target, held).await?;
        }

        info!(player = %target, team = %team_name, "player released");

        self.sink
            .announce(
                self.release_channel,
                &Announcement::PlayerReleased {
                    user: target,
                    team_name: team_name.clone(),
                },
            )
            .await;

        Ok(Release {
            team_role,
            team_name,
        })
    }

    /// Grant the Assistant Manager role.
    pub async fn promote(
        &self,
        caller_roles: &[RoleId],
        is_administrator: bool,
        target: UserId,
    ) -> Result<(), WorkflowError> {
        self.authorize(caller_roles, is_administrator, CommandKind::Promote)?;

        self.directory.add_role(target, self.assistant_role).await?;
        info!(player = %target, "player promoted to assistant manager");

        self.sink
            .announce(
                self.promote_channel,
                &Announcement::PlayerPromoted { user: target },
            )
            .await;

        Ok(())
    }

    /// Revoke the Assistant Manager role.
    pub async fn demote(
        &self,
        caller_roles: &[RoleId],
        is_administrator: bool,
        target: UserId,
    ) -> Result<(), WorkflowError> {
        self.authorize(caller_roles, is_administrator, CommandKind::Demote)?;

        self.directory
            .remove_role(target, self.assistant_role)
            .await?;
        info!(player = %target, "player demoted from assistant manager");

        self.sink
            .announce(
                self.demote_channel,
                &Announcement::PlayerDemoted { user: target },
            )
            .await;

        Ok(())
    }

    /// One expiry sweep pass: drop lapsed offers and (optionally) tell
    /// their targets. No role mutation happens on this path.
    pub async fn sweep_once(&self) -> usize {
        let swept = self.store.sweep_expired(self.clock.now());
        if swept.is_empty() {
            return 0;
        }

        info!(count = swept.len(), "swept expired contract offers");
        if self.notify_on_expiry {
            for contract in &swept {
                self.mailbox.notify_expired(contract).await;
            }
        }
        swept.len()
    }
}
