//! End-to-end workflow tests over in-memory collaborators: no gateway,
//! just the store, the catalog, and the offer state machine.

use chrono::{DateTime, Duration, Utc};
use gaffer::authz::Capability;
use gaffer::config::Config;
use gaffer::contract::{Clock, Contract, ContractStore};
use gaffer::error::{DeliveryError, DirectoryError, WorkflowError};
use gaffer::types::{ChannelId, ContractId, MessageRef, RoleId, UserId};
use gaffer::workflow::{
    Announcement, AnnouncementSink, MembershipDirectory, OfferMailbox, OfferWorkflow,
};
use gaffer::RoleCatalog;
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;

const MANAGER: RoleId = RoleId(10);
const ASSISTANT: RoleId = RoleId(11);
const ARSENAL: RoleId = RoleId(100);
const CHELSEA: RoleId = RoleId(101);

const CONTRACT_CHANNEL: ChannelId = ChannelId(30);
const RELEASE_CHANNEL: ChannelId = ChannelId(31);
const PROMOTE_CHANNEL: ChannelId = ChannelId(32);
const DEMOTE_CHANNEL: ChannelId = ChannelId(33);

fn test_config() -> Config {
    toml::from_str(
        r#"
            [discord]
            token = "token"
            guild_id = 1

            [league]
            name = "VEF"

            [roles]
            manager = 10
            assistant_manager = 11

            [channels]
            contracts = 30
            releases = 31
            promotions = 32
            demotions = 33

            [contracts]
            offer_ttl_secs = 60
            sweep_interval_secs = 5
            notify_on_expiry = true

            [[teams]]
            role_id = 100
            name = "Arsenal"

            [[teams]]
            role_id = 101
            name = "Chelsea"
        "#,
    )
    .unwrap()
}

/// In-memory guild role state.
#[derive(Default)]
struct FakeDirectory {
    roles: Mutex<HashMap<UserId, Vec<RoleId>>>,
    fail_role_changes: Mutex<bool>,
}

impl FakeDirectory {
    fn with_member(self, user: UserId, roles: &[RoleId]) -> Self {
        self.roles.lock().insert(user, roles.to_vec());
        self
    }

    fn roles_of(&self, user: UserId) -> Vec<RoleId> {
        self.roles.lock().get(&user).cloned().unwrap_or_default()
    }

    fn set_fail_role_changes(&self, fail: bool) {
        *self.fail_role_changes.lock() = fail;
    }
}

#[async_trait]
impl MembershipDirectory for FakeDirectory {
    async fn member_role_ids(&self, user: UserId) -> Result<Vec<RoleId>, DirectoryError> {
        Ok(self.roles_of(user))
    }

    async fn add_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError> {
        if *self.fail_role_changes.lock() {
            return Err(DirectoryError::RoleAddFailed {
                user,
                role,
                source: "hierarchy conflict".into(),
            });
        }
        let mut roles = self.roles.lock();
        let held = roles.entry(user).or_default();
        if !held.contains(&role) {
            held.push(role);
        }
        Ok(())
    }

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError> {
        if *self.fail_role_changes.lock() {
            return Err(DirectoryError::RoleRemoveFailed {
                user,
                role,
                source: "hierarchy conflict".into(),
            });
        }
        if let Some(held) = self.roles.lock().get_mut(&user) {
            held.retain(|r| *r != role);
        }
        Ok(())
    }

    async fn role_member_count(&self, role: RoleId) -> Result<usize, DirectoryError> {
        Ok(self
            .roles
            .lock()
            .values()
            .filter(|held| held.contains(&role))
            .count())
    }
}

/// Records deliveries instead of sending DMs.
#[derive(Default)]
struct FakeMailbox {
    delivered: Mutex<Vec<Contract>>,
    expiry_notices: Mutex<Vec<ContractId>>,
    fail_delivery: Mutex<bool>,
}

impl FakeMailbox {
    fn set_fail_delivery(&self, fail: bool) {
        *self.fail_delivery.lock() = fail;
    }
}

#[async_trait]
impl OfferMailbox for FakeMailbox {
    async fn deliver(&self, contract: &Contract) -> Result<MessageRef, DeliveryError> {
        if *self.fail_delivery.lock() {
            return Err(DeliveryError::SendFailed {
                user: contract.target,
                source: "DMs disabled".into(),
            });
        }
        let mut delivered = self.delivered.lock();
        delivered.push(contract.clone());
        Ok(MessageRef(delivered.len() as u64))
    }

    async fn notify_expired(&self, contract: &Contract) {
        self.expiry_notices.lock().push(contract.id.clone());
    }
}

/// Records announcements instead of posting them.
#[derive(Default)]
struct FakeSink {
    posted: Mutex<Vec<(ChannelId, Announcement)>>,
}

impl FakeSink {
    fn posted(&self) -> Vec<(ChannelId, Announcement)> {
        self.posted.lock().clone()
    }
}

#[async_trait]
impl AnnouncementSink for FakeSink {
    async fn announce(&self, channel: ChannelId, event: &Announcement) {
        self.posted.lock().push((channel, event.clone()));
    }
}

/// Virtual time, advanced explicitly by tests.
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn at_epoch() -> Self {
        Self {
            now: Mutex::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()),
        }
    }

    fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

struct Harness {
    workflow: OfferWorkflow,
    directory: Arc<FakeDirectory>,
    mailbox: Arc<FakeMailbox>,
    sink: Arc<FakeSink>,
    clock: Arc<ManualClock>,
    store: Arc<ContractStore>,
}

fn harness(directory: FakeDirectory) -> Harness {
    let config = test_config();
    let directory = Arc::new(directory);
    let mailbox = Arc::new(FakeMailbox::default());
    let sink = Arc::new(FakeSink::default());
    let clock = Arc::new(ManualClock::at_epoch());
    let store = Arc::new(ContractStore::new());
    let catalog = Arc::new(RoleCatalog::from_entries(&config.teams));

    let workflow = OfferWorkflow::new(
        Arc::clone(&directory) as Arc<dyn MembershipDirectory>,
        Arc::clone(&mailbox) as Arc<dyn OfferMailbox>,
        Arc::clone(&sink) as Arc<dyn AnnouncementSink>,
        Arc::clone(&store),
        catalog,
        Arc::clone(&clock) as Arc<dyn Clock>,
        &config,
    );

    Harness {
        workflow,
        directory,
        mailbox,
        sink,
        clock,
        store,
    }
}

const COACH: UserId = UserId(1);
const PLAYER: UserId = UserId(2);

fn arsenal_coach() -> FakeDirectory {
    FakeDirectory::default()
        .with_member(COACH, &[MANAGER, ARSENAL])
        .with_member(PLAYER, &[])
}

async fn offer(h: &Harness) -> Contract {
    h.workflow
        .offer(
            COACH,
            &[MANAGER, ARSENAL],
            false,
            PLAYER,
            "Player".to_string(),
            "Striker".to_string(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn offer_then_accept_grants_team_role_and_announces() {
    let h = harness(arsenal_coach());

    let contract = offer(&h).await;
    assert_eq!(contract.team_role, ARSENAL);
    assert_eq!(contract.team_name, "Arsenal");
    assert_eq!(contract.roster_size, 1);
    assert_eq!(contract.dm_message, Some(MessageRef(1)));
    assert_eq!(h.store.pending_len(), 1);
    assert_eq!(h.mailbox.delivered.lock().len(), 1);

    let acceptance = h.workflow.accept(PLAYER, &contract.id).await.unwrap();
    assert!(acceptance.grant_error.is_none());
    assert_eq!(h.directory.roles_of(PLAYER), vec![ARSENAL]);
    assert_eq!(h.store.pending_len(), 0);

    let posted = h.sink.posted();
    assert_eq!(posted.len(), 1);
    let (channel, event) = &posted[0];
    assert_eq!(*channel, CONTRACT_CHANNEL);
    match event {
        Announcement::ContractSigned {
            contract: signed,
            role_granted,
        } => {
            assert_eq!(signed.id, contract.id);
            assert!(*role_granted);
        }
        other => panic!("unexpected announcement: {other:?}"),
    }
}

#[tokio::test]
async fn second_accept_of_the_same_contract_loses() {
    let h = harness(arsenal_coach());
    let contract = offer(&h).await;

    h.workflow.accept(PLAYER, &contract.id).await.unwrap();
    let err = h.workflow.accept(PLAYER, &contract.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidOrExpired));

    // One grant, one announcement.
    assert_eq!(h.directory.roles_of(PLAYER), vec![ARSENAL]);
    assert_eq!(h.sink.posted().len(), 1);
}

#[tokio::test]
async fn expired_offer_is_rejected_and_swept() {
    let h = harness(arsenal_coach());
    let contract = offer(&h).await;

    h.clock.advance(Duration::seconds(61));
    let err = h.workflow.accept(PLAYER, &contract.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidOrExpired));
    assert!(h.directory.roles_of(PLAYER).is_empty());
    assert!(h.sink.posted().is_empty());

    // Already removed by the failed claim, so the sweep finds nothing.
    assert_eq!(h.workflow.sweep_once().await, 0);
}

#[tokio::test]
async fn sweep_removes_lapsed_offers_and_notifies_targets() {
    let h = harness(arsenal_coach());
    let contract = offer(&h).await;

    h.clock.advance(Duration::seconds(61));
    assert_eq!(h.workflow.sweep_once().await, 1);
    assert_eq!(h.store.pending_len(), 0);
    assert_eq!(h.mailbox.expiry_notices.lock().clone(), vec![contract.id]);
}

#[tokio::test]
async fn click_by_non_target_leaves_offer_claimable() {
    let h = harness(arsenal_coach());
    let contract = offer(&h).await;

    let err = h.workflow.accept(UserId(99), &contract.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidOrExpired));
    assert_eq!(h.store.pending_len(), 1);

    // The real target can still win it.
    h.workflow.accept(PLAYER, &contract.id).await.unwrap();
    assert_eq!(h.directory.roles_of(PLAYER), vec![ARSENAL]);
}

#[tokio::test]
async fn offer_requires_the_manager_capability() {
    let h = harness(
        FakeDirectory::default()
            .with_member(COACH, &[ARSENAL])
            .with_member(PLAYER, &[]),
    );

    let err = h
        .workflow
        .offer(
            COACH,
            &[ARSENAL],
            false,
            PLAYER,
            "Player".to_string(),
            "Striker".to_string(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Unauthorized {
            required: Capability::Manager
        }
    ));
    assert_eq!(h.store.pending_len(), 0);
    assert!(h.mailbox.delivered.lock().is_empty());
}

#[tokio::test]
async fn offer_requires_the_issuer_to_hold_a_team_role() {
    let h = harness(
        FakeDirectory::default()
            .with_member(COACH, &[MANAGER])
            .with_member(PLAYER, &[]),
    );

    let err = h
        .workflow
        .offer(
            COACH,
            &[MANAGER],
            false,
            PLAYER,
            "Player".to_string(),
            "Striker".to_string(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::NoTeamRole { user } if user == COACH));
    assert_eq!(h.store.pending_len(), 0);
}

#[tokio::test]
async fn failed_delivery_removes_the_pending_contract() {
    let h = harness(arsenal_coach());
    h.mailbox.set_fail_delivery(true);

    let err = h
        .workflow
        .offer(
            COACH,
            &[MANAGER, ARSENAL],
            false,
            PLAYER,
            "Player".to_string(),
            "Striker".to_string(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::DeliveryFailed { .. }));
    assert_eq!(h.store.pending_len(), 0);
}

#[tokio::test]
async fn grant_failure_after_claim_still_announces_the_signing() {
    let h = harness(arsenal_coach());
    let contract = offer(&h).await;

    h.directory.set_fail_role_changes(true);
    let acceptance = h.workflow.accept(PLAYER, &contract.id).await.unwrap();

    assert!(acceptance.grant_error.is_some());
    assert!(h.directory.roles_of(PLAYER).is_empty());
    assert_eq!(h.store.pending_len(), 0);

    let posted = h.sink.posted();
    assert_eq!(posted.len(), 1);
    assert!(matches!(
        posted[0].1,
        Announcement::ContractSigned {
            role_granted: false,
            ..
        }
    ));

    // The contract stays resolved: no second chance after the failure.
    let err = h.workflow.accept(PLAYER, &contract.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidOrExpired));
}

#[tokio::test]
async fn accepting_swaps_out_a_previously_held_team_role() {
    let h = harness(
        FakeDirectory::default()
            .with_member(COACH, &[MANAGER, ARSENAL])
            .with_member(PLAYER, &[CHELSEA]),
    );
    let contract = offer(&h).await;

    h.workflow.accept(PLAYER, &contract.id).await.unwrap();
    assert_eq!(h.directory.roles_of(PLAYER), vec![ARSENAL]);
}

#[tokio::test]
async fn release_clears_the_team_role_and_announces() {
    let h = harness(
        FakeDirectory::default()
            .with_member(COACH, &[MANAGER, ARSENAL])
            .with_member(PLAYER, &[CHELSEA, ASSISTANT]),
    );

    let release = h
        .workflow
        .release(&[MANAGER, ARSENAL], false, PLAYER)
        .await
        .unwrap();

    assert_eq!(release.team_role, CHELSEA);
    assert_eq!(release.team_name, "Chelsea");
    // Only catalog roles are touched.
    assert_eq!(h.directory.roles_of(PLAYER), vec![ASSISTANT]);

    let posted = h.sink.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].0, RELEASE_CHANNEL);
    assert!(matches!(
        &posted[0].1,
        Announcement::PlayerReleased { user, team_name }
            if *user == PLAYER && team_name == "Chelsea"
    ));
}

#[tokio::test]
async fn release_without_a_team_role_fails() {
    let h = harness(arsenal_coach());

    let err = h
        .workflow
        .release(&[MANAGER, ARSENAL], false, PLAYER)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NoTeamRole { user } if user == PLAYER));
    assert!(h.sink.posted().is_empty());
}

#[tokio::test]
async fn promote_and_demote_toggle_the_assistant_role() {
    let h = harness(arsenal_coach());

    h.workflow
        .promote(&[MANAGER, ARSENAL], false, PLAYER)
        .await
        .unwrap();
    assert_eq!(h.directory.roles_of(PLAYER), vec![ASSISTANT]);

    h.workflow
        .demote(&[MANAGER, ARSENAL], false, PLAYER)
        .await
        .unwrap();
    assert!(h.directory.roles_of(PLAYER).is_empty());

    let posted = h.sink.posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0].0, PROMOTE_CHANNEL);
    assert!(matches!(posted[0].1, Announcement::PlayerPromoted { user } if user == PLAYER));
    assert_eq!(posted[1].0, DEMOTE_CHANNEL);
    assert!(matches!(posted[1].1, Announcement::PlayerDemoted { user } if user == PLAYER));
}

#[tokio::test]
async fn administrator_flag_does_not_substitute_for_manager() {
    let h = harness(
        FakeDirectory::default()
            .with_member(COACH, &[ARSENAL])
            .with_member(PLAYER, &[]),
    );

    let err = h
        .workflow
        .offer(
            COACH,
            &[ARSENAL],
            true,
            PLAYER,
            "Player".to_string(),
            "Striker".to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized { .. }));
}
