//! Interaction handlers and the serenity-backed collaborator
//! implementations the workflow runs against in production.

use crate::config::LeagueConfig;
use crate::contract::Contract;
use crate::discord::{embeds, BotState};
use crate::error::{DeliveryError, DirectoryError, WorkflowError};
use crate::types::{ChannelId, ContractId, MessageRef, RoleId, UserId};
use crate::workflow::{Announcement, AnnouncementSink, MembershipDirectory, OfferMailbox};
use crate::{authz, authz::CommandKind};
use async_trait::async_trait;
use serenity::builder::{
    CreateActionRow, CreateButton, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateMessage, EditInteractionResponse,
};
use serenity::client::Context;
use serenity::http::Http;
use serenity::model::application::{ButtonStyle, CommandInteraction, ComponentInteraction};
use serenity::model::id::{
    ChannelId as DiscordChannelId, GuildId, RoleId as DiscordRoleId, UserId as DiscordUserId,
};
use std::sync::Arc;
use tracing::warn;

/// Custom-id prefix correlating an accept button with its contract.
pub const ACCEPT_PREFIX: &str = "contract_accept:";

pub fn accept_custom_id(id: &ContractId) -> String {
    format!("{ACCEPT_PREFIX}{id}")
}

pub fn parse_accept_custom_id(custom_id: &str) -> Option<ContractId> {
    custom_id.strip_prefix(ACCEPT_PREFIX)?.parse().ok()
}

// ---------------------------------------------------------------------------
// Serenity-backed collaborators

/// Membership Directory backed by the guild's REST API.
pub struct SerenityDirectory {
    http: Arc<Http>,
    guild: GuildId,
}

impl SerenityDirectory {
    pub fn new(http: Arc<Http>, guild: GuildId) -> Self {
        Self { http, guild }
    }
}

#[async_trait]
impl MembershipDirectory for SerenityDirectory {
    async fn member_role_ids(&self, user: UserId) -> Result<Vec<RoleId>, DirectoryError> {
        let member = self
            .http
            .get_member(self.guild, DiscordUserId::new(user.0))
            .await
            .map_err(|e| DirectoryError::MemberFetchFailed {
                user,
                source: Box::new(e),
            })?;
        Ok(member.roles.iter().map(|r| RoleId(r.get())).collect())
    }

    async fn add_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError> {
        self.http
            .add_member_role(
                self.guild,
                DiscordUserId::new(user.0),
                DiscordRoleId::new(role.0),
                Some("gaffer role grant"),
            )
            .await
            .map_err(|e| DirectoryError::RoleAddFailed {
                user,
                role,
                source: Box::new(e),
            })
    }

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<(), DirectoryError> {
        self.http
            .remove_member_role(
                self.guild,
                DiscordUserId::new(user.0),
                DiscordRoleId::new(role.0),
                Some("gaffer role removal"),
            )
            .await
            .map_err(|e| DirectoryError::RoleRemoveFailed {
                user,
                role,
                source: Box::new(e),
            })
    }

    async fn role_member_count(&self, role: RoleId) -> Result<usize, DirectoryError> {
        let members = self
            .http
            .get_guild_members(self.guild, None, None)
            .await
            .map_err(|e| DirectoryError::GuildFetchFailed {
                source: Box::new(e),
            })?;
        let role = DiscordRoleId::new(role.0);
        Ok(members.iter().filter(|m| m.roles.contains(&role)).count())
    }
}

/// Offer DMs over the gateway.
pub struct SerenityMailbox {
    http: Arc<Http>,
    league: LeagueConfig,
}

impl SerenityMailbox {
    pub fn new(http: Arc<Http>, league: LeagueConfig) -> Self {
        Self { http, league }
    }
}

#[async_trait]
impl OfferMailbox for SerenityMailbox {
    async fn deliver(&self, contract: &Contract) -> Result<MessageRef, DeliveryError> {
        let embed = embeds::offer_embed(&self.league, contract);
        let button = CreateButton::new(accept_custom_id(&contract.id))
            .label("✅ Accept")
            .style(ButtonStyle::Success);
        let message = CreateMessage::new()
            .embed(embed)
            .components(vec![CreateActionRow::Buttons(vec![button])]);

        let send_failed = |e: serenity::Error| DeliveryError::SendFailed {
            user: contract.target,
            source: Box::new(e),
        };

        let dm = DiscordUserId::new(contract.target.0)
            .create_dm_channel(&self.http)
            .await
            .map_err(send_failed)?;
        let sent = dm
            .id
            .send_message(&self.http, message)
            .await
            .map_err(send_failed)?;

        Ok(MessageRef(sent.id.get()))
    }

    async fn notify_expired(&self, contract: &Contract) {
        let content = format!(
            "Your contract offer from {} (contract {}) has expired.",
            contract.team_name, contract.id
        );
        match DiscordUserId::new(contract.target.0)
            .create_dm_channel(&self.http)
            .await
        {
            Ok(dm) => {
                if let Err(e) = dm.id.say(&self.http, content).await {
                    warn!(contract = %contract.id, "failed to send expiry notice: {e}");
                }
            }
            Err(e) => warn!(contract = %contract.id, "failed to open expiry-notice DM: {e}"),
        }
    }
}

/// Announcement channel posts.
pub struct SerenityAnnouncer {
    http: Arc<Http>,
    league: LeagueConfig,
}

impl SerenityAnnouncer {
    pub fn new(http: Arc<Http>, league: LeagueConfig) -> Self {
        Self { http, league }
    }
}

#[async_trait]
impl AnnouncementSink for SerenityAnnouncer {
    async fn announce(&self, channel: ChannelId, event: &Announcement) {
        let embed = match event {
            Announcement::ContractSigned {
                contract,
                role_granted,
            } => embeds::signed_embed(&self.league, contract, *role_granted),
            Announcement::PlayerReleased { user, team_name } => {
                embeds::release_embed(&self.league, *user, team_name)
            }
            Announcement::PlayerPromoted { user } => embeds::promote_embed(&self.league, *user),
            Announcement::PlayerDemoted { user } => embeds::demote_embed(&self.league, *user),
        };

        if let Err(e) = DiscordChannelId::new(channel.0)
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("failed to post announcement to channel {channel}: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers

struct Caller {
    id: UserId,
    roles: Vec<RoleId>,
    is_administrator: bool,
}

fn caller(command: &CommandInteraction) -> Option<Caller> {
    let member = command.member.as_deref()?;
    Some(Caller {
        id: UserId(command.user.id.get()),
        roles: member.roles.iter().map(|r| RoleId(r.get())).collect(),
        is_administrator: member
            .permissions
            .map(|p| p.administrator())
            .unwrap_or(false),
    })
}

fn option_user(command: &CommandInteraction, name: &str) -> Option<UserId> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_user_id())
        .map(|u| UserId(u.get()))
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
}

fn option_role(command: &CommandInteraction, name: &str) -> Option<DiscordRoleId> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_role_id())
}

async fn reply_ephemeral(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> serenity::Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
}

/// `/offer user role position` — create a contract and DM the target.
pub async fn handle_offer(
    state: &BotState,
    ctx: &Context,
    command: &CommandInteraction,
) -> serenity::Result<()> {
    let Some(caller) = caller(command) else {
        return reply_ephemeral(ctx, command, "Unable to fetch member data.").await;
    };
    let (Some(target), Some(role_label), Some(position)) = (
        option_user(command, "user"),
        option_str(command, "role"),
        option_str(command, "position"),
    ) else {
        return reply_ephemeral(ctx, command, "Missing required options.").await;
    };

    // The DM send can be slow; defer privately and edit the reply in.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let outcome = state
        .workflow
        .offer(
            caller.id,
            &caller.roles,
            caller.is_administrator,
            target,
            role_label.to_string(),
            position.to_string(),
        )
        .await;

    let content = match outcome {
        Ok(contract) => format!(
            "Contract offer sent to <@{}> (contract {}).",
            target.0, contract.id
        ),
        Err(e) => e.user_message(),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await
        .map(|_| ())
}

/// `/release user` — strip the target's team role and announce it.
pub async fn handle_release(
    state: &BotState,
    ctx: &Context,
    command: &CommandInteraction,
) -> serenity::Result<()> {
    let Some(caller) = caller(command) else {
        return reply_ephemeral(ctx, command, "Unable to fetch member data.").await;
    };
    let Some(target) = option_user(command, "user") else {
        return reply_ephemeral(ctx, command, "Missing required options.").await;
    };

    let content = match state
        .workflow
        .release(&caller.roles, caller.is_administrator, target)
        .await
    {
        Ok(release) => format!(
            "Player <@{}> has been released from {}.",
            target.0, release.team_name
        ),
        Err(WorkflowError::NoTeamRole { .. }) => {
            "User does not have a team role to release.".to_string()
        }
        Err(e) => e.user_message(),
    };

    reply_ephemeral(ctx, command, content).await
}

/// `/promote user` — grant the Assistant Manager role.
pub async fn handle_promote(
    state: &BotState,
    ctx: &Context,
    command: &CommandInteraction,
) -> serenity::Result<()> {
    let Some(caller) = caller(command) else {
        return reply_ephemeral(ctx, command, "Unable to fetch member data.").await;
    };
    let Some(target) = option_user(command, "user") else {
        return reply_ephemeral(ctx, command, "Missing required options.").await;
    };

    let content = match state
        .workflow
        .promote(&caller.roles, caller.is_administrator, target)
        .await
    {
        Ok(()) => format!("Player <@{}> has been promoted.", target.0),
        Err(e) => e.user_message(),
    };

    reply_ephemeral(ctx, command, content).await
}

/// `/demote user` — revoke the Assistant Manager role.
pub async fn handle_demote(
    state: &BotState,
    ctx: &Context,
    command: &CommandInteraction,
) -> serenity::Result<()> {
    let Some(caller) = caller(command) else {
        return reply_ephemeral(ctx, command, "Unable to fetch member data.").await;
    };
    let Some(target) = option_user(command, "user") else {
        return reply_ephemeral(ctx, command, "Missing required options.").await;
    };

    let content = match state
        .workflow
        .demote(&caller.roles, caller.is_administrator, target)
        .await
    {
        Ok(()) => format!("Player <@{}> has been demoted.", target.0),
        Err(e) => e.user_message(),
    };

    reply_ephemeral(ctx, command, content).await
}

/// `/roster_view role` — list the members holding a role. Public.
pub async fn handle_roster_view(
    state: &BotState,
    ctx: &Context,
    command: &CommandInteraction,
) -> serenity::Result<()> {
    let Some(role_id) = option_role(command, "role") else {
        return reply_ephemeral(ctx, command, "Role not found.").await;
    };

    let roles = ctx.http.get_guild_roles(state.guild).await?;
    let Some(role) = roles.into_iter().find(|r| r.id == role_id) else {
        return reply_ephemeral(ctx, command, "Role not found.").await;
    };

    let members = ctx.http.get_guild_members(state.guild, None, None).await?;
    let listing: Vec<String> = members
        .iter()
        .filter(|m| m.roles.contains(&role_id))
        .map(|m| match &m.nick {
            Some(nick) => format!("<@{}> ({})", m.user.id.get(), nick),
            None => format!("<@{}>", m.user.id.get()),
        })
        .collect();
    let description = if listing.is_empty() {
        "No members found.".to_string()
    } else {
        listing.join("\n")
    };

    let embed = embeds::roster_embed(&state.config.league, &role.name, role.colour, &description);
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await
}

/// `/say text` — echo into the invoking channel. Administrator only.
pub async fn handle_say(
    state: &BotState,
    ctx: &Context,
    command: &CommandInteraction,
) -> serenity::Result<()> {
    let Some(caller) = caller(command) else {
        return reply_ephemeral(ctx, command, "Unable to fetch member data.").await;
    };

    let caps = authz::CapabilitySet::from_member(
        &caller.roles,
        RoleId(state.config.roles.manager),
        caller.is_administrator,
    );
    if let Err(e) = authz::authorize(caps, CommandKind::Say) {
        return reply_ephemeral(ctx, command, e.user_message()).await;
    }

    let Some(text) = option_str(command, "text") else {
        return reply_ephemeral(ctx, command, "Missing required options.").await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await
}

/// Accept-button clicks, correlated back to a contract by custom id.
pub async fn handle_accept(
    state: &BotState,
    ctx: &Context,
    component: &ComponentInteraction,
) -> serenity::Result<()> {
    let Some(id) = parse_accept_custom_id(&component.data.custom_id) else {
        return component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("Unknown control.")
                        .ephemeral(true),
                ),
            )
            .await;
    };

    let claimant = UserId(component.user.id.get());
    match state.workflow.accept(claimant, &id).await {
        Ok(acceptance) => {
            let content = if acceptance.grant_error.is_some() {
                "✅ Contract accepted! Your team role could not be applied automatically; \
                 a staff member will assign it."
            } else {
                "✅ Contract accepted!"
            };
            // Acknowledge by editing the offer DM in place: drop the
            // button so it cannot be clicked again.
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .content(content)
                            .components(vec![]),
                    ),
                )
                .await
        }
        Err(e) => {
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(e.user_message())
                            .ephemeral(true),
                    ),
                )
                .await
        }
    }
}
