//! Discord gateway integration: command registration, interaction
//! routing, presence rotation, and the background expiry sweep.

use crate::authz::CommandKind;
use crate::config::Config;
use crate::workflow::OfferWorkflow;
use serenity::async_trait;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::client::{Context, EventHandler};
use serenity::gateway::ActivityData;
use serenity::model::application::{Command, Interaction};
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::model::user::OnlineStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub mod commands;
pub mod embeds;
pub mod handlers;

/// Rotating presence status: an explicitly owned index instead of
/// ambient mutable state, so the rotation order is testable.
#[derive(Debug)]
pub struct StatusRotation {
    messages: Vec<String>,
    index: usize,
}

impl StatusRotation {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages, index: 0 }
    }

    /// The next status in rotation, wrapping around; `None` when no
    /// statuses are configured.
    pub fn next_status(&mut self) -> Option<&str> {
        if self.messages.is_empty() {
            return None;
        }
        let i = self.index;
        self.index = (self.index + 1) % self.messages.len();
        Some(self.messages[i].as_str())
    }
}

/// Shared state for the Discord bot
pub struct BotState {
    pub workflow: Arc<OfferWorkflow>,
    pub config: Arc<Config>,
    pub guild: GuildId,
    pub rotation: parking_lot::Mutex<StatusRotation>,
    tasks_started: AtomicBool,
}

/// The gateway event handler: routes every inbound interaction to one
/// handler and guarantees a fallback acknowledgment when one fails.
pub struct GafferBot {
    state: Arc<BotState>,
}

impl GafferBot {
    pub fn new(workflow: Arc<OfferWorkflow>, config: Arc<Config>) -> Self {
        let rotation = StatusRotation::new(config.presence.statuses.clone());
        let guild = GuildId::new(config.discord.guild_id);
        Self {
            state: Arc::new(BotState {
                workflow,
                config,
                guild,
                rotation: parking_lot::Mutex::new(rotation),
                tasks_started: AtomicBool::new(false),
            }),
        }
    }

    fn spawn_presence_task(&self, ctx: Context) {
        let state = Arc::clone(&self.state);
        let period = Duration::from_secs(state.config.presence.rotate_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let status = state.rotation.lock().next_status().map(str::to_owned);
                if let Some(status) = status {
                    ctx.set_presence(
                        Some(ActivityData::watching(status)),
                        OnlineStatus::DoNotDisturb,
                    );
                }
            }
        });
    }

    fn spawn_sweep_task(&self) {
        let state = Arc::clone(&self.state);
        let period = Duration::from_secs(state.config.contracts.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                state.workflow.sweep_once().await;
            }
        });
    }
}

#[async_trait]
impl EventHandler for GafferBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        for command in commands::create_commands() {
            if let Err(why) = Command::create_global_command(&ctx.http, command).await {
                error!("Cannot create slash command: {:?}", why);
            }
        }

        // Ready fires again on reconnect; start the background tasks once.
        if !self.state.tasks_started.swap(true, Ordering::SeqCst) {
            self.spawn_presence_task(ctx.clone());
            self.spawn_sweep_task();
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                info!(
                    "Received slash command: {} from user {}",
                    command.data.name, command.user.name
                );

                let result = match CommandKind::from_name(&command.data.name) {
                    Some(CommandKind::Offer) => {
                        handlers::handle_offer(&self.state, &ctx, &command).await
                    }
                    Some(CommandKind::Release) => {
                        handlers::handle_release(&self.state, &ctx, &command).await
                    }
                    Some(CommandKind::Promote) => {
                        handlers::handle_promote(&self.state, &ctx, &command).await
                    }
                    Some(CommandKind::Demote) => {
                        handlers::handle_demote(&self.state, &ctx, &command).await
                    }
                    Some(CommandKind::RosterView) => {
                        handlers::handle_roster_view(&self.state, &ctx, &command).await
                    }
                    Some(CommandKind::Say) => {
                        handlers::handle_say(&self.state, &ctx, &command).await
                    }
                    None => {
                        warn!("Unknown command: {}", command.data.name);
                        Ok(())
                    }
                };

                if let Err(why) = result {
                    error!("Error handling /{}: {:?}", command.data.name, why);
                    // Fallback acknowledgment; rejected by Discord if a
                    // response already went out, which is fine.
                    command
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new()
                                    .content("There was an error processing your command.")
                                    .ephemeral(true),
                            ),
                        )
                        .await
                        .ok();
                }
            }
            Interaction::Component(component) => {
                if let Err(why) = handlers::handle_accept(&self.state, &ctx, &component).await {
                    error!("Error handling component interaction: {:?}", why);
                    component
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new()
                                    .content("There was an error processing this interaction.")
                                    .ephemeral(true),
                            ),
                        )
                        .await
                        .ok();
                }
            }
            _ => {}
        }
    }
}
