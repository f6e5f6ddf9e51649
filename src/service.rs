//! Service wiring: builds the contract store, workflow collaborators,
//! and the Discord client from a validated [`Config`].

use crate::catalog::RoleCatalog;
use crate::config::Config;
use crate::contract::{ContractStore, SystemClock};
use crate::discord::handlers::{SerenityAnnouncer, SerenityDirectory, SerenityMailbox};
use crate::discord::GafferBot;
use crate::error::{GafferError, Result};
use crate::health;
use crate::workflow::OfferWorkflow;
use serenity::http::Http;
use serenity::model::id::{ApplicationId, GuildId};
use serenity::prelude::GatewayIntents;
use serenity::Client;
use std::sync::Arc;
use tracing::{error, info};

/// The assembled bot service, ready to connect to the gateway.
pub struct GafferService {
    config: Arc<Config>,
    client: Client,
}

impl GafferService {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let catalog = Arc::new(RoleCatalog::from_entries(&config.teams));
        let store = Arc::new(ContractStore::new());
        let clock = Arc::new(SystemClock);

        // A standalone Http handle so the workflow collaborators exist
        // before the client is built.
        let http = Arc::new(Http::new(&config.discord.token));
        if let Some(app_id) = config.discord.application_id {
            http.set_application_id(ApplicationId::new(app_id));
        }

        let guild = GuildId::new(config.discord.guild_id);
        let directory = Arc::new(SerenityDirectory::new(Arc::clone(&http), guild));
        let mailbox = Arc::new(SerenityMailbox::new(
            Arc::clone(&http),
            config.league.clone(),
        ));
        let announcer = Arc::new(SerenityAnnouncer::new(
            Arc::clone(&http),
            config.league.clone(),
        ));

        let workflow = Arc::new(OfferWorkflow::new(
            directory,
            mailbox,
            announcer,
            store,
            catalog,
            clock,
            &config,
        ));

        let handler = GafferBot::new(workflow, Arc::clone(&config));

        // GUILD_MEMBERS is privileged and must be enabled in the
        // developer portal for roster listing to work.
        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

        let mut builder =
            Client::builder(&config.discord.token, intents).event_handler(handler);
        if let Some(app_id) = config.discord.application_id {
            builder = builder.application_id(ApplicationId::new(app_id));
        }
        let client = builder.await.map_err(GafferError::Gateway)?;

        Ok(Self { config, client })
    }

    /// Starts the health endpoint and connects to the Discord gateway.
    /// Blocks until the client shuts down.
    pub async fn start(mut self) -> Result<()> {
        let port = self.config.health.port;
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                error!("Health endpoint failed: {e}");
            }
        });

        info!("Starting Discord client...");
        self.client.start().await.map_err(GafferError::Gateway)
    }
}
