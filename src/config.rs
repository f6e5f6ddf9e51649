use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::{env, path::Path};

/// Main configuration for gaffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Discord bot configuration
    pub discord: DiscordConfig,
    /// League branding used on embeds
    #[serde(default)]
    pub league: LeagueConfig,
    /// Capability role ids
    pub roles: RolesConfig,
    /// Per-purpose announcement channels
    pub channels: ChannelsConfig,
    /// Contract-offer lifetimes and sweeping
    #[serde(default)]
    pub contracts: ContractsConfig,
    /// Rotating presence status
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Liveness endpoint
    #[serde(default)]
    pub health: HealthConfig,
    /// The team role catalog
    #[serde(default)]
    pub teams: Vec<TeamEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord bot token
    pub token: String,
    /// Discord application ID
    pub application_id: Option<u64>,
    /// The league server's guild ID
    pub guild_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueConfig {
    /// Short league tag shown in embed titles, e.g. "VEF"
    pub name: String,
    /// Logo URL used for thumbnails and footers
    pub icon_url: Option<String>,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            name: "League".to_string(),
            icon_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Role granting the Manager capability
    pub manager: u64,
    /// Role granted/revoked by promote/demote
    pub assistant_manager: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Accepted-contract announcements
    pub contracts: u64,
    /// Release announcements
    pub releases: u64,
    /// Promotion announcements
    pub promotions: u64,
    /// Demotion announcements
    pub demotions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// How long an offer stays acceptable, in seconds
    pub offer_ttl_secs: u64,
    /// How often the store is swept for expired offers, in seconds
    pub sweep_interval_secs: u64,
    /// Whether to DM the target when their offer lapses
    pub notify_on_expiry: bool,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            offer_ttl_secs: 3600,
            sweep_interval_secs: 60,
            notify_on_expiry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Status messages rotated through a "Watching ..." activity
    pub statuses: Vec<String>,
    /// Seconds between rotations
    pub rotate_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            rotate_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Port for the GET / liveness endpoint
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// One `[[teams]]` catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEntry {
    pub role_id: u64,
    pub name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new(),
                application_id: None,
                guild_id: 0,
            },
            league: LeagueConfig::default(),
            roles: RolesConfig {
                manager: 0,
                assistant_manager: 0,
            },
            channels: ChannelsConfig {
                contracts: 0,
                releases: 0,
                promotions: 0,
                demotions: 0,
            },
            contracts: ContractsConfig::default(),
            presence: PresenceConfig::default(),
            health: HealthConfig::default(),
            teams: Vec::new(),
        }
    }
}

/// Load `.env` if present; missing files are fine.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.is_empty() {
            return Err(ConfigError::Invalid {
                field: "discord.token".to_string(),
                reason: "Bot token cannot be empty".to_string(),
            }
            .into());
        }

        if self.discord.guild_id == 0 {
            return Err(ConfigError::Invalid {
                field: "discord.guild_id".to_string(),
                reason: "Guild id must be set".to_string(),
            }
            .into());
        }

        if self.roles.manager == 0 {
            return Err(ConfigError::Invalid {
                field: "roles.manager".to_string(),
                reason: "Manager role id must be set".to_string(),
            }
            .into());
        }

        if self.teams.is_empty() {
            return Err(ConfigError::Invalid {
                field: "teams".to_string(),
                reason: "At least one [[teams]] entry is required".to_string(),
            }
            .into());
        }

        if self.contracts.offer_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "contracts.offer_ttl_secs".to_string(),
                reason: "Offer lifetime must be non-zero".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Load configuration from the config file and environment variables
    pub fn load() -> Result<Self> {
        let config_path = env::var("GAFFER_CONFIG").unwrap_or_else(|_| "gaffer.toml".to_string());

        if Path::new(&config_path).exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|_e| ConfigError::NotFound {
                    path: config_path.clone(),
                })?;
            let config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed { source: e })?;

            Ok(config.override_from_env())
        } else {
            Ok(Self::default().override_from_env())
        }
    }

    /// Override config values with environment variables
    fn override_from_env(mut self) -> Self {
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Ok(app_id) = env::var("APP_ID") {
            if let Ok(id) = app_id.parse() {
                self.discord.application_id = Some(id);
            }
        }
        if let Ok(guild_id) = env::var("GUILD_ID") {
            if let Ok(id) = guild_id.parse() {
                self.discord.guild_id = id;
            }
        }

        if let Ok(role_id) = env::var("MANAGER_ROLE_ID") {
            if let Ok(id) = role_id.parse() {
                self.roles.manager = id;
            }
        }
        if let Ok(role_id) = env::var("ASSISTANT_MANAGER_ROLE_ID") {
            if let Ok(id) = role_id.parse() {
                self.roles.assistant_manager = id;
            }
        }

        if let Ok(channel_id) = env::var("CONTRACT_CHANNEL_ID") {
            if let Ok(id) = channel_id.parse() {
                self.channels.contracts = id;
            }
        }
        if let Ok(channel_id) = env::var("RELEASE_CHANNEL_ID") {
            if let Ok(id) = channel_id.parse() {
                self.channels.releases = id;
            }
        }
        if let Ok(channel_id) = env::var("PROMOTE_CHANNEL_ID") {
            if let Ok(id) = channel_id.parse() {
                self.channels.promotions = id;
            }
        }
        if let Ok(channel_id) = env::var("DEMOTE_CHANNEL_ID") {
            if let Ok(id) = channel_id.parse() {
                self.channels.demotions = id;
            }
        }

        if let Ok(ttl) = env::var("OFFER_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                self.contracts.offer_ttl_secs = secs;
            }
        }

        self
    }
}
