use crate::authz::Capability;
use crate::types::{RoleId, UserId, ValidationError};
use miette::Diagnostic;
use thiserror::Error;

/// Main error type for gaffer operations
#[derive(Error, Debug, Diagnostic)]
pub enum GafferError {
    #[error("Configuration error")]
    #[diagnostic(help("Check gaffer.toml and the environment overrides"))]
    Config(#[from] ConfigError),

    #[error("Workflow error")]
    Workflow(#[from] WorkflowError),

    #[error("Discord gateway error")]
    #[diagnostic(help("Check the bot token and gateway intents"))]
    Gateway(#[from] serenity::Error),

    #[error("Validation error")]
    Validation(#[from] ValidationError),

    #[error("Health endpoint error")]
    #[diagnostic(help("Is the configured health port already in use?"))]
    Health(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GafferError>;

/// Configuration-specific errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Config file not found at {path}")]
    #[diagnostic(
        code(gaffer::config::not_found),
        help("Set GAFFER_CONFIG or create gaffer.toml in the working directory")
    )]
    NotFound { path: String },

    #[error("Failed to parse config file")]
    #[diagnostic(code(gaffer::config::parse_failed))]
    ParseFailed {
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    #[diagnostic(code(gaffer::config::invalid))]
    Invalid { field: String, reason: String },
}

/// Errors raised by the Membership Directory (the guild's role state)
///
/// The directory is external and authoritative; these errors cover the
/// usual failure modes: target left the server, role hierarchy conflicts,
/// transient gateway trouble.
#[derive(Error, Debug, Diagnostic)]
pub enum DirectoryError {
    #[error("Failed to fetch member {user}")]
    #[diagnostic(
        code(gaffer::directory::member_fetch_failed),
        help("The user may have left the server")
    )]
    MemberFetchFailed {
        user: UserId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to add role {role} to member {user}")]
    #[diagnostic(
        code(gaffer::directory::role_add_failed),
        help("Check the bot's role sits above the team roles in the hierarchy")
    )]
    RoleAddFailed {
        user: UserId,
        role: RoleId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to list guild members")]
    #[diagnostic(
        code(gaffer::directory::guild_fetch_failed),
        help("Check the bot can see the guild and holds the GUILD_MEMBERS intent")
    )]
    GuildFetchFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to remove role {role} from member {user}")]
    #[diagnostic(
        code(gaffer::directory::role_remove_failed),
        help("Check the bot's role sits above the team roles in the hierarchy")
    )]
    RoleRemoveFailed {
        user: UserId,
        role: RoleId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors delivering an offer DM to its target
#[derive(Error, Debug, Diagnostic)]
pub enum DeliveryError {
    #[error("Could not send a direct message to {user}")]
    #[diagnostic(
        code(gaffer::delivery::send_failed),
        help("The recipient's privacy settings may block DMs from this server")
    )]
    SendFailed {
        user: UserId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The command/interaction error taxonomy
///
/// Every variant maps to exactly one private user-visible reply; see
/// [`WorkflowError::user_message`]. Internal failures are reported to the
/// user as a generic message distinct from these.
#[derive(Error, Debug, Diagnostic)]
pub enum WorkflowError {
    #[error("Caller lacks the {required} capability")]
    #[diagnostic(code(gaffer::workflow::unauthorized))]
    Unauthorized { required: Capability },

    #[error("Member {user} holds no team role")]
    #[diagnostic(code(gaffer::workflow::no_team_role))]
    NoTeamRole { user: UserId },

    #[error("Contract is invalid, already resolved, or expired")]
    #[diagnostic(code(gaffer::workflow::invalid_or_expired))]
    InvalidOrExpired,

    #[error("Offer delivery failed")]
    #[diagnostic(code(gaffer::workflow::delivery_failed))]
    DeliveryFailed {
        #[source]
        source: DeliveryError,
    },

    #[error("Membership directory operation failed")]
    #[diagnostic(code(gaffer::workflow::directory))]
    Directory {
        #[from]
        source: DirectoryError,
    },

    #[error("Could not allocate a unique contract id after {attempts} attempts")]
    #[diagnostic(
        code(gaffer::workflow::duplicate_contract_id),
        help("Pending contract ids collided twice in a row; this should be vanishingly rare")
    )]
    DuplicateContractId { attempts: u32 },
}

impl WorkflowError {
    /// The private reply shown to the acting user for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { required } => {
                format!("You must have the {required} role to use this command.")
            }
            Self::NoTeamRole { .. } => "No valid team role found for this action.".to_string(),
            Self::InvalidOrExpired => {
                "This contract is no longer valid (already resolved or expired).".to_string()
            }
            Self::DeliveryFailed { .. } => {
                "Could not deliver the contract offer. The user may have DMs disabled.".to_string()
            }
            Self::Directory { .. } => {
                "Could not update the member's roles. They may have left the server.".to_string()
            }
            Self::DuplicateContractId { .. } => {
                "Something went wrong creating the contract. Please try again.".to_string()
            }
        }
    }
}
