//! Slash command definitions for registration at startup.

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::CommandOptionType;

/// Create all slash commands for registration
pub fn create_commands() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("offer")
            .description("Offer a contract to a user")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::User,
                    "user",
                    "User to offer the contract to",
                )
                .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "role", "Role to offer")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "position",
                    "Position for the contract",
                )
                .required(true),
            ),
        CreateCommand::new("release")
            .description("Release a user from their team")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "User to release")
                    .required(true),
            ),
        CreateCommand::new("promote")
            .description("Promote a user to Assistant Manager")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "User to promote")
                    .required(true),
            ),
        CreateCommand::new("demote")
            .description("Demote a user from Assistant Manager")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "User to demote")
                    .required(true),
            ),
        CreateCommand::new("roster_view")
            .description("View roster for a specific role")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Role,
                    "role",
                    "Role to view roster for",
                )
                .required(true),
            ),
        CreateCommand::new("say")
            .description("Make the bot say something in the channel")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "text", "Text to say")
                    .required(true),
            ),
    ]
}
