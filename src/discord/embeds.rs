//! Embed builders for offers, announcements, and rosters.

use crate::config::LeagueConfig;
use crate::contract::Contract;
use crate::types::UserId;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use serenity::model::colour::Colour;
use serenity::model::Timestamp;

fn mention(user: UserId) -> String {
    format!("<@{}>", user.0)
}

fn footer(league: &LeagueConfig, text: &str) -> CreateEmbedFooter {
    let mut footer = CreateEmbedFooter::new(text.to_string());
    if let Some(icon) = &league.icon_url {
        footer = footer.icon_url(icon);
    }
    footer
}

/// The offer DM embed, also reposted to the contract channel on signing.
pub fn offer_embed(league: &LeagueConfig, contract: &Contract) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(format!("[{}] Contract Offer", league.name))
        .colour(Colour::new(0x0099ff))
        .field("Team", contract.team_name.clone(), true)
        .field("Contractor", mention(contract.issuer), true)
        .field("Signee", mention(contract.target), true)
        .field("Role", contract.role_label.clone(), true)
        .field("Position", contract.position.clone(), true)
        .field("Contract ID", contract.id.to_string(), true)
        .field("\u{200B}", "\u{200B}", false)
        .field("Coach", mention(contract.issuer), true)
        .field("Roster Size", contract.roster_size.to_string(), true)
        .footer(footer(league, "Contract System"))
        .timestamp(Timestamp::now());

    if let Some(icon) = &league.icon_url {
        embed = embed.thumbnail(icon);
    }

    embed
}

/// The signing announcement posted to the contract channel.
pub fn signed_embed(league: &LeagueConfig, contract: &Contract, role_granted: bool) -> CreateEmbed {
    let mut embed = offer_embed(league, contract);
    if !role_granted {
        embed = embed.field(
            "Note",
            "The team role could not be applied automatically; a staff member should assign it.",
            false,
        );
    }
    embed
}

pub fn release_embed(league: &LeagueConfig, user: UserId, team_name: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title("🔓 Player Released")
        .colour(Colour::new(0xff0000))
        .field("Player:", mention(user), true)
        .field("Team:", team_name.to_string(), true)
        .footer(footer(league, "Contract System"))
}

pub fn promote_embed(league: &LeagueConfig, user: UserId) -> CreateEmbed {
    CreateEmbed::new()
        .title("🌟 Player Promoted")
        .colour(Colour::new(0x00ff00))
        .field("Player:", mention(user), true)
        .footer(footer(league, "Contract System"))
}

pub fn demote_embed(league: &LeagueConfig, user: UserId) -> CreateEmbed {
    CreateEmbed::new()
        .title("🔻 Player Demoted")
        .colour(Colour::new(0xffff00))
        .field("Player:", mention(user), true)
        .footer(footer(league, "Contract System"))
}

pub fn roster_embed(
    league: &LeagueConfig,
    role_name: &str,
    colour: Colour,
    members: &str,
) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("Roster for {role_name}"))
        .description(members.to_string())
        .colour(colour)
        .footer(footer(league, "Roster System"))
}
