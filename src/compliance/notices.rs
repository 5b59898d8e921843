//! Embeds sent by compliance enforcement.

use crate::platform::{Embed, GuildSummary, embed::MAX_FIELDS};

use super::LeftGuild;

const RED: u32 = 0xff4545;
const ORANGE: u32 = 0xe67e22;
const FOOTER: &str = "If you believe this is a mistake, please contact the bot owner.";

pub fn waitlist_notice(guild: &GuildSummary, max_guilds: u64) -> Embed {
    Embed::new("There's currently a waitlist")
        .description(format!(
            "Hello! Thank you for inviting me to **{}**.\n\nUnfortunately, I am currently at my maximum allowed number of servers (`{max_guilds}`) and cannot remain in this server.",
            guild.name
        ))
        .color(RED)
        .footer(FOOTER)
}

pub fn block_notice(guild: &GuildSummary, reason: Option<&str>) -> Embed {
    let embed = Embed::new("Compliance Block Notice")
        .description(format!(
            "Hello! Thank you for inviting me to **{}**.\n\nUnfortunately, this server is currently on the compliance blocklist and I am unable to remain here or provide any features.",
            guild.name
        ))
        .color(RED);
    let embed = match reason {
        Some(reason) => embed.field("Blocked for", reason, false),
        None => embed,
    };
    embed.footer(FOOTER)
}

/// One field per left guild. Past the field limit the tail is collapsed into
/// a final "And N more" field.
pub fn enforcement_summary(left: &[LeftGuild]) -> Embed {
    let shown = if left.len() > MAX_FIELDS {
        MAX_FIELDS - 1
    } else {
        left.len()
    };
    let embed = left[..shown].iter().fold(
        Embed::new("Compliance enforcement")
            .description("The bot has left the following guilds due to compliance enforcement.")
            .color(ORANGE),
        |embed, entry| {
            embed.field(
                format!("{} ({})", entry.name, entry.guild_id),
                format!("Reason: `{}`", entry.reason),
                false,
            )
        },
    );

    let hidden = &left[shown..];
    if hidden.is_empty() {
        return embed;
    }
    let ids = hidden
        .iter()
        .map(|entry| entry.guild_id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    embed.field(format!("And {} more", hidden.len()), ids, false)
}
