// onboard-service/src/services/channel_provisioner.rs
use crate::models::{
    channel_base_name, channel_names_match, is_team_channel_name, Channel, ChannelKind, ChannelStatus,
    CommunityId, NewChannel, Permission, PermissionOverwrite, ProvisionError, Role, RoleId, TeamChannelNames,
    TeamChannels,
};
use crate::platform::CommunityPlatform;
use crate::services::role_provisioner::{ensure_team_role, find_team_role};
use lazy_static::lazy_static;
use log::{error, info};
use regex::Regex;
use std::collections::HashSet;

// Four teams per category, a text and a voice channel each
pub const CATEGORY_CAPACITY: usize = 8;

lazy_static! {
    static ref CATEGORY_RE: Regex = Regex::new(r"^TEAM (\d+)$").unwrap();
}

const TEAM_GRANTS: [Permission; 4] = [
    Permission::ViewChannel,
    Permission::SendMessages,
    Permission::Connect,
    Permission::Speak,
];

const ADMIN_GRANTS: [Permission; 6] = [
    Permission::ViewChannel,
    Permission::SendMessages,
    Permission::ManageMessages,
    Permission::Connect,
    Permission::Speak,
    Permission::ManageChannels,
];

pub fn team_category_number(name: &str) -> Option<u64> {
    CATEGORY_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryPlan {
    Existing(Channel),
    Create(String),
}

/// Picks the category for `slots` new channels.
///
/// The lowest-numbered `TEAM <n>` category with room wins. Otherwise a new category is
/// numbered from the count of existing team channels divided by the capacity; a number
/// already in use moves on to the next free one. Categories are never merged.
pub fn plan_category(channels: &[Channel], slots: usize) -> CategoryPlan {
    let mut categories: Vec<(u64, &Channel)> = channels
        .iter()
        .filter(|c| c.kind == ChannelKind::Category)
        .filter_map(|c| team_category_number(&c.name).map(|n| (n, c)))
        .collect();
    categories.sort_by_key(|(n, _)| *n);

    for (_, category) in &categories {
        let used = channels.iter().filter(|c| c.parent_id == Some(category.id)).count();
        if used + slots <= CATEGORY_CAPACITY {
            return CategoryPlan::Existing((*category).clone());
        }
    }

    let team_channels = channels
        .iter()
        .filter(|c| c.kind != ChannelKind::Category && is_team_channel_name(&c.name))
        .count();
    let taken: HashSet<u64> = categories.iter().map(|(n, _)| *n).collect();
    let mut number = (team_channels / CATEGORY_CAPACITY) as u64 + 1;
    while taken.contains(&number) {
        number += 1;
    }
    CategoryPlan::Create(format!("TEAM {}", number))
}

/// Access control for a team's pair: hidden from the default role, open to the team
/// role, manageable by every configured admin role present in the community.
pub fn team_overwrites(
    default_role_id: RoleId,
    team_role: &Role,
    roles: &[Role],
    admin_role_names: &[String],
) -> Vec<PermissionOverwrite> {
    let mut overwrites = vec![
        PermissionOverwrite::deny(default_role_id, &[Permission::ViewChannel, Permission::Connect]),
        PermissionOverwrite::allow(team_role.id, &TEAM_GRANTS),
    ];

    for admin_name in admin_role_names {
        if let Some(admin) = roles.iter().find(|r| &r.name == admin_name) {
            if admin.id != team_role.id && !overwrites.iter().any(|o| o.role_id == admin.id) {
                overwrites.push(PermissionOverwrite::allow(admin.id, &ADMIN_GRANTS));
            }
        }
    }

    overwrites
}

fn find_channel(channels: &[Channel], kind: ChannelKind, name: &str) -> Option<Channel> {
    channels
        .iter()
        .find(|c| c.kind == kind && channel_names_match(&c.name, name))
        .cloned()
}

/// Makes sure a team has its `<base>-chat` and `<base>-voice` channels.
///
/// Existing channels are looked up across the whole community and never duplicated,
/// even when they sit outside a team category. Only the missing half of a pair is
/// created. A complete pair is reported without touching roles, so it succeeds even
/// when the service may not manage roles.
pub async fn ensure_team_channels(
    platform: &dyn CommunityPlatform,
    community_id: CommunityId,
    team_name: &str,
    admin_role_names: &[String],
) -> Result<TeamChannels, ProvisionError> {
    if channel_base_name(team_name).is_empty() {
        return Err(ProvisionError::NotFound(format!("usable channel name for team {:?}", team_name)));
    }
    let names = TeamChannelNames::for_team(team_name);

    let channels = platform.channels(community_id).await?;
    let existing_text = find_channel(&channels, ChannelKind::Text, &names.text);
    let existing_voice = find_channel(&channels, ChannelKind::Voice, &names.voice);

    if let (Some(text), Some(voice)) = (&existing_text, &existing_voice) {
        info!("⚠️ Channels already exist for team {}", team_name);
        return Ok(TeamChannels {
            role: find_team_role(platform, community_id, team_name).await?,
            text: ChannelStatus::Existing(text.clone()),
            voice: ChannelStatus::Existing(voice.clone()),
            category: None,
        });
    }

    let grants = platform.bot_grants(community_id).await?;
    if !grants.manage_channels {
        error!("❌ Missing MANAGE_CHANNELS in community {}", community_id);
        return Err(ProvisionError::Permission("MANAGE_CHANNELS".to_string()));
    }

    let role = ensure_team_role(platform, community_id, team_name).await?;
    let roles = platform.roles(community_id).await?;
    let overwrites = team_overwrites(platform.default_role_id(community_id), &role, &roles, admin_role_names);

    let slots = usize::from(existing_text.is_none()) + usize::from(existing_voice.is_none());
    let category = match plan_category(&channels, slots) {
        CategoryPlan::Existing(category) => category,
        CategoryPlan::Create(name) => {
            let category = platform
                .create_channel(
                    community_id,
                    &NewChannel {
                        name: name.clone(),
                        kind: ChannelKind::Category,
                        parent_id: None,
                        overwrites: Vec::new(),
                        reason: format!("Team category for {}", team_name),
                    },
                )
                .await?;
            info!("✅ Created category {} in community {}", name, community_id);
            category
        }
    };

    let text = match existing_text {
        Some(channel) => ChannelStatus::Existing(channel),
        None => {
            let channel = platform
                .create_channel(
                    community_id,
                    &NewChannel {
                        name: names.text.clone(),
                        kind: ChannelKind::Text,
                        parent_id: Some(category.id),
                        overwrites: overwrites.clone(),
                        reason: format!("Team {} text channel", team_name),
                    },
                )
                .await?;
            info!("✅ Created text channel: {}", names.text);
            ChannelStatus::Created(channel)
        }
    };

    let voice = match existing_voice {
        Some(channel) => ChannelStatus::Existing(channel),
        None => {
            let channel = platform
                .create_channel(
                    community_id,
                    &NewChannel {
                        name: names.voice.clone(),
                        kind: ChannelKind::Voice,
                        parent_id: Some(category.id),
                        overwrites,
                        reason: format!("Team {} voice channel", team_name),
                    },
                )
                .await?;
            info!("✅ Created voice channel: {}", names.voice);
            ChannelStatus::Created(channel)
        }
    };

    Ok(TeamChannels {
        role: Some(role),
        text,
        voice,
        category: Some(category),
    })
}
