// onboard-service/src/models/team.rs
use crate::models::{Channel, ProvisionError, Role};
use serde::{Deserialize, Serialize};

pub const TEXT_SUFFIX: &str = "-chat";
pub const VOICE_SUFFIX: &str = "-voice";

// Keeps alphanumerics, spaces, hyphens and underscores
fn strip_team_name(team_name: &str) -> String {
    team_name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

// Upper-cases the first letter of every run of letters, lower-cases the rest
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Role name for a team: `"  alpha squad!! "` becomes `"Alpha Squad"`.
pub fn role_name(team_name: &str) -> String {
    title_case(&strip_team_name(team_name))
}

/// Lower-cased base for the team's channel pair.
///
/// Whitespace runs become a single hyphen, since the platform rewrites text channel
/// names that way and lookups must find what was created.
pub fn channel_base_name(team_name: &str) -> String {
    strip_team_name(team_name)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

// Case-insensitive, treating spaces and hyphens alike
pub fn channel_names_match(a: &str, b: &str) -> bool {
    let canon = |s: &str| s.trim().to_lowercase().replace(' ', "-");
    canon(a) == canon(b)
}

pub fn is_team_channel_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(TEXT_SUFFIX) || lower.ends_with(VOICE_SUFFIX)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamChannelNames {
    pub text: String,
    pub voice: String,
}

impl TeamChannelNames {
    pub fn for_team(team_name: &str) -> Self {
        let base = channel_base_name(team_name);
        Self {
            text: format!("{}{}", base, TEXT_SUFFIX),
            voice: format!("{}{}", base, VOICE_SUFFIX),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RoleGrant {
    Granted,
    AlreadyHeld,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", content = "channel")]
pub enum ChannelStatus {
    Existing(Channel),
    Created(Channel),
}

impl ChannelStatus {
    pub fn channel(&self) -> &Channel {
        match self {
            ChannelStatus::Existing(channel) | ChannelStatus::Created(channel) => channel,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, ChannelStatus::Created(_))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamChannels {
    // None only when a complete pair already existed and no team role does
    pub role: Option<Role>,
    pub text: ChannelStatus,
    pub voice: ChannelStatus,
    // Category the missing channels were placed in, when anything was created
    pub category: Option<Channel>,
}

// Per-team line of a batch provisioning report
#[derive(Serialize, Debug, Clone)]
pub struct TeamOutcome {
    pub team: String,
    pub success: bool,
    pub channels: Option<TeamChannels>,
    pub error: Option<String>,
}

impl TeamOutcome {
    pub fn from_result(team: &str, result: Result<TeamChannels, ProvisionError>) -> Self {
        match result {
            Ok(channels) => Self {
                team: team.to_string(),
                success: true,
                channels: Some(channels),
                error: None,
            },
            Err(err) => Self {
                team: team.to_string(),
                success: false,
                channels: None,
                error: Some(err.to_string()),
            },
        }
    }
}
