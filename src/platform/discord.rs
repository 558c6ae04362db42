// onboard-service/src/platform/discord.rs
//! Discord HTTP API (v10) adapter.
//!
//! Member-join events are not read here; they arrive through the event intake route
//! from whatever relays gateway events to the service. The invite listing endpoint
//! does not echo creation reasons; they are recovered from the guild's audit log,
//! which needs VIEW_AUDIT_LOG and only reaches back as far as Discord retains it.

use super::CommunityPlatform;
use crate::models::{
    BotGrants, Channel, ChannelId, ChannelKind, Community, CommunityId, InviteRequest, LiveInvite,
    NewChannel, NewRole, PlatformError, Role, RoleId, UserId,
};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

const API_BASE: &str = "https://discord.com/api/v10";
const INVITE_BASE: &str = "https://discord.gg";

const ADMINISTRATOR: u64 = 1 << 3;
const MANAGE_CHANNELS: u64 = 1 << 4;
const MANAGE_GUILD: u64 = 1 << 5;
const MANAGE_ROLES: u64 = 1 << 28;

const AUDIT_INVITE_CREATE: u8 = 40;
const AUDIT_PAGE_LIMIT: usize = 100;
const AUDIT_MAX_PAGES: usize = 10;

const CHANNEL_TEXT: u8 = 0;
const CHANNEL_VOICE: u8 = 2;
const CHANNEL_CATEGORY: u8 = 4;
const OVERWRITE_ROLE: u8 = 0;

// Discord serialises snowflakes as strings
fn parse_snowflake(raw: &str) -> Result<u64, PlatformError> {
    raw.parse().map_err(|_| PlatformError::Unexpected {
        status: 200,
        body: format!("invalid snowflake: {}", raw),
    })
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawGuild {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct RawRole {
    id: String,
    name: String,
    position: i64,
    #[serde(default)]
    color: u32,
    #[serde(default)]
    hoist: bool,
    #[serde(default)]
    mentionable: bool,
    #[serde(default)]
    permissions: String,
}

impl RawRole {
    fn into_role(self) -> Result<Role, PlatformError> {
        Ok(Role {
            id: parse_snowflake(&self.id)?,
            name: self.name,
            position: self.position,
            color: self.color,
            hoist: self.hoist,
            mentionable: self.mentionable,
        })
    }
}

#[derive(Deserialize)]
struct RawMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

impl RawChannel {
    // Thread, stage and forum channels are not part of team provisioning
    fn into_channel(self) -> Result<Option<Channel>, PlatformError> {
        let kind = match self.kind {
            CHANNEL_TEXT => ChannelKind::Text,
            CHANNEL_VOICE => ChannelKind::Voice,
            CHANNEL_CATEGORY => ChannelKind::Category,
            _ => return Ok(None),
        };
        let parent_id = match self.parent_id {
            Some(raw) => Some(parse_snowflake(&raw)?),
            None => None,
        };
        Ok(Some(Channel {
            id: parse_snowflake(&self.id)?,
            name: self.name.unwrap_or_default(),
            kind,
            parent_id,
        }))
    }
}

#[derive(Deserialize)]
struct RawInviteChannel {
    id: String,
}

#[derive(Deserialize)]
struct RawInvite {
    code: String,
    #[serde(default)]
    uses: u64,
    #[serde(default)]
    max_uses: u64,
    #[serde(default)]
    inviter: Option<RawUser>,
    channel: Option<RawInviteChannel>,
}

impl RawInvite {
    fn into_invite(self) -> Result<LiveInvite, PlatformError> {
        let inviter_id = match self.inviter {
            Some(user) => Some(parse_snowflake(&user.id)?),
            None => None,
        };
        let channel_id = match self.channel {
            Some(channel) => parse_snowflake(&channel.id)?,
            None => 0,
        };
        Ok(LiveInvite {
            url: format!("{}/{}", INVITE_BASE, self.code),
            code: self.code,
            channel_id,
            inviter_id,
            uses: self.uses,
            max_uses: self.max_uses,
            reason: None,
        })
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct AuditLog {
    #[serde(default)]
    pub audit_log_entries: Vec<AuditEntry>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AuditEntry {
    pub id: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub changes: Vec<AuditChange>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AuditChange {
    pub key: String,
    #[serde(default)]
    pub new_value: Option<serde_json::Value>,
}

/// Invitation code -> creation reason, from INVITE_CREATE audit entries.
///
/// Entries without a reason or a `code` change are ignored. Entries come newest
/// first, so an earlier entry wins for a reused code.
pub(crate) fn invite_reasons(log: &AuditLog) -> HashMap<String, String> {
    let mut reasons = HashMap::new();
    for entry in &log.audit_log_entries {
        let reason = match entry.reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => reason,
            _ => continue,
        };
        let code = entry
            .changes
            .iter()
            .find(|c| c.key == "code")
            .and_then(|c| c.new_value.as_ref())
            .and_then(|v| v.as_str());
        if let Some(code) = code {
            reasons.entry(code.to_string()).or_insert_with(|| reason.to_string());
        }
    }
    reasons
}

#[derive(Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: f64,
}

#[derive(Debug, Clone)]
pub struct DiscordPlatform {
    client: Client,
    token: String,
    bot_user_id: UserId,
}

impl DiscordPlatform {
    // Resolves the bot's own identity before anything else runs
    pub async fn connect(token: &str) -> Result<Self, PlatformError> {
        let client = Client::new();
        let mut platform = Self {
            client,
            token: token.to_string(),
            bot_user_id: 0,
        };

        let me: RawUser = platform.get("/users/@me").await?;
        platform.bot_user_id = parse_snowflake(&me.id)?;
        debug!("Connected to Discord as user {}", platform.bot_user_id);
        Ok(platform)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", API_BASE, path))
            .header(header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    // The audit log header must be URL-encoded to carry non-ASCII team names
    fn with_reason(builder: RequestBuilder, reason: &str) -> RequestBuilder {
        if reason.is_empty() {
            return builder;
        }
        let encoded: String = reason
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'@' | b':' => {
                    (b as char).to_string()
                }
                _ => format!("%{:02X}", b),
            })
            .collect();
        builder.header("X-Audit-Log-Reason", encoded)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, PlatformError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!("Discord error ({}): {}", status, body);
        Err(match status.as_u16() {
            403 => PlatformError::Forbidden(body),
            404 => PlatformError::NotFound(body),
            429 => PlatformError::RateLimited {
                retry_after_secs: serde_json::from_str::<RateLimitBody>(&body)
                    .map(|b| b.retry_after)
                    .unwrap_or_default(),
            },
            code => PlatformError::Unexpected { status: code, body },
        })
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, PlatformError> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Transport(format!("Failed to parse Discord response: {}", e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        Self::json(self.request(Method::GET, path)).await
    }

    async fn raw_roles(&self, community_id: CommunityId) -> Result<Vec<RawRole>, PlatformError> {
        self.get(&format!("/guilds/{}/roles", community_id)).await
    }

    async fn raw_member(&self, community_id: CommunityId, user_id: UserId) -> Result<RawMember, PlatformError> {
        self.get(&format!("/guilds/{}/members/{}", community_id, user_id)).await
    }

    // Reasons of the invitations this bot created, paging back until every wanted
    // code is resolved or the log runs out
    async fn audit_invite_reasons(
        &self,
        community_id: CommunityId,
        wanted: &[&str],
    ) -> Result<HashMap<String, String>, PlatformError> {
        let mut reasons = HashMap::new();
        let mut before: Option<String> = None;

        for _ in 0..AUDIT_MAX_PAGES {
            let mut path = format!(
                "/guilds/{}/audit-logs?action_type={}&user_id={}&limit={}",
                community_id, AUDIT_INVITE_CREATE, self.bot_user_id, AUDIT_PAGE_LIMIT
            );
            if let Some(id) = &before {
                path.push_str(&format!("&before={}", id));
            }

            let log: AuditLog = self.get(&path).await?;
            for (code, reason) in invite_reasons(&log) {
                reasons.entry(code).or_insert(reason);
            }

            if log.audit_log_entries.len() < AUDIT_PAGE_LIMIT || wanted.iter().all(|c| reasons.contains_key(*c)) {
                break;
            }
            before = log.audit_log_entries.last().map(|e| e.id.clone());
        }

        Ok(reasons)
    }
}

#[async_trait]
impl CommunityPlatform for DiscordPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    async fn communities(&self) -> Result<Vec<Community>, PlatformError> {
        let guilds: Vec<RawGuild> = self.get("/users/@me/guilds").await?;
        guilds
            .into_iter()
            .map(|g| {
                Ok(Community {
                    id: parse_snowflake(&g.id)?,
                    name: g.name,
                })
            })
            .collect()
    }

    async fn bot_grants(&self, community_id: CommunityId) -> Result<BotGrants, PlatformError> {
        let member = self.raw_member(community_id, self.bot_user_id).await?;
        let roles = self.raw_roles(community_id).await?;
        let everyone = community_id.to_string();

        // Base permissions are the union of the default role and every held role
        let bits = roles
            .iter()
            .filter(|r| r.id == everyone || member.roles.contains(&r.id))
            .filter_map(|r| r.permissions.parse::<u64>().ok())
            .fold(0u64, |acc, p| acc | p);

        if bits & ADMINISTRATOR != 0 {
            return Ok(BotGrants::all());
        }
        Ok(BotGrants {
            manage_guild: bits & MANAGE_GUILD != 0,
            manage_roles: bits & MANAGE_ROLES != 0,
            manage_channels: bits & MANAGE_CHANNELS != 0,
        })
    }

    async fn list_invites(&self, community_id: CommunityId) -> Result<Vec<LiveInvite>, PlatformError> {
        let raw: Vec<RawInvite> = self.get(&format!("/guilds/{}/invites", community_id)).await?;
        let mut invites = raw
            .into_iter()
            .map(RawInvite::into_invite)
            .collect::<Result<Vec<_>, _>>()?;

        let wanted: Vec<&str> = invites
            .iter()
            .filter(|i| i.inviter_id == Some(self.bot_user_id))
            .map(|i| i.code.as_str())
            .collect();
        if wanted.is_empty() {
            return Ok(invites);
        }

        let reasons = match self.audit_invite_reasons(community_id, &wanted).await {
            Ok(reasons) => reasons,
            Err(PlatformError::Forbidden(_)) => {
                warn!("⚠️ Missing VIEW_AUDIT_LOG in community {} - invite reasons unavailable", community_id);
                HashMap::new()
            }
            Err(e) => {
                warn!("⚠️ Couldn't read invite reasons in community {}: {}", community_id, e);
                HashMap::new()
            }
        };
        for invite in &mut invites {
            invite.reason = reasons.get(&invite.code).cloned();
        }
        Ok(invites)
    }

    async fn create_invite(
        &self,
        channel_id: ChannelId,
        request: &InviteRequest,
    ) -> Result<LiveInvite, PlatformError> {
        let builder = self
            .request(Method::POST, &format!("/channels/{}/invites", channel_id))
            .json(&json!({
                "max_age": request.max_age_secs,
                "max_uses": request.max_uses,
                "unique": request.unique,
            }));
        let raw: RawInvite = Self::json(Self::with_reason(builder, &request.reason)).await?;

        let mut invite = raw.into_invite()?;
        invite.reason = Some(request.reason.clone());
        if invite.channel_id == 0 {
            invite.channel_id = channel_id;
        }
        Ok(invite)
    }

    async fn roles(&self, community_id: CommunityId) -> Result<Vec<Role>, PlatformError> {
        self.raw_roles(community_id)
            .await?
            .into_iter()
            .map(RawRole::into_role)
            .collect()
    }

    async fn create_role(&self, community_id: CommunityId, role: &NewRole) -> Result<Role, PlatformError> {
        let builder = self
            .request(Method::POST, &format!("/guilds/{}/roles", community_id))
            .json(&json!({
                "name": role.name,
                "color": role.color,
                "hoist": role.hoist,
                "mentionable": role.mentionable,
            }));
        let raw: RawRole = Self::json(Self::with_reason(builder, &role.reason)).await?;
        raw.into_role()
    }

    async fn set_role_position(
        &self,
        community_id: CommunityId,
        role_id: RoleId,
        position: i64,
    ) -> Result<(), PlatformError> {
        let builder = self
            .request(Method::PATCH, &format!("/guilds/{}/roles", community_id))
            .json(&json!([{ "id": role_id.to_string(), "position": position }]));
        Self::send(builder).await.map(|_| ())
    }

    async fn member_role_ids(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<Vec<RoleId>, PlatformError> {
        self.raw_member(community_id, user_id)
            .await?
            .roles
            .iter()
            .map(|r| parse_snowflake(r))
            .collect()
    }

    async fn add_member_role(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError> {
        let builder = self.request(
            Method::PUT,
            &format!("/guilds/{}/members/{}/roles/{}", community_id, user_id, role_id),
        );
        Self::send(builder).await.map(|_| ())
    }

    async fn channels(&self, community_id: CommunityId) -> Result<Vec<Channel>, PlatformError> {
        let raw: Vec<RawChannel> = self.get(&format!("/guilds/{}/channels", community_id)).await?;
        let mut channels = Vec::with_capacity(raw.len());
        for channel in raw {
            if let Some(channel) = channel.into_channel()? {
                channels.push(channel);
            }
        }
        Ok(channels)
    }

    async fn create_channel(
        &self,
        community_id: CommunityId,
        channel: &NewChannel,
    ) -> Result<Channel, PlatformError> {
        let kind = match channel.kind {
            ChannelKind::Text => CHANNEL_TEXT,
            ChannelKind::Voice => CHANNEL_VOICE,
            ChannelKind::Category => CHANNEL_CATEGORY,
        };
        let overwrites: Vec<serde_json::Value> = channel
            .overwrites
            .iter()
            .map(|o| {
                json!({
                    "id": o.role_id.to_string(),
                    "type": OVERWRITE_ROLE,
                    "allow": crate::models::Permission::bits(&o.allow).to_string(),
                    "deny": crate::models::Permission::bits(&o.deny).to_string(),
                })
            })
            .collect();

        let mut body = json!({
            "name": channel.name,
            "type": kind,
            "permission_overwrites": overwrites,
        });
        if let Some(parent_id) = channel.parent_id {
            body["parent_id"] = json!(parent_id.to_string());
        }

        let builder = self
            .request(Method::POST, &format!("/guilds/{}/channels", community_id))
            .json(&body);
        let raw: RawChannel = Self::json(Self::with_reason(builder, &channel.reason)).await?;
        raw.into_channel()?.ok_or_else(|| PlatformError::Unexpected {
            status: 200,
            body: "created channel has an unsupported type".to_string(),
        })
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), PlatformError> {
        let builder = self
            .request(Method::POST, &format!("/channels/{}/messages", channel_id))
            .json(&json!({ "content": content }));
        Self::send(builder).await.map(|_| ())
    }
}
