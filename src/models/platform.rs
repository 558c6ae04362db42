// onboard-service/src/models/platform.rs
use serde::{Deserialize, Serialize};

pub type CommunityId = u64;
pub type UserId = u64;
pub type RoleId = u64;
pub type ChannelId = u64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
}

// Community-wide grants held by the service's own identity
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct BotGrants {
    pub manage_guild: bool,
    pub manage_roles: bool,
    pub manage_channels: bool,
}

impl BotGrants {
    pub fn all() -> Self {
        Self {
            manage_guild: true,
            manage_roles: true,
            manage_channels: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    // Higher sits above lower; the community default role is 0
    pub position: i64,
    pub color: u32,
    pub hoist: bool,
    pub mentionable: bool,
}

impl Role {
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewRole {
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub mentionable: bool,
    pub reason: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewChannel {
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub overwrites: Vec<PermissionOverwrite>,
    pub reason: String,
}

// Channel-level grants. Reading messages and viewing a channel are the same grant
// on the platform, so `ViewChannel` covers both.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewChannel,
    SendMessages,
    ManageMessages,
    Connect,
    Speak,
    ManageChannels,
}

impl Permission {
    pub fn bit(self) -> u64 {
        match self {
            Permission::ManageChannels => 1 << 4,
            Permission::ViewChannel => 1 << 10,
            Permission::SendMessages => 1 << 11,
            Permission::ManageMessages => 1 << 13,
            Permission::Connect => 1 << 20,
            Permission::Speak => 1 << 21,
        }
    }

    pub fn bits(permissions: &[Permission]) -> u64 {
        permissions.iter().fold(0, |acc, p| acc | p.bit())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PermissionOverwrite {
    pub role_id: RoleId,
    pub allow: Vec<Permission>,
    pub deny: Vec<Permission>,
}

impl PermissionOverwrite {
    pub fn allow(role_id: RoleId, allow: &[Permission]) -> Self {
        Self {
            role_id,
            allow: allow.to_vec(),
            deny: Vec::new(),
        }
    }

    pub fn deny(role_id: RoleId, deny: &[Permission]) -> Self {
        Self {
            role_id,
            allow: Vec::new(),
            deny: deny.to_vec(),
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.allow.contains(&permission)
    }

    pub fn denies(&self, permission: Permission) -> bool {
        self.deny.contains(&permission)
    }
}

// A member arrival relayed from the platform's gateway
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemberJoin {
    pub community_id: CommunityId,
    pub user_id: UserId,
    pub username: String,
}

impl MemberJoin {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}
