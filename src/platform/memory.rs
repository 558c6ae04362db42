// onboard-service/src/platform/memory.rs
//! In-process platform backing the test-suite.
//!
//! Every mutating call is appended to a write log so callers can assert that an
//! operation did (or did not) touch the platform.

use super::CommunityPlatform;
use crate::models::{
    BotGrants, Channel, ChannelId, ChannelKind, Community, CommunityId, InviteRequest, LiveInvite,
    NewChannel, NewRole, PermissionOverwrite, PlatformError, Role, RoleId, UserId,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const BOT_ROLE_NAME: &str = "Onboard Bot";
const BOT_ROLE_POSITION: i64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformWrite {
    CreateInvite { code: String, reason: String },
    CreateRole { name: String },
    SetRolePosition { role_id: RoleId, position: i64 },
    AddMemberRole { user_id: UserId, role_id: RoleId },
    CreateChannel { name: String, kind: ChannelKind, parent_id: Option<ChannelId> },
    SendMessage { channel_id: ChannelId, content: String },
}

#[derive(Debug, Clone)]
struct CommunityState {
    community: Community,
    grants: BotGrants,
    roles: Vec<Role>,
    channels: Vec<Channel>,
    overwrites: HashMap<ChannelId, Vec<PermissionOverwrite>>,
    invites: Vec<LiveInvite>,
    member_roles: HashMap<UserId, Vec<RoleId>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    communities: BTreeMap<CommunityId, CommunityState>,
    next_id: u64,
    writes: Vec<PlatformWrite>,
    // Operation name -> queued failures, consumed one per call
    failures: HashMap<&'static str, VecDeque<PlatformError>>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        // Keep generated ids clear of hand-picked community ids in tests
        1_000_000 + self.next_id
    }

    fn community_mut(&mut self, community_id: CommunityId) -> Result<&mut CommunityState, PlatformError> {
        self.communities
            .get_mut(&community_id)
            .ok_or_else(|| PlatformError::NotFound(format!("community {}", community_id)))
    }

    fn community(&self, community_id: CommunityId) -> Result<&CommunityState, PlatformError> {
        self.communities
            .get(&community_id)
            .ok_or_else(|| PlatformError::NotFound(format!("community {}", community_id)))
    }

    fn community_of_channel(&self, channel_id: ChannelId) -> Result<CommunityId, PlatformError> {
        self.communities
            .values()
            .find(|c| c.channels.iter().any(|ch| ch.id == channel_id))
            .map(|c| c.community.id)
            .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))
    }

    fn take_failure(&mut self, op: &'static str) -> Result<(), PlatformError> {
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct MemoryPlatform {
    bot_user_id: UserId,
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    pub fn new(bot_user_id: UserId) -> Self {
        Self {
            bot_user_id,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Adds a community with its default role and the bot's own role (all grants held)
    pub fn add_community(&self, community_id: CommunityId, name: &str) -> Role {
        let mut state = self.state();
        let bot_role = Role {
            id: state.allocate_id(),
            name: BOT_ROLE_NAME.to_string(),
            position: BOT_ROLE_POSITION,
            color: 0,
            hoist: false,
            mentionable: false,
        };
        let default_role = Role {
            id: community_id,
            name: "@everyone".to_string(),
            position: 0,
            color: 0,
            hoist: false,
            mentionable: false,
        };

        let mut member_roles = HashMap::new();
        member_roles.insert(self.bot_user_id, vec![bot_role.id]);

        state.communities.insert(
            community_id,
            CommunityState {
                community: Community {
                    id: community_id,
                    name: name.to_string(),
                },
                grants: BotGrants::all(),
                roles: vec![default_role, bot_role.clone()],
                channels: Vec::new(),
                overwrites: HashMap::new(),
                invites: Vec::new(),
                member_roles,
            },
        );
        bot_role
    }

    pub fn set_grants(&self, community_id: CommunityId, grants: BotGrants) {
        if let Some(community) = self.state().communities.get_mut(&community_id) {
            community.grants = grants;
        }
    }

    pub fn add_role(&self, community_id: CommunityId, name: &str, position: i64) -> Option<Role> {
        let mut state = self.state();
        let id = state.allocate_id();
        let community = state.communities.get_mut(&community_id)?;
        let role = Role {
            id,
            name: name.to_string(),
            position,
            color: 0,
            hoist: false,
            mentionable: false,
        };
        community.roles.push(role.clone());
        Some(role)
    }

    pub fn grant_member_role(&self, community_id: CommunityId, user_id: UserId, role_id: RoleId) {
        if let Some(community) = self.state().communities.get_mut(&community_id) {
            let roles = community.member_roles.entry(user_id).or_default();
            if !roles.contains(&role_id) {
                roles.push(role_id);
            }
        }
    }

    pub fn add_channel(
        &self,
        community_id: CommunityId,
        name: &str,
        kind: ChannelKind,
        parent_id: Option<ChannelId>,
    ) -> Option<Channel> {
        let mut state = self.state();
        let id = state.allocate_id();
        let community = state.communities.get_mut(&community_id)?;
        let channel = Channel {
            id,
            name: name.to_string(),
            kind,
            parent_id,
        };
        community.channels.push(channel.clone());
        Some(channel)
    }

    pub fn add_invite(&self, community_id: CommunityId, invite: LiveInvite) {
        if let Some(community) = self.state().communities.get_mut(&community_id) {
            community.invites.push(invite);
        }
    }

    // Simulates a member joining through an invitation; single-use invitations vanish
    pub fn use_invite(&self, code: &str) {
        let mut state = self.state();
        for community in state.communities.values_mut() {
            if let Some(invite) = community.invites.iter_mut().find(|i| i.code == code) {
                invite.uses += 1;
                if invite.max_uses != 0 && invite.uses >= invite.max_uses {
                    community.invites.retain(|i| i.code != code);
                }
                return;
            }
        }
    }

    pub fn remove_invite(&self, code: &str) {
        for community in self.state().communities.values_mut() {
            community.invites.retain(|i| i.code != code);
        }
    }

    // Queues a failure returned by the next call of the named operation
    pub fn fail_next(&self, op: &'static str, err: PlatformError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    pub fn writes(&self) -> Vec<PlatformWrite> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn channels_of(&self, community_id: CommunityId) -> Vec<Channel> {
        self.state()
            .communities
            .get(&community_id)
            .map(|c| c.channels.clone())
            .unwrap_or_default()
    }

    pub fn roles_of(&self, community_id: CommunityId) -> Vec<Role> {
        self.state()
            .communities
            .get(&community_id)
            .map(|c| c.roles.clone())
            .unwrap_or_default()
    }

    pub fn overwrites_of(&self, community_id: CommunityId, channel_id: ChannelId) -> Vec<PermissionOverwrite> {
        self.state()
            .communities
            .get(&community_id)
            .and_then(|c| c.overwrites.get(&channel_id).cloned())
            .unwrap_or_default()
    }

    pub fn member_roles_of(&self, community_id: CommunityId, user_id: UserId) -> Vec<RoleId> {
        self.state()
            .communities
            .get(&community_id)
            .and_then(|c| c.member_roles.get(&user_id).cloned())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<(ChannelId, String)> {
        self.state()
            .writes
            .iter()
            .filter_map(|w| match w {
                PlatformWrite::SendMessage { channel_id, content } => Some((*channel_id, content.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CommunityPlatform for MemoryPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    async fn communities(&self) -> Result<Vec<Community>, PlatformError> {
        let mut state = self.state();
        state.take_failure("communities")?;
        Ok(state.communities.values().map(|c| c.community.clone()).collect())
    }

    async fn bot_grants(&self, community_id: CommunityId) -> Result<BotGrants, PlatformError> {
        let mut state = self.state();
        state.take_failure("bot_grants")?;
        Ok(state.community(community_id)?.grants)
    }

    async fn list_invites(&self, community_id: CommunityId) -> Result<Vec<LiveInvite>, PlatformError> {
        let mut state = self.state();
        state.take_failure("list_invites")?;
        let community = state.community(community_id)?;
        if !community.grants.manage_guild {
            return Err(PlatformError::Forbidden("MANAGE_GUILD required to list invites".to_string()));
        }
        Ok(community.invites.clone())
    }

    async fn create_invite(
        &self,
        channel_id: ChannelId,
        request: &InviteRequest,
    ) -> Result<LiveInvite, PlatformError> {
        let mut state = self.state();
        state.take_failure("create_invite")?;
        let community_id = state.community_of_channel(channel_id)?;

        let code = Uuid::new_v4().simple().to_string()[..10].to_string();
        let invite = LiveInvite {
            code: code.clone(),
            url: format!("https://invite.local/{}", code),
            channel_id,
            inviter_id: Some(self.bot_user_id),
            uses: 0,
            max_uses: request.max_uses,
            reason: Some(request.reason.clone()),
        };

        state.community_mut(community_id)?.invites.push(invite.clone());
        state.writes.push(PlatformWrite::CreateInvite {
            code,
            reason: request.reason.clone(),
        });
        Ok(invite)
    }

    async fn roles(&self, community_id: CommunityId) -> Result<Vec<Role>, PlatformError> {
        let mut state = self.state();
        state.take_failure("roles")?;
        Ok(state.community(community_id)?.roles.clone())
    }

    async fn create_role(&self, community_id: CommunityId, role: &NewRole) -> Result<Role, PlatformError> {
        let mut state = self.state();
        state.take_failure("create_role")?;
        let id = state.allocate_id();
        let community = state.community_mut(community_id)?;
        if !community.grants.manage_roles {
            return Err(PlatformError::Forbidden("MANAGE_ROLES required".to_string()));
        }

        // New roles land just above the default role
        let created = Role {
            id,
            name: role.name.clone(),
            position: 1,
            color: role.color,
            hoist: role.hoist,
            mentionable: role.mentionable,
        };
        community.roles.push(created.clone());
        state.writes.push(PlatformWrite::CreateRole { name: role.name.clone() });
        Ok(created)
    }

    async fn set_role_position(
        &self,
        community_id: CommunityId,
        role_id: RoleId,
        position: i64,
    ) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.take_failure("set_role_position")?;
        let community = state.community_mut(community_id)?;
        let role = community
            .roles
            .iter_mut()
            .find(|r| r.id == role_id)
            .ok_or_else(|| PlatformError::NotFound(format!("role {}", role_id)))?;
        role.position = position;
        state.writes.push(PlatformWrite::SetRolePosition { role_id, position });
        Ok(())
    }

    async fn member_role_ids(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<Vec<RoleId>, PlatformError> {
        let mut state = self.state();
        state.take_failure("member_role_ids")?;
        Ok(state
            .community(community_id)?
            .member_roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_member_role(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.take_failure("add_member_role")?;
        let community = state.community_mut(community_id)?;
        let roles = community.member_roles.entry(user_id).or_default();
        if !roles.contains(&role_id) {
            roles.push(role_id);
        }
        state.writes.push(PlatformWrite::AddMemberRole { user_id, role_id });
        Ok(())
    }

    async fn channels(&self, community_id: CommunityId) -> Result<Vec<Channel>, PlatformError> {
        let mut state = self.state();
        state.take_failure("channels")?;
        Ok(state.community(community_id)?.channels.clone())
    }

    async fn create_channel(
        &self,
        community_id: CommunityId,
        channel: &NewChannel,
    ) -> Result<Channel, PlatformError> {
        let mut state = self.state();
        state.take_failure("create_channel")?;
        let id = state.allocate_id();
        let community = state.community_mut(community_id)?;
        if !community.grants.manage_channels {
            return Err(PlatformError::Forbidden("MANAGE_CHANNELS required".to_string()));
        }

        let created = Channel {
            id,
            name: channel.name.clone(),
            kind: channel.kind,
            parent_id: channel.parent_id,
        };
        community.channels.push(created.clone());
        community.overwrites.insert(id, channel.overwrites.clone());
        state.writes.push(PlatformWrite::CreateChannel {
            name: channel.name.clone(),
            kind: channel.kind,
            parent_id: channel.parent_id,
        });
        Ok(created)
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.take_failure("send_message")?;
        state.community_of_channel(channel_id)?;
        state.writes.push(PlatformWrite::SendMessage {
            channel_id,
            content: content.to_string(),
        });
        Ok(())
    }
}
