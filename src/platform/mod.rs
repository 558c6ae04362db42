// onboard-service/src/platform/mod.rs
//! The community platform the service drives.
//!
//! Everything the onboarding engine knows about communities, invitations, roles and
//! channels comes through [`CommunityPlatform`]. Production uses the Discord REST
//! adapter; tests use an in-memory platform.

use crate::models::{
    BotGrants, Channel, ChannelId, Community, CommunityId, InviteRequest, LiveInvite, NewChannel,
    NewRole, PlatformError, Role, RoleId, UserId,
};
use async_trait::async_trait;

pub mod discord;
#[cfg(test)]
pub mod memory;

pub use discord::DiscordPlatform;
#[cfg(test)]
pub use memory::MemoryPlatform;

#[async_trait]
pub trait CommunityPlatform: Send + Sync {
    /// Identity the service acts as; invitations it mints carry this as inviter.
    fn bot_user_id(&self) -> UserId;

    /// The community's default role. On the platform it shares the community's id.
    fn default_role_id(&self, community_id: CommunityId) -> RoleId {
        community_id
    }

    async fn communities(&self) -> Result<Vec<Community>, PlatformError>;

    async fn bot_grants(&self, community_id: CommunityId) -> Result<BotGrants, PlatformError>;

    /// Currently valid invitations of a community.
    async fn list_invites(&self, community_id: CommunityId) -> Result<Vec<LiveInvite>, PlatformError>;

    async fn create_invite(
        &self,
        channel_id: ChannelId,
        request: &InviteRequest,
    ) -> Result<LiveInvite, PlatformError>;

    async fn roles(&self, community_id: CommunityId) -> Result<Vec<Role>, PlatformError>;

    async fn create_role(&self, community_id: CommunityId, role: &NewRole) -> Result<Role, PlatformError>;

    async fn set_role_position(
        &self,
        community_id: CommunityId,
        role_id: RoleId,
        position: i64,
    ) -> Result<(), PlatformError>;

    async fn member_role_ids(
        &self,
        community_id: CommunityId,
        user_id: UserId,
    ) -> Result<Vec<RoleId>, PlatformError>;

    async fn add_member_role(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError>;

    /// All channels of a community, categories included.
    async fn channels(&self, community_id: CommunityId) -> Result<Vec<Channel>, PlatformError>;

    async fn create_channel(
        &self,
        community_id: CommunityId,
        channel: &NewChannel,
    ) -> Result<Channel, PlatformError>;

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), PlatformError>;
}
