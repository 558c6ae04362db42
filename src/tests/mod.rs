// onboard-service/src/tests/mod.rs
use crate::models::{
    BotGrants, Channel, ChannelId, Community, CommunityId, InviteRequest, LiveInvite, MemberRecord, NewChannel,
    NewRole, PlatformError, Role, RoleId, RosterRow, UserId,
};
use crate::platform::{CommunityPlatform, MemoryPlatform};
use crate::services::email::{EmailError, EmailProvider};
use crate::services::OnboardingService;
use crate::utils::config::OnboardingSettings;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod model_tests;

pub const BOT: UserId = 42;
pub const COMMUNITY: CommunityId = 100;
pub const OTHER_COMMUNITY: CommunityId = 200;

pub fn test_settings() -> OnboardingSettings {
    OnboardingSettings {
        settle_delay: Duration::ZERO,
        ..OnboardingSettings::default()
    }
}

pub fn platform_with_community() -> Arc<MemoryPlatform> {
    let platform = Arc::new(MemoryPlatform::new(BOT));
    platform.add_community(COMMUNITY, "Test Community");
    platform
}

pub fn service_with(platform: &Arc<MemoryPlatform>, mailer: Option<Arc<dyn EmailProvider>>) -> OnboardingService {
    let platform: Arc<dyn CommunityPlatform> = platform.clone();
    OnboardingService::new(platform, mailer, test_settings())
}

pub fn row(firstname: &str, lastname: &str, email: &str, team: &str) -> RosterRow {
    RosterRow {
        firstname: Some(firstname.to_string()),
        lastname: Some(lastname.to_string()),
        email: Some(email.to_string()),
        team: Some(team.to_string()),
    }
}

// Records every send; fails for the listed addresses
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail_for: Vec<String>,
}

impl RecordingMailer {
    pub fn failing_for(emails: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: emails.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingMailer {
    async fn send_team_invite(&self, member: &MemberRecord, invite_url: &str) -> Result<(), EmailError> {
        if self.fail_for.contains(&member.email) {
            return Err(EmailError::SendFailed(format!("mailbox unavailable: {}", member.email)));
        }
        self.sent
            .lock()
            .unwrap()
            .push((member.email.clone(), invite_url.to_string()));
        Ok(())
    }
}

// Delegates to the memory platform but holds every invitation listing back for a
// while after taking it, leaving room for other work to interleave
pub struct SlowInviteListing {
    pub inner: Arc<MemoryPlatform>,
    pub pause: Duration,
}

#[async_trait]
impl CommunityPlatform for SlowInviteListing {
    fn bot_user_id(&self) -> UserId {
        self.inner.bot_user_id()
    }

    async fn communities(&self) -> Result<Vec<Community>, PlatformError> {
        self.inner.communities().await
    }

    async fn bot_grants(&self, community_id: CommunityId) -> Result<BotGrants, PlatformError> {
        self.inner.bot_grants(community_id).await
    }

    async fn list_invites(&self, community_id: CommunityId) -> Result<Vec<LiveInvite>, PlatformError> {
        let snapshot = self.inner.list_invites(community_id).await;
        tokio::time::sleep(self.pause).await;
        snapshot
    }

    async fn create_invite(&self, channel_id: ChannelId, request: &InviteRequest) -> Result<LiveInvite, PlatformError> {
        self.inner.create_invite(channel_id, request).await
    }

    async fn roles(&self, community_id: CommunityId) -> Result<Vec<Role>, PlatformError> {
        self.inner.roles(community_id).await
    }

    async fn create_role(&self, community_id: CommunityId, role: &NewRole) -> Result<Role, PlatformError> {
        self.inner.create_role(community_id, role).await
    }

    async fn set_role_position(
        &self,
        community_id: CommunityId,
        role_id: RoleId,
        position: i64,
    ) -> Result<(), PlatformError> {
        self.inner.set_role_position(community_id, role_id, position).await
    }

    async fn member_role_ids(&self, community_id: CommunityId, user_id: UserId) -> Result<Vec<RoleId>, PlatformError> {
        self.inner.member_role_ids(community_id, user_id).await
    }

    async fn add_member_role(
        &self,
        community_id: CommunityId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), PlatformError> {
        self.inner.add_member_role(community_id, user_id, role_id).await
    }

    async fn channels(&self, community_id: CommunityId) -> Result<Vec<Channel>, PlatformError> {
        self.inner.channels(community_id).await
    }

    async fn create_channel(&self, community_id: CommunityId, channel: &NewChannel) -> Result<Channel, PlatformError> {
        self.inner.create_channel(community_id, channel).await
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<(), PlatformError> {
        self.inner.send_message(channel_id, content).await
    }
}
