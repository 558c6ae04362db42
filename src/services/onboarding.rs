// onboard-service/src/services/onboarding.rs
//! The onboarding engine.
//!
//! Owns every piece of mutable state (invitation registry, usage snapshots, the
//! loaded roster and the email delivery ledger) behind one mutex. The lock is only
//! ever taken between platform calls, never across one.

use crate::models::{
    channel_names_match, Attribution, Channel, ChannelId, ChannelKind, CommunityId, EmailReport,
    InvitationRecord, InvitationSummary, InviteReason, InviteRequest, InviteScope, LoadRosterRequest,
    MemberJoin, MintInvitationsRequest, MintOutcome, NewChannel, Permission, PermissionOverwrite,
    ProvisionError, Role, RoleGrant, Roster, RosterReport, ServiceError, TeamChannels, TeamOutcome,
    TeamSummary,
};
use crate::platform::CommunityPlatform;
use crate::services::attribution::{attribute_join, InviteState};
use crate::services::channel_provisioner::ensure_team_channels;
use crate::services::email::EmailProvider;
use crate::services::role_provisioner::{assign_team_role, bot_top_role};
use crate::services::startup::{rebuild_invite_state, StartupReport};
use crate::utils::config::OnboardingSettings;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ServiceState {
    invites: InviteState,
    roster: Roster,
    // (lowercased email, invitation code) pairs already mailed
    delivered: HashSet<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WelcomeStatus {
    Sent,
    NoChannel,
    // The role grant failed, so there is nothing to announce
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AttributedJoin {
    pub attribution: Attribution,
    pub role: Result<(Role, RoleGrant), ProvisionError>,
    pub channels: Result<TeamChannels, ProvisionError>,
    pub welcome: WelcomeStatus,
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    // Invitation state could not be read
    Skipped(String),
    Unattributed,
    Attributed(Box<AttributedJoin>),
}

pub struct OnboardingService {
    platform: Arc<dyn CommunityPlatform>,
    mailer: Option<Arc<dyn EmailProvider>>,
    settings: OnboardingSettings,
    state: Mutex<ServiceState>,
}

impl OnboardingService {
    pub fn new(
        platform: Arc<dyn CommunityPlatform>,
        mailer: Option<Arc<dyn EmailProvider>>,
        settings: OnboardingSettings,
    ) -> Self {
        Self {
            platform,
            mailer,
            settings,
            state: Mutex::new(ServiceState::default()),
        }
    }

    pub fn platform(&self) -> &dyn CommunityPlatform {
        self.platform.as_ref()
    }

    pub fn settings(&self) -> &OnboardingSettings {
        &self.settings
    }

    fn lock(&self) -> Result<MutexGuard<'_, ServiceState>, ServiceError> {
        self.state.lock().map_err(|e| {
            error!("Lock error: {:?}", e);
            ServiceError::InternalServerError
        })
    }

    /// Replaces the invitation state with what the platform currently reports and
    /// makes sure every community has its command channel.
    pub async fn reconcile_startup(&self) -> Result<StartupReport, ServiceError> {
        let (rebuilt, report) = rebuild_invite_state(self.platform()).await;
        {
            let mut state = self.lock()?;
            state.invites = rebuilt;
        }
        info!(
            "✅ Tracking {} invitations across {} communities ({} skipped)",
            report.invitations_tracked,
            report.communities_scanned,
            report.skipped.len()
        );

        match self.platform.communities().await {
            Ok(communities) => {
                for community in communities {
                    if let Err(e) = self.ensure_command_channel(community.id).await {
                        warn!("⚠️ Could not set up command channel in {}: {}", community.name, e);
                    }
                }
            }
            Err(e) => error!("❌ Could not list communities: {}", e),
        }

        Ok(report)
    }

    /// Finds or creates the text channel administrators drive the service from.
    /// Everyone can read it; only the service and admins can post.
    pub async fn ensure_command_channel(&self, community_id: CommunityId) -> Result<Channel, ProvisionError> {
        let platform = self.platform();
        let channels = platform.channels(community_id).await?;
        if let Some(existing) = channels
            .into_iter()
            .find(|c| c.kind == ChannelKind::Text && channel_names_match(&c.name, &self.settings.command_channel))
        {
            return Ok(existing);
        }

        let grants = platform.bot_grants(community_id).await?;
        if !grants.manage_channels {
            return Err(ProvisionError::Permission("MANAGE_CHANNELS".to_string()));
        }

        let default_role_id = platform.default_role_id(community_id);
        let mut overwrites = vec![PermissionOverwrite::deny(default_role_id, &[Permission::SendMessages])];
        let bot_role = bot_top_role(platform, community_id).await?;
        if bot_role.id != default_role_id {
            overwrites.push(PermissionOverwrite::allow(
                bot_role.id,
                &[Permission::ViewChannel, Permission::SendMessages, Permission::ManageChannels],
            ));
        }

        let channel = platform
            .create_channel(
                community_id,
                &NewChannel {
                    name: self.settings.command_channel.clone(),
                    kind: ChannelKind::Text,
                    parent_id: None,
                    overwrites,
                    reason: "Bot command center".to_string(),
                },
            )
            .await?;
        info!("✅ Created command channel in community {}", community_id);

        if let Err(e) = platform.send_message(channel.id, "Bot command center ready!").await {
            warn!("⚠️ Couldn't post in command channel: {}", e);
        }
        Ok(channel)
    }

    /// Full join pipeline: attribute the join, then grant the team role, ensure the
    /// team channels and post the welcome. Each step after attribution runs and
    /// reports independently.
    pub async fn handle_member_join(&self, join: &MemberJoin) -> JoinOutcome {
        let platform = self.platform();
        let community_id = join.community_id;

        match platform.bot_grants(community_id).await {
            Ok(grants) if grants.manage_guild => {}
            Ok(_) => {
                error!("❌ Missing MANAGE_GUILD permission in community {}", community_id);
                return JoinOutcome::Skipped("missing MANAGE_GUILD".to_string());
            }
            Err(e) => {
                error!("❌ Permission lookup failed in community {}: {}", community_id, e);
                return JoinOutcome::Skipped(e.to_string());
            }
        }

        // Anything minted while the list is in flight must not look consumed
        let observed = match self.lock() {
            Ok(state) => state.invites.generation(),
            Err(e) => return JoinOutcome::Skipped(e.to_string()),
        };

        let live = match platform.list_invites(community_id).await {
            Ok(live) => live,
            Err(e) => {
                error!("❌ Could not list invites in community {}: {}", community_id, e);
                return JoinOutcome::Skipped(e.to_string());
            }
        };

        let attribution = match self.lock() {
            Ok(mut state) => attribute_join(
                &mut state.invites,
                community_id,
                platform.bot_user_id(),
                &live,
                observed,
            ),
            Err(e) => return JoinOutcome::Skipped(e.to_string()),
        };

        let attribution = match attribution {
            Some(attribution) => attribution,
            None => {
                info!("No tracked invite matched the join of {} in community {}", join.username, community_id);
                return JoinOutcome::Unattributed;
            }
        };
        info!("🎉 {} joined using invite for {}", join.username, attribution.team);

        let role = assign_team_role(platform, community_id, join.user_id, &attribution.team).await;
        if let Err(e) = &role {
            error!("❌ Failed to assign role for {} in community {}: {}", join.username, community_id, e);
        }

        let channels = ensure_team_channels(platform, community_id, &attribution.team, &self.settings.admin_roles).await;
        if let Err(e) = &channels {
            error!("❌ Failed to set up channels for {}: {}", attribution.team, e);
        }

        let welcome = match &role {
            Ok((role, _)) => self.send_welcome(join, &attribution.team, role).await,
            Err(_) => WelcomeStatus::Skipped,
        };

        JoinOutcome::Attributed(Box::new(AttributedJoin {
            attribution,
            role,
            channels,
            welcome,
        }))
    }

    async fn send_welcome(&self, join: &MemberJoin, team: &str, role: &Role) -> WelcomeStatus {
        let channels = match self.platform.channels(join.community_id).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!("⚠️ Couldn't look up the welcome channel: {}", e);
                return WelcomeStatus::Failed(e.to_string());
            }
        };

        let welcome = match channels
            .iter()
            .find(|c| c.kind == ChannelKind::Text && channel_names_match(&c.name, &self.settings.welcome_channel))
        {
            Some(channel) => channel,
            None => {
                debug!("No {} channel in community {}", self.settings.welcome_channel, join.community_id);
                return WelcomeStatus::NoChannel;
            }
        };

        let content = format!(
            "Welcome {} to team {}! You've been assigned the {} role and can now access your team channels.",
            join.mention(),
            team,
            role.mention()
        );
        match self.platform.send_message(welcome.id, &content).await {
            Ok(()) => WelcomeStatus::Sent,
            Err(e) => {
                warn!("⚠️ Welcome message failed: {}", e);
                WelcomeStatus::Failed(e.to_string())
            }
        }
    }

    /// Ensures role and channels for each team in turn. One team failing never stops
    /// the batch.
    pub async fn provision_teams(&self, community_id: CommunityId, teams: &[String]) -> Vec<TeamOutcome> {
        let mut outcomes = Vec::with_capacity(teams.len());
        for team in teams {
            let result = ensure_team_channels(self.platform(), community_id, team, &self.settings.admin_roles).await;
            if let Err(e) = &result {
                error!("❌ Provisioning failed for team {} in community {}: {}", team, community_id, e);
            }
            outcomes.push(TeamOutcome::from_result(team, result));
            tokio::task::yield_now().await;
        }
        outcomes
    }

    pub async fn provision_loaded_teams(&self, community_id: CommunityId) -> Result<Vec<TeamOutcome>, ServiceError> {
        let teams = self.lock()?.roster.team_names();
        if teams.is_empty() {
            return Err(ServiceError::BadRequest("No team data loaded! Load a roster first.".to_string()));
        }
        Ok(self.provision_teams(community_id, &teams).await)
    }

    /// Replaces the loaded roster and provisions every team in it.
    pub async fn load_roster(&self, request: LoadRosterRequest) -> Result<RosterReport, ServiceError> {
        let roster = Roster::from_rows(request.members)?;
        if roster.is_empty() {
            return Err(ServiceError::BadRequest("No users found.".to_string()));
        }

        let members = roster.member_count();
        let teams = roster.team_names();
        self.lock()?.roster = roster;
        info!("✅ Successfully loaded {} users across {} teams", members, teams.len());

        let outcomes = self.provision_teams(request.community_id, &teams).await;
        Ok(RosterReport {
            members,
            teams: teams.len(),
            outcomes,
        })
    }

    pub fn team_summaries(&self) -> Result<Vec<TeamSummary>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .roster
            .teams
            .iter()
            .map(|(team, members)| TeamSummary::from_members(team, members))
            .collect())
    }

    pub fn invitation_summaries(&self) -> Result<Vec<InvitationSummary>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .invites
            .registry
            .all()
            .into_iter()
            .map(|r| InvitationSummary {
                code: r.code.clone(),
                url: r.url.clone(),
                team: r.team.clone(),
                member_email: r.member_email.clone(),
                tracked_uses: state.invites.tracker.uses(&r.code),
            })
            .collect())
    }

    pub fn tracked_uses(&self, code: &str) -> Result<Option<u64>, ServiceError> {
        Ok(self.lock()?.invites.tracker.uses(code))
    }

    pub fn is_registered(&self, code: &str) -> Result<bool, ServiceError> {
        Ok(self.lock()?.invites.registry.contains(code))
    }

    /// Mints a fresh set of invitations for the loaded roster, superseding whatever
    /// the community had before.
    pub async fn mint_invitations(
        &self,
        community_id: CommunityId,
        request: &MintInvitationsRequest,
    ) -> Result<Vec<MintOutcome>, ServiceError> {
        let roster = self.lock()?.roster.clone();
        if roster.is_empty() {
            return Err(ServiceError::BadRequest("No team data loaded! Load a roster first.".to_string()));
        }

        let channel_id = match request.channel_id {
            Some(channel_id) => channel_id,
            None => self
                .ensure_command_channel(community_id)
                .await
                .map(|c| c.id)
                .map_err(|e| ServiceError::BadRequest(format!("No channel to create invitations on: {}", e)))?,
        };

        let superseded = self.lock()?.invites.supersede_community(community_id);
        info!("🔄 Regenerating invitations in community {} ({} superseded)", community_id, superseded);

        let mut outcomes = Vec::new();
        for (team, members) in &roster.teams {
            match request.scope {
                InviteScope::Team => {
                    let max_uses = members.len() as u64;
                    outcomes.push(self.mint_one(community_id, channel_id, team, None, max_uses).await);
                    tokio::task::yield_now().await;
                }
                InviteScope::Member => {
                    for member in members {
                        let max_uses = self.settings.invite_max_uses;
                        outcomes.push(
                            self.mint_one(community_id, channel_id, team, Some(&member.email), max_uses)
                                .await,
                        );
                        tokio::task::yield_now().await;
                    }
                }
            }
        }

        let created = outcomes.iter().filter(|o| o.url.is_some()).count();
        info!("✅ Created {} of {} invitations", created, outcomes.len());
        Ok(outcomes)
    }

    async fn mint_one(
        &self,
        community_id: CommunityId,
        channel_id: ChannelId,
        team: &str,
        member_email: Option<&str>,
        max_uses: u64,
    ) -> MintOutcome {
        let reason = match member_email {
            Some(email) => InviteReason::for_member(team, email),
            None => InviteReason::for_team(team),
        };
        let request = InviteRequest {
            max_uses,
            max_age_secs: self.settings.invite_max_age_secs,
            unique: true,
            reason: reason.render(),
        };

        let result = async {
            let invite = self
                .platform
                .create_invite(channel_id, &request)
                .await
                .map_err(|e| e.to_string())?;
            let record = InvitationRecord::new(
                invite.code.clone(),
                invite.url.clone(),
                community_id,
                team.to_string(),
                member_email.map(str::to_string),
            )
            .map_err(|e| e.to_string())?;
            self.lock()
                .map_err(|e| e.to_string())?
                .invites
                .track_new(record, invite.uses)
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(invite.url)
        }
        .await;

        match result {
            Ok(url) => {
                debug!("Created invite for {} ({:?}): {}", team, member_email, url);
                MintOutcome {
                    team: team.to_string(),
                    member_email: member_email.map(str::to_string),
                    url: Some(url),
                    error: None,
                }
            }
            Err(e) => {
                error!("❌ Failed to create invite for {}: {}", team, e);
                MintOutcome {
                    team: team.to_string(),
                    member_email: member_email.map(str::to_string),
                    url: None,
                    error: Some(e),
                }
            }
        }
    }

    /// Mails every rostered member their invitation link.
    ///
    /// A member's own invitation wins over the team's shared one. Each (member,
    /// invitation) pair is mailed at most once; repeats count as skipped.
    pub async fn send_invitation_emails(&self, community_id: CommunityId) -> Result<EmailReport, ServiceError> {
        let (roster, has_invites) = {
            let state = self.lock()?;
            (
                state.roster.clone(),
                !state.invites.registry.for_community(community_id).is_empty(),
            )
        };

        if !has_invites {
            return Err(ServiceError::BadRequest("No invites created! Create invitations first.".to_string()));
        }
        if roster.is_empty() {
            return Err(ServiceError::BadRequest("No team data loaded! Load a roster first.".to_string()));
        }
        let mailer = match &self.mailer {
            Some(mailer) => mailer,
            None => {
                error!("❌ Email credentials not configured");
                return Err(ServiceError::BadRequest(
                    "Email functionality is disabled - check server logs".to_string(),
                ));
            }
        };

        let total = roster.member_count();
        info!("📧 Starting to send {} emails...", total);

        let mut report = EmailReport::default();
        let mut processed = 0usize;
        let mut last_decile = 0usize;

        for (team, members) in &roster.teams {
            for member in members {
                processed += 1;

                let invite = {
                    let state = self.lock()?;
                    let registry = &state.invites.registry;
                    registry
                        .find_for_member(community_id, team, &member.email)
                        .or_else(|| registry.find_for_team(community_id, team))
                        .map(|r| (r.code.clone(), r.url.clone()))
                };

                match invite {
                    None => {
                        warn!("⚠️ No invite found for {} in team {}", member.email, team);
                        report.skipped += 1;
                    }
                    Some((code, url)) => {
                        let key = (member.email.to_lowercase(), code);
                        if self.lock()?.delivered.contains(&key) {
                            debug!("Already mailed {} its invitation", member.email);
                            report.skipped += 1;
                        } else {
                            match mailer.send_team_invite(member, &url).await {
                                Ok(()) => {
                                    self.lock()?.delivered.insert(key);
                                    report.sent += 1;
                                    info!("✅ Email sent to {} ({})", member.email, team);
                                }
                                Err(e) => {
                                    error!("❌ Failed to send email to {} ({}): {}", member.email, team, e);
                                    report.record_failure(&member.email);
                                }
                            }
                        }
                    }
                }

                let decile = processed * 10 / total;
                if decile > last_decile {
                    last_decile = decile;
                    info!("📊 Email progress: {}% ({}/{})", processed * 100 / total, processed, total);
                }
                tokio::task::yield_now().await;
            }
        }

        info!(
            "📝 Email report: {} sent, {} failed, {} skipped",
            report.sent, report.failed, report.skipped
        );
        Ok(report)
    }
}
