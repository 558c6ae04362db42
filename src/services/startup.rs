// onboard-service/src/services/startup.rs
use crate::models::{CommunityId, InvitationRecord};
use crate::platform::CommunityPlatform;
use crate::services::attribution::InviteState;
use log::{error, info, warn};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SkippedCommunity {
    pub community_id: CommunityId,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StartupReport {
    pub communities_scanned: usize,
    pub invitations_tracked: usize,
    pub skipped: Vec<SkippedCommunity>,
}

/// Rebuilds registry and usage snapshots from the platform's current invitations.
///
/// Only invitations created by the service's own identity are tracked. Communities
/// where invitations cannot be listed are skipped with a diagnostic; nothing here is
/// fatal to the process.
pub async fn rebuild_invite_state(platform: &dyn CommunityPlatform) -> (InviteState, StartupReport) {
    let mut state = InviteState::new();
    let mut report = StartupReport::default();

    let communities = match platform.communities().await {
        Ok(communities) => communities,
        Err(e) => {
            error!("❌ Could not list communities: {}", e);
            return (state, report);
        }
    };

    let bot_user_id = platform.bot_user_id();
    for community in communities {
        report.communities_scanned += 1;

        let grants = match platform.bot_grants(community.id).await {
            Ok(grants) => grants,
            Err(e) => {
                error!("Permission lookup failed in {}: {}", community.name, e);
                report.skipped.push(SkippedCommunity {
                    community_id: community.id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !grants.manage_guild {
            warn!("❌ Missing MANAGE_GUILD permission in {} - invite tracking disabled", community.name);
            report.skipped.push(SkippedCommunity {
                community_id: community.id,
                reason: "missing MANAGE_GUILD".to_string(),
            });
            continue;
        }

        let invites = match platform.list_invites(community.id).await {
            Ok(invites) => invites,
            Err(e) => {
                error!("Error processing invites in {}: {}", community.name, e);
                report.skipped.push(SkippedCommunity {
                    community_id: community.id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for invite in invites.iter().filter(|i| i.inviter_id == Some(bot_user_id)) {
            let record = InvitationRecord::rediscovered(invite, community.id);
            let team = record.team.clone();
            match state.track_new(record, invite.uses) {
                Ok(()) => {
                    report.invitations_tracked += 1;
                    info!("🔗 Tracking invite {} (uses: {}) for team {} in {}", invite.url, invite.uses, team, community.name);
                }
                Err(e) => warn!("Skipping invite {} in {}: {}", invite.code, community.name, e),
            }
        }
    }

    (state, report)
}
