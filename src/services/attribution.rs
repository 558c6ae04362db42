// onboard-service/src/services/attribution.rs
//! Works out which invitation a new member used.
//!
//! The platform's join event does not say, so each join diffs the live invitation list
//! against the usage snapshots taken earlier. Two signals are checked in order:
//!
//! 1. a tracked invitation of this community is gone from the live list (single-use
//!    invitations vanish instead of counting up), then
//! 2. a listed invitation created by the service reports more uses than last seen.
//!
//! Ties resolve to the first candidate in enumeration order. Two invitations consumed
//! between consecutive checks cannot be told apart with the data the platform exposes.

use crate::models::{Attribution, AttributionPath, CommunityId, InvitationRecord, LiveInvite, ServiceError, UserId};
use crate::utils::{InvitationRegistry, UsageTracker};
use log::{debug, info};
use std::collections::{HashMap, HashSet};

// Registry plus usage baseline. Always mutated as one unit under the service lock.
#[derive(Debug, Default)]
pub struct InviteState {
    pub registry: InvitationRegistry,
    pub tracker: UsageTracker,
    // Bumped on every registration; code -> generation it was registered in
    generation: u64,
    registered_in: HashMap<String, u64>,
}

impl InviteState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the latest registration. Read it before fetching the live
    /// invitation list; anything registered later cannot appear in that list.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // Registers a freshly minted or rediscovered invitation at its current use count
    pub fn track_new(&mut self, record: InvitationRecord, uses: u64) -> Result<(), ServiceError> {
        let code = record.code.clone();
        self.registry.register(record)?;
        self.generation += 1;
        self.registered_in.insert(code.clone(), self.generation);
        self.tracker.track(&code, uses);
        Ok(())
    }

    fn registered_after(&self, code: &str, generation: u64) -> bool {
        self.registered_in.get(code).map_or(false, |g| *g > generation)
    }

    // Forgets every invitation of a community ahead of a full regeneration
    pub fn supersede_community(&mut self, community_id: CommunityId) -> usize {
        let codes = self.registry.supersede_community(community_id);
        for code in &codes {
            self.tracker.remove(code);
            self.registered_in.remove(code);
        }
        codes.len()
    }
}

/// Attributes one join in `community_id` given the community's live invitations.
///
/// `observed` is the state generation read before `live` was fetched; invitations
/// registered after it are missing from `live` only because they are newer, so they
/// never count as consumed.
///
/// Returns `None` when nothing changed, which is the normal outcome for members who
/// joined through a link the service does not manage.
pub fn attribute_join(
    state: &mut InviteState,
    community_id: CommunityId,
    bot_user_id: UserId,
    live: &[LiveInvite],
    observed: u64,
) -> Option<Attribution> {
    detect_disappeared(state, community_id, live, observed)
        .or_else(|| detect_usage_increase(state, community_id, bot_user_id, live))
}

fn detect_disappeared(
    state: &mut InviteState,
    community_id: CommunityId,
    live: &[LiveInvite],
    observed: u64,
) -> Option<Attribution> {
    let live_codes: HashSet<&str> = live.iter().map(|i| i.code.as_str()).collect();

    let consumed = state
        .tracker
        .codes()
        .find(|code| {
            !live_codes.contains(code.as_str())
                && !state.registered_after(code, observed)
                && state
                    .registry
                    .get(code)
                    .map_or(false, |r| r.community_id == community_id)
        })
        .cloned()?;

    state.tracker.remove(&consumed);
    state.registered_in.remove(&consumed);
    let record = state.registry.get(&consumed)?;
    info!("🔍 Detected used invite: {} (no longer exists)", consumed);

    Some(Attribution {
        code: consumed.clone(),
        team: record.team.clone(),
        member_email: record.member_email.clone(),
        path: AttributionPath::Disappeared,
    })
}

fn detect_usage_increase(
    state: &mut InviteState,
    community_id: CommunityId,
    bot_user_id: UserId,
    live: &[LiveInvite],
) -> Option<Attribution> {
    for invite in live {
        if invite.inviter_id != Some(bot_user_id) {
            continue;
        }

        let record = match state.registry.get(&invite.code) {
            Some(record) if record.community_id == community_id => record,
            _ => continue,
        };

        let tracked = state.tracker.uses(&invite.code).unwrap_or(0);
        debug!("Checking invite {}: tracked={} vs current={}", invite.code, tracked, invite.uses);

        if invite.uses > tracked {
            let attribution = Attribution {
                code: invite.code.clone(),
                team: record.team.clone(),
                member_email: record.member_email.clone(),
                path: AttributionPath::UsageIncreased,
            };
            state.tracker.observe(&invite.code, invite.uses);
            info!("🔑 Valid invite used: {}", invite.code);
            return Some(attribution);
        }
    }

    None
}
