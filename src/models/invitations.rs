// onboard-service/src/models/invitations.rs
use crate::models::{ChannelId, CommunityId, ServiceError, UserId};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TEAM: &str = "Unknown";

lazy_static! {
    // "Team:<name>" optionally followed by " Member:<email>"
    static ref REASON_RE: Regex =
        Regex::new(r"^\s*Team:\s*(?P<team>.+?)(?:\s+Member:\s*(?P<member>\S*))?\s*$").unwrap();
}

// Team linkage carried in an invitation's creation reason
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InviteReason {
    pub team: String,
    pub member_email: Option<String>,
}

impl InviteReason {
    pub fn for_team(team: &str) -> Self {
        Self {
            team: team.to_string(),
            member_email: None,
        }
    }

    pub fn for_member(team: &str, email: &str) -> Self {
        Self {
            team: team.to_string(),
            member_email: Some(email.to_string()),
        }
    }

    /// Parses `Team:<name>` or `Team:<name> Member:<email>`.
    ///
    /// Returns `None` for anything else, including a team name that is blank.
    pub fn parse(reason: &str) -> Option<Self> {
        let caps = REASON_RE.captures(reason)?;
        let team = caps.name("team")?.as_str().trim();
        if team.is_empty() {
            return None;
        }

        let member_email = caps
            .name("member")
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty());

        Some(Self {
            team: team.to_string(),
            member_email,
        })
    }

    // Never fails: absent or malformed reasons fall back to the "Unknown" team
    pub fn parse_or_unknown(reason: Option<&str>) -> Self {
        reason
            .and_then(Self::parse)
            .unwrap_or_else(|| Self::for_team(UNKNOWN_TEAM))
    }

    pub fn render(&self) -> String {
        match &self.member_email {
            Some(email) => format!("Team:{} Member:{}", self.team, email),
            None => format!("Team:{}", self.team),
        }
    }
}

// An invitation as currently reported by the platform
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LiveInvite {
    pub code: String,
    pub url: String,
    pub channel_id: ChannelId,
    pub inviter_id: Option<UserId>,
    pub uses: u64,
    pub max_uses: u64,
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InviteRequest {
    pub max_uses: u64,
    // 0 means the invitation never expires
    pub max_age_secs: u64,
    pub unique: bool,
    pub reason: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InviteScope {
    #[default]
    Member,
    Team,
}

// Registry entry for an invitation minted (or rediscovered) by the service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvitationRecord {
    pub code: String,
    pub url: String,
    pub community_id: CommunityId,
    pub team: String,
    pub member_email: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl InvitationRecord {
    pub fn new(
        code: String,
        url: String,
        community_id: CommunityId,
        team: String,
        member_email: Option<String>,
    ) -> Result<Self, ServiceError> {
        if code.trim().is_empty() {
            return Err(ServiceError::BadRequest("Invitation code cannot be empty".to_string()));
        }
        if team.trim().is_empty() {
            return Err(ServiceError::BadRequest("Team name cannot be empty".to_string()));
        }

        Ok(Self {
            code,
            url,
            community_id,
            team,
            member_email,
            created_at: Utc::now(),
        })
    }

    // Rebuilds a record from platform state; the team comes from the reason string
    pub fn rediscovered(invite: &LiveInvite, community_id: CommunityId) -> Self {
        let reason = InviteReason::parse_or_unknown(invite.reason.as_deref());
        Self {
            code: invite.code.clone(),
            url: invite.url.clone(),
            community_id,
            team: reason.team,
            member_email: reason.member_email,
            created_at: Utc::now(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum AttributionPath {
    // A tracked invitation is no longer listed (single-use consumed)
    Disappeared,
    // A listed invitation reports more uses than last observed
    UsageIncreased,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Attribution {
    pub code: String,
    pub team: String,
    pub member_email: Option<String>,
    pub path: AttributionPath,
}

// Admin view of a registered invitation
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvitationSummary {
    pub code: String,
    pub url: String,
    pub team: String,
    pub member_email: Option<String>,
    pub tracked_uses: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MintInvitationsRequest {
    // Defaults to the command channel
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub scope: InviteScope,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MintOutcome {
    pub team: String,
    pub member_email: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

// Outcome of an invitation email batch
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct EmailReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    // First five failures only
    pub failed_recipients: Vec<String>,
    pub more_failures: usize,
}

impl EmailReport {
    pub fn record_failure(&mut self, email: &str) {
        self.failed += 1;
        if self.failed_recipients.len() < 5 {
            self.failed_recipients.push(email.to_string());
        } else {
            self.more_failures += 1;
        }
    }
}
