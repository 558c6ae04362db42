// onboard-service/src/models/roster.rs
use crate::models::{CommunityId, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const REQUIRED_COLUMNS: [&str; 4] = ["firstname", "lastname", "email", "team"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub team: String,
}

// A roster row as handed over by the ingestion side; any column may be absent
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RosterRow {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub team: Option<String>,
}

impl RosterRow {
    fn column(&self, name: &str) -> Option<&str> {
        let value = match name {
            "firstname" => self.firstname.as_deref(),
            "lastname" => self.lastname.as_deref(),
            "email" => self.email.as_deref(),
            "team" => self.team.as_deref(),
            _ => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoadRosterRequest {
    pub community_id: CommunityId,
    pub members: Vec<RosterRow>,
}

// Team name -> members, in team name order
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub teams: BTreeMap<String, Vec<MemberRecord>>,
}

impl Roster {
    pub fn from_rows(rows: Vec<RosterRow>) -> Result<Self, ServiceError> {
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| rows.iter().any(|row| row.column(col).is_none()))
            .collect();

        if !missing.is_empty() {
            return Err(ServiceError::BadRequest(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut teams: BTreeMap<String, Vec<MemberRecord>> = BTreeMap::new();
        for row in rows {
            let record = MemberRecord {
                firstname: row.column("firstname").unwrap_or_default().to_string(),
                lastname: row.column("lastname").unwrap_or_default().to_string(),
                email: row.column("email").unwrap_or_default().to_string(),
                team: row.column("team").unwrap_or_default().to_string(),
            };
            teams.entry(record.team.clone()).or_default().push(record);
        }

        Ok(Self { teams })
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.teams.values().map(Vec::len).sum()
    }

    pub fn team_names(&self) -> Vec<String> {
        self.teams.keys().cloned().collect()
    }
}

#[derive(Serialize, Debug)]
pub struct TeamSummary {
    pub team: String,
    pub member_count: usize,
    pub preview: Vec<String>,
    pub more: usize,
}

impl TeamSummary {
    pub fn from_members(team: &str, members: &[MemberRecord]) -> Self {
        let preview = members
            .iter()
            .take(3)
            .map(|m| format!("{} {} ({})", m.firstname, m.lastname, m.email))
            .collect();

        Self {
            team: team.to_string(),
            member_count: members.len(),
            preview,
            more: members.len().saturating_sub(3),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RosterReport {
    pub members: usize,
    pub teams: usize,
    pub outcomes: Vec<crate::models::TeamOutcome>,
}
