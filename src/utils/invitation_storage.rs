// onboard-service/src/utils/invitation_storage.rs
use crate::models::{CommunityId, InvitationRecord, ServiceError};
use log::{debug, info};
use std::collections::HashMap;

// Invitation code -> record, for every invitation the service minted or rediscovered.
// Lives for the process lifetime only; startup reconciliation rebuilds it.
#[derive(Debug, Default)]
pub struct InvitationRegistry {
    records: HashMap<String, InvitationRecord>,
}

impl InvitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Save a record; codes are unique
    pub fn register(&mut self, record: InvitationRecord) -> Result<(), ServiceError> {
        if self.records.contains_key(&record.code) {
            return Err(ServiceError::Conflict(format!(
                "Invitation {} is already registered",
                record.code
            )));
        }

        debug!("Registered invitation {} for team {}", record.code, record.team);
        self.records.insert(record.code.clone(), record);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&InvitationRecord> {
        self.records.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // Every record, ordered by community then code
    pub fn all(&self) -> Vec<&InvitationRecord> {
        let mut records: Vec<&InvitationRecord> = self.records.values().collect();
        records.sort_by(|a, b| (a.community_id, &a.code).cmp(&(b.community_id, &b.code)));
        records
    }

    // Records for one community, ordered by code
    pub fn for_community(&self, community_id: CommunityId) -> Vec<&InvitationRecord> {
        let mut records: Vec<&InvitationRecord> = self
            .records
            .values()
            .filter(|r| r.community_id == community_id)
            .collect();
        records.sort_by(|a, b| a.code.cmp(&b.code));
        records
    }

    // The invitation minted for a member of a team, if any
    pub fn find_for_member(
        &self,
        community_id: CommunityId,
        team: &str,
        email: &str,
    ) -> Option<&InvitationRecord> {
        self.for_community(community_id).into_iter().find(|r| {
            r.team == team
                && r.member_email
                    .as_deref()
                    .map_or(false, |e| e.eq_ignore_ascii_case(email))
        })
    }

    // The shared invitation minted for a whole team, if any
    pub fn find_for_team(&self, community_id: CommunityId, team: &str) -> Option<&InvitationRecord> {
        self.for_community(community_id)
            .into_iter()
            .find(|r| r.team == team && r.member_email.is_none())
    }

    // Drop every record of a community, returning the removed codes
    pub fn supersede_community(&mut self, community_id: CommunityId) -> Vec<String> {
        let codes: Vec<String> = self
            .records
            .values()
            .filter(|r| r.community_id == community_id)
            .map(|r| r.code.clone())
            .collect();

        for code in &codes {
            self.records.remove(code);
        }

        info!("✅ Superseded {} invitations for community: {}", codes.len(), community_id);
        codes
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
