// onboard-service/src/tests/model_tests.rs
use crate::models::{
    channel_base_name, channel_names_match, role_name, InvitationRecord, InviteReason, LiveInvite, Roster,
    ServiceError, TeamChannelNames, TeamSummary, UNKNOWN_TEAM,
};
use crate::tests::row;
use crate::utils::{InvitationRegistry, UsageTracker};

#[test]
fn parses_team_and_member_from_reason() {
    let reason = InviteReason::parse("Team:Falcons Member:a@b.com").unwrap();
    assert_eq!(reason.team, "Falcons");
    assert_eq!(reason.member_email.as_deref(), Some("a@b.com"));

    let reason = InviteReason::parse("Team:Red Dragons").unwrap();
    assert_eq!(reason.team, "Red Dragons");
    assert_eq!(reason.member_email, None);
}

#[test]
fn unparseable_reasons_fall_back_to_unknown() {
    assert_eq!(InviteReason::parse("created by hand"), None);
    assert_eq!(InviteReason::parse("Team:   "), None);
    assert_eq!(InviteReason::parse_or_unknown(None).team, UNKNOWN_TEAM);
    assert_eq!(InviteReason::parse_or_unknown(Some("nonsense")).team, UNKNOWN_TEAM);
}

#[test]
fn rendered_reasons_parse_back() {
    let reason = InviteReason::for_member("Night Owls", "owl@example.com");
    assert_eq!(reason.render(), "Team:Night Owls Member:owl@example.com");
    assert_eq!(InviteReason::parse(&reason.render()), Some(reason));
}

#[test]
fn role_and_channel_names_are_normalised() {
    assert_eq!(role_name("  alpha squad!! "), "Alpha Squad");
    assert_eq!(role_name("team_42"), "Team_42");
    assert_eq!(channel_base_name("Alpha  Squad!"), "alpha-squad");

    let names = TeamChannelNames::for_team("Red Dragons");
    assert_eq!(names.text, "red-dragons-chat");
    assert_eq!(names.voice, "red-dragons-voice");

    assert!(channel_names_match("Red Dragons-voice", "red-dragons-voice"));
    assert!(!channel_names_match("red-dragons-chat", "red-dragons-voice"));
}

#[test]
fn rediscovered_record_recovers_team_and_member() {
    let invite = LiveInvite {
        code: "abc".to_string(),
        url: "https://invite.local/abc".to_string(),
        channel_id: 1,
        inviter_id: Some(42),
        uses: 2,
        max_uses: 0,
        reason: Some("Team:Falcons Member:a@b.com".to_string()),
    };
    let record = InvitationRecord::rediscovered(&invite, 100);
    assert_eq!(record.team, "Falcons");
    assert_eq!(record.member_email.as_deref(), Some("a@b.com"));
}

#[test]
fn registry_rejects_duplicate_codes() {
    let mut registry = InvitationRegistry::new();
    let record = InvitationRecord::new("abc".to_string(), "u".to_string(), 100, "Falcons".to_string(), None).unwrap();
    registry.register(record.clone()).unwrap();

    assert!(matches!(registry.register(record), Err(ServiceError::Conflict(_))));
    assert_eq!(registry.len(), 1);
    assert!(InvitationRecord::new(String::new(), "u".to_string(), 100, "Falcons".to_string(), None).is_err());
}

#[test]
fn tracker_only_moves_forward() {
    let mut tracker = UsageTracker::new();
    tracker.track("abc", 3);
    assert!(tracker.observe("abc", 4));
    assert!(!tracker.observe("abc", 2));
    assert_eq!(tracker.uses("abc"), Some(4));
}

#[test]
fn roster_reports_missing_columns() {
    let mut incomplete = row("Ada", "Lovelace", "ada@example.com", "Falcons");
    incomplete.email = None;
    incomplete.team = Some("  ".to_string());

    match Roster::from_rows(vec![incomplete]) {
        Err(ServiceError::BadRequest(message)) => assert_eq!(message, "Missing required columns: email, team"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn roster_groups_members_by_team() {
    let roster = Roster::from_rows(vec![
        row("Ada", "Lovelace", "ada@example.com", "Falcons"),
        row("Alan", "Turing", "alan@example.com", "Hawks"),
        row("Grace", "Hopper", "grace@example.com", "Falcons"),
    ])
    .unwrap();

    assert_eq!(roster.team_names(), vec!["Falcons".to_string(), "Hawks".to_string()]);
    assert_eq!(roster.member_count(), 3);

    let falcons = TeamSummary::from_members("Falcons", &roster.teams["Falcons"]);
    assert_eq!(falcons.member_count, 2);
    assert_eq!(falcons.more, 0);
    assert_eq!(falcons.preview[0], "Ada Lovelace (ada@example.com)");
}
