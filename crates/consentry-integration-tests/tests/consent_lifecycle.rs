//! Consent lifecycle flows: toggle history chains, expiry sweeps, and
//! the interaction between subject-side revocation and organization-side
//! request state.

use chrono::{DateTime, Utc};
use consentry_core::{OrgId, SubjectId, Timestamp};
use consentry_ledger::{
    AccessLog, ConsentAction, ConsentLedger, RequestDecision, RequestStatus,
};

fn ts(s: &str) -> Timestamp {
    Timestamp::from_datetime(
        DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc),
    )
}

#[test]
fn toggle_chain_alternates_and_links_values() {
    let ledger = ConsentLedger::new();
    let start = ts("2026-01-01T00:00:00Z");
    let ct = ledger.register_type("location", start);
    let subject = SubjectId::new();

    let n = 7;
    for i in 0..n {
        ledger
            .toggle(&subject, &ct.id, Some(subject.clone()), start.plus_days(i))
            .unwrap();
    }

    let mut history = ledger.history_for(&subject, None);
    assert_eq!(history.len(), n as usize);
    history.reverse(); // chronological

    // First entry is the creation grant with no previous value.
    assert_eq!(history[0].action, ConsentAction::Granted);
    assert_eq!(history[0].previous_value, None);
    assert!(history[0].new_value);

    // Every subsequent entry alternates and chains previous → new.
    for (i, pair) in history.windows(2).enumerate() {
        assert_ne!(pair[0].action, pair[1].action, "entry {i} did not alternate");
        assert_eq!(pair[1].previous_value, Some(pair[0].new_value));
        assert_ne!(pair[1].new_value, pair[0].new_value);
    }

    // Odd toggle count ends granted.
    assert!(ledger.grant(&subject, &ct.id).unwrap().access);
}

#[test]
fn expiry_sweep_behaviour_matches_windows() {
    let ledger = ConsentLedger::new();
    let start = ts("2026-01-01T00:00:00Z");
    let ct = ledger.register_type("location", start);

    // Past expiry: forced revoked, listed as expired.
    let overdue = SubjectId::new();
    ledger.toggle(&overdue, &ct.id, None, start).unwrap();
    ledger.set_duration(&overdue, &ct.id, 10, None, start).unwrap();

    // Expires in 5 days: reported, not mutated.
    let soon = SubjectId::new();
    ledger.toggle(&soon, &ct.id, None, start).unwrap();
    ledger.set_duration(&soon, &ct.id, 35, None, start).unwrap();

    let sweep_at = ts("2026-01-31T00:00:00Z");
    let sweep = ledger.check_expiry(sweep_at);

    assert_eq!(sweep.expired.len(), 1);
    assert_eq!(sweep.expired[0].subject, overdue);
    assert!(!ledger.grant(&overdue, &ct.id).unwrap().access);

    assert_eq!(sweep.expiring_soon.len(), 1);
    assert_eq!(sweep.expiring_soon[0].subject, soon);
    assert_eq!(sweep.expiring_soon[0].days_remaining, 5);
    assert!(ledger.grant(&soon, &ct.id).unwrap().access);

    // The overdue grant does not appear in both lists.
    assert!(sweep.expiring_soon.iter().all(|g| g.subject != overdue));

    // The forced revocation recorded an EXPIRED entry with no actor.
    let entry = &ledger.history_for(&overdue, None)[0];
    assert_eq!(entry.action, ConsentAction::Expired);
    assert!(entry.actor.is_none());
    assert_eq!(entry.previous_value, Some(true));
    assert!(!entry.new_value);
}

#[test]
fn revocation_leaves_org_request_approved_until_decided() {
    // The scan-side view of this divergence is covered by the
    // compliance tests; here the ledger and log must simply disagree
    // without either store rejecting the state.
    let ledger = ConsentLedger::new();
    let log = AccessLog::new();
    let start = ts("2026-01-01T00:00:00Z");
    let ct = ledger.register_type("location", start);
    let subject = SubjectId::new();
    let org = OrgId::new();

    ledger.toggle(&subject, &ct.id, None, start).unwrap();
    let request = log
        .file(
            org,
            subject.clone(),
            ct.id.clone(),
            "documented service delivery",
            start,
        )
        .unwrap();
    log.decide(&request.id, &subject, RequestDecision::Approve)
        .unwrap();

    // Subject revokes consent; the request stays APPROVED.
    ledger
        .toggle(&subject, &ct.id, None, start.plus_days(1))
        .unwrap();
    assert!(!ledger.has_valid_grant(&subject, &ct.id, start.plus_days(2)));
    assert_eq!(
        log.get(&request.id).unwrap().status,
        RequestStatus::Approved
    );

    // The subject later revokes the request itself.
    log.decide(&request.id, &subject, RequestDecision::Revoke)
        .unwrap();
    assert_eq!(log.get(&request.id).unwrap().status, RequestStatus::Revoked);
}

#[test]
fn regrant_after_expiry_starts_a_fresh_window() {
    let ledger = ConsentLedger::new();
    let start = ts("2026-01-01T00:00:00Z");
    let ct = ledger.register_type("location", start);
    let subject = SubjectId::new();

    ledger.toggle(&subject, &ct.id, None, start).unwrap();
    ledger.set_duration(&subject, &ct.id, 10, None, start).unwrap();

    let sweep_at = ts("2026-02-01T00:00:00Z");
    let sweep = ledger.check_expiry(sweep_at);
    assert_eq!(sweep.expired.len(), 1);

    // Toggling again re-grants with a fresh expiry from the duration.
    let regrant_at = ts("2026-02-02T00:00:00Z");
    let transition = ledger.toggle(&subject, &ct.id, None, regrant_at).unwrap();
    assert!(transition.grant.access);
    assert_eq!(transition.grant.expires_at, Some(regrant_at.plus_days(10)));
    assert!(ledger.has_valid_grant(&subject, &ct.id, ts("2026-02-05T00:00:00Z")));

    // History: GRANTED, EXPIRED, GRANTED (newest first: reverse).
    let actions: Vec<ConsentAction> = ledger
        .history_for(&subject, None)
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            ConsentAction::Granted,
            ConsentAction::Expired,
            ConsentAction::Modified,
            ConsentAction::Granted,
        ]
    );
}
