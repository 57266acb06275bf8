//! End-to-end matching through the public Matchmaker API.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use matchmaker_core::{
    MatchDispatcher, Matchmaker, MatchmakerError, ProposedGroup,
};
use matchmaker_types::{MatchedGroup, MatchmakerConfig, Presence, TicketRequest};
use pretty_assertions::assert_eq;

/// Collects dispatched groups.
#[derive(Default, Clone)]
struct Collector {
    groups: Arc<Mutex<Vec<MatchedGroup>>>,
}

impl Collector {
    fn take(&self) -> Vec<MatchedGroup> {
        std::mem::take(&mut *self.groups.lock().unwrap())
    }
}

impl MatchDispatcher for Collector {
    fn dispatch(&self, group: &MatchedGroup) {
        self.groups.lock().unwrap().push(group.clone());
    }
}

fn setup(config: MatchmakerConfig) -> (Matchmaker, Collector) {
    let collector = Collector::default();
    let matchmaker = Matchmaker::new(config, Arc::new(collector.clone())).unwrap();
    (matchmaker, collector)
}

fn solo(session: &str, query: &str, min: usize, max: usize, multiple: usize) -> TicketRequest {
    TicketRequest::solo(session, format!("user-{}", session), query, min, max, multiple)
}

fn ids(group: &MatchedGroup) -> BTreeSet<String> {
    group.ticket_ids().into_iter().map(str::to_string).collect()
}

/// Panics if two different tickets of one party share a group.
fn assert_party_exclusion(groups: &[MatchedGroup]) {
    for group in groups {
        let mut owners: Vec<(&str, &str)> = group
            .entries
            .iter()
            .filter_map(|e| e.party_id.as_deref().map(|p| (p, e.ticket_id.as_str())))
            .collect();
        owners.sort();
        owners.dedup();
        for pair in owners.windows(2) {
            assert_ne!(
                pair[0].0, pair[1].0,
                "party {} joined group {} through two tickets",
                pair[0].0, group.token
            );
        }
    }
}

fn same_party_pool(mm: &Matchmaker) -> (String, String, String, String) {
    let lead = mm.submit(solo("s1", "*", 3, 3, 1)).unwrap();
    pause();
    let first = mm.submit(solo("s2", "*", 3, 3, 1).with_party("p2")).unwrap();
    pause();
    let second = mm.submit(solo("s3", "*", 3, 3, 1).with_party("p2")).unwrap();
    pause();
    let filler = mm.submit(solo("s4", "*", 3, 3, 1)).unwrap();
    (lead.ticket_id, first.ticket_id, second.ticket_id, filler.ticket_id)
}

/// Distinct creation timestamps keep oldest-first ordering deterministic.
fn pause() {
    thread::sleep(Duration::from_millis(3));
}

#[test]
fn test_exact_pair_matches_in_one_pass() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    let a = mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    let b = mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();

    let report = mm.process().unwrap();
    assert_eq!(report.matched.len(), 1);

    let groups = collector.take();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size(), 2);
    assert_eq!(
        ids(&groups[0]),
        BTreeSet::from([a.ticket_id.clone(), b.ticket_id.clone()])
    );

    // matched tickets leave the registry and index
    assert_eq!(mm.stats().unwrap().tickets, 0);
    assert!(mm.process().unwrap().matched.is_empty());
}

#[test]
fn test_partial_group_forms_after_last_interval() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    for session in ["s1", "s2", "s3"] {
        mm.submit(solo(session, "*", 2, 4, 1)).unwrap();
        pause();
    }

    let first = mm.process().unwrap();
    assert!(first.matched.is_empty());
    assert!(collector.take().is_empty());

    let second = mm.process().unwrap();
    assert_eq!(second.matched.len(), 1);
    assert_eq!(second.matched[0].size(), 3);
    assert_eq!(collector.take().len(), 1);
}

#[test]
fn test_party_fills_with_solos() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    let party = mm
        .submit(TicketRequest::party(
            "p1",
            vec![Presence::new("s1", "u1"), Presence::new("s2", "u2")],
            "*",
            4,
            4,
            2,
        ))
        .unwrap();
    let a = mm.submit(solo("s3", "*", 2, 4, 1)).unwrap();
    let b = mm.submit(solo("s4", "*", 2, 4, 1)).unwrap();

    mm.process().unwrap();
    let groups = collector.take();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size(), 4);
    assert_eq!(
        ids(&groups[0]),
        BTreeSet::from([party.ticket_id, a.ticket_id, b.ticket_id])
    );
    let parties: BTreeSet<Option<String>> =
        groups[0].entries.iter().map(|e| e.party_id.clone()).collect();
    assert_eq!(parties, BTreeSet::from([None, Some("p1".to_string())]));
}

#[test]
fn test_mutual_match_rejects_one_way_interest() {
    let mut config = MatchmakerConfig::default();
    config.mutual_match = true;
    config.mutual_match_threshold_ms = 60_000;
    let (mm, collector) = setup(config);

    mm.submit(solo("s1", "*", 2, 2, 1).with_string_property("region", "us"))
        .unwrap();
    mm.submit(
        solo("s2", "+properties.region:eu", 2, 2, 1).with_string_property("region", "eu"),
    )
    .unwrap();

    mm.process().unwrap();
    assert!(collector.take().is_empty());
    assert_eq!(mm.stats().unwrap().tickets, 2);
}

#[test]
fn test_one_way_interest_matches_without_precision() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    mm.submit(solo("s1", "*", 2, 2, 1).with_string_property("region", "us"))
        .unwrap();
    pause();
    mm.submit(
        solo("s2", "+properties.region:eu", 2, 2, 1).with_string_property("region", "eu"),
    )
    .unwrap();

    // the older ticket searches first and its "*" finds the picky one
    mm.process().unwrap();
    assert_eq!(collector.take().len(), 1);
}

#[test]
fn test_cancel_is_idempotent_and_owner_checked() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    let a = mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();

    let err = mm.cancel("s2", "user-s2", &a.ticket_id).unwrap_err();
    assert!(matches!(err, MatchmakerError::TicketNotFound(_)));

    mm.cancel("s1", "user-s1", &a.ticket_id).unwrap();
    let err = mm.cancel("s1", "user-s1", &a.ticket_id).unwrap_err();
    assert!(matches!(err, MatchmakerError::TicketNotFound(_)));

    mm.process().unwrap();
    assert!(collector.take().is_empty());
}

#[test]
fn test_party_removal() {
    let (mm, _) = setup(MatchmakerConfig::default());
    let request = TicketRequest::party(
        "p1",
        vec![Presence::new("s1", "u1"), Presence::new("s2", "u2")],
        "*",
        2,
        4,
        1,
    );
    let first = mm.submit(request.clone()).unwrap();
    mm.submit(request).unwrap();

    // a session cannot cancel a party ticket
    assert!(mm.cancel("s1", "u1", &first.ticket_id).is_err());
    assert!(mm.remove_party("p2", &first.ticket_id).is_err());

    mm.remove_party("p1", &first.ticket_id).unwrap();
    assert_eq!(mm.remove_party_all("p1").unwrap(), 1);
    assert_eq!(mm.stats().unwrap().tickets, 0);
}

#[test]
fn test_remove_session_all() {
    let (mm, _) = setup(MatchmakerConfig::default());
    mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    mm.submit(solo("s1", "*", 3, 3, 1)).unwrap();
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();

    assert_eq!(mm.remove_session_all("s1").unwrap(), 2);
    assert_eq!(mm.remove_session_all("s1").unwrap(), 0);
    assert_eq!(mm.stats().unwrap().tickets, 1);
}

#[test]
fn test_too_many_tickets() {
    let mut config = MatchmakerConfig::default();
    config.max_tickets = 2;
    let (mm, _) = setup(config);

    mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    let err = mm.submit(solo("s1", "*", 2, 2, 1)).unwrap_err();
    assert!(matches!(err, MatchmakerError::TooManyTickets(_)));

    // other sessions are unaffected
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();
}

#[test]
fn test_invalid_query_rejected() {
    let (mm, _) = setup(MatchmakerConfig::default());
    let err = mm.submit(solo("s1", "nosuchfield:value", 2, 2, 1)).unwrap_err();
    assert!(matches!(err, MatchmakerError::InvalidQuery(_)));
    assert_eq!(mm.stats().unwrap().tickets, 0);
}

#[test]
fn test_flexible_ticket_becomes_active() {
    let (mm, _) = setup(MatchmakerConfig::default());
    let lonely = mm.submit(solo("s1", "*", 2, 4, 1)).unwrap();

    let first = mm.process().unwrap();
    assert_eq!(first.promoted, 0);
    assert!(!mm.is_active(&lonely.ticket_id).unwrap());

    let second = mm.process().unwrap();
    assert_eq!(second.promoted, 1);
    assert!(mm.is_active(&lonely.ticket_id).unwrap());
    assert_eq!(mm.stats().unwrap().active, 1);

    // the active ticket matches as soon as a partner arrives
    mm.submit(solo("s2", "*", 2, 4, 1)).unwrap();
    let third = mm.process().unwrap();
    assert_eq!(third.matched.len(), 1);
    assert_eq!(third.matched[0].size(), 2);
}

#[test]
fn test_fairness_oldest_candidate_wins() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    let outer = mm.submit(solo("s0", "*", 2, 2, 1)).unwrap();
    pause();
    let oldest = mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    pause();
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();
    pause();
    mm.submit(solo("s3", "*", 2, 2, 1)).unwrap();

    mm.process().unwrap();
    let groups = collector.take();
    assert_eq!(groups.len(), 2);
    assert_eq!(
        ids(&groups[0]),
        BTreeSet::from([outer.ticket_id, oldest.ticket_id])
    );
}

#[test]
fn test_no_double_booking_under_load() {
    let mut config = MatchmakerConfig::default();
    config.max_intervals = 1;
    let (mm, collector) = setup(config);

    for i in 0..30 {
        mm.submit(solo(&format!("s{}", i), "*", 2, 4, 2)).unwrap();
    }
    mm.process().unwrap();

    let mut seen_tickets = BTreeSet::new();
    let mut seen_sessions = BTreeSet::new();
    for group in collector.take() {
        assert!(group.size() == 2 || group.size() == 4);
        for id in group.ticket_ids() {
            assert!(seen_tickets.insert(id.to_string()));
        }
        for entry in &group.entries {
            assert!(seen_sessions.insert(entry.presence.session_id.clone()));
        }
    }
    assert_eq!(seen_tickets.len(), 30);
}

#[test]
fn test_override_selects_groups() {
    let collector = Collector::default();
    let selector = |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
        Ok(proposals.into_iter().take(1).collect())
    };
    let mm = Matchmaker::with_override(
        MatchmakerConfig::default(),
        Arc::new(collector.clone()),
        Arc::new(selector),
    )
    .unwrap();

    mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();
    mm.submit(solo("s3", "*", 2, 2, 1)).unwrap();

    let report = mm.process().unwrap();
    assert_eq!(report.matched.len(), 1);
    assert_eq!(collector.take().len(), 1);
    assert_eq!(mm.stats().unwrap().tickets, 1);
}

#[test]
fn test_override_failure_fails_closed() {
    let collector = Collector::default();
    let selector = |_: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> {
        Err("selector unavailable".to_string())
    };
    let mm = Matchmaker::with_override(
        MatchmakerConfig::default(),
        Arc::new(collector.clone()),
        Arc::new(selector),
    )
    .unwrap();

    mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();

    let err = mm.process().unwrap_err();
    assert!(matches!(err, MatchmakerError::Override(_)));
    assert!(collector.take().is_empty());
    assert_eq!(mm.stats().unwrap().tickets, 2);
}

#[test]
fn test_ticket_submitted_during_pass_waits_for_next() {
    let collector = Collector::default();
    let mm = Arc::new(
        Matchmaker::new(MatchmakerConfig::default(), Arc::new(collector.clone())).unwrap(),
    );
    mm.submit(solo("s1", "*", 2, 2, 1)).unwrap();

    // nothing to pair with yet
    mm.process().unwrap();
    mm.submit(solo("s2", "*", 2, 2, 1)).unwrap();
    mm.process().unwrap();
    assert_eq!(collector.take().len(), 1);
}

#[test]
fn test_party_tickets_never_share_a_group() {
    let (mm, collector) = setup(MatchmakerConfig::default());
    let (lead, first, second, filler) = same_party_pool(&mm);

    let report = mm.process().unwrap();
    assert_eq!(report.matched.len(), 1);

    let groups = collector.take();
    assert_party_exclusion(&groups);
    assert_eq!(ids(&groups[0]), BTreeSet::from([lead, first, filler]));
    assert!(mm.ticket(&second).unwrap().is_some());
}

#[test]
fn test_override_never_offers_two_tickets_of_one_party() {
    let collector = Collector::default();
    let accept_all =
        |proposals: Vec<ProposedGroup>| -> Result<Vec<ProposedGroup>, String> { Ok(proposals) };
    let mm = Matchmaker::with_override(
        MatchmakerConfig::default(),
        Arc::new(collector.clone()),
        Arc::new(accept_all),
    )
    .unwrap();
    let (_, first, second, _) = same_party_pool(&mm);

    let report = mm.process().unwrap();
    assert_eq!(report.matched.len(), 1);

    let groups = collector.take();
    assert_party_exclusion(&groups);
    let matched = ids(&groups[0]);
    assert!(!(matched.contains(&first) && matched.contains(&second)));
}
