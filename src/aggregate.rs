//! Flatten per-ticket timelines into one chart-ready collection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::planned::prepend_planned;
use crate::ticket::Ticket;
use crate::timeline::{Segment, TicketError, TimelineOptions, TimelineSet, build};

/// A ticket that contributed no segments because reconstruction failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTicket {
    pub key: String,
    pub reason: String,
}

impl From<&TicketError> for SkippedTicket {
    fn from(err: &TicketError) -> Self {
        Self {
            key: err.key().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result of reconstructing a batch of tickets
#[derive(Debug, Default)]
pub struct Reconstruction {
    /// All segments, sorted by assignee display name
    pub segments: Vec<Segment>,
    pub skipped: Vec<SkippedTicket>,
}

/// Concatenate timelines and stable-sort by assignee display name.
///
/// Segments with the same assignee keep their ticket and segment order.
pub fn aggregate<I>(timelines: I) -> Vec<Segment>
where
    I: IntoIterator<Item = TimelineSet>,
{
    let mut segments: Vec<Segment> = timelines.into_iter().flatten().collect();
    segments.sort_by(|a, b| a.assignee.cmp(&b.assignee));
    segments
}

/// Map each assignee identity to its display name. Last write wins.
pub fn user_index<'a, I>(tickets: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a Ticket>,
{
    let mut users = BTreeMap::new();
    for assignee in tickets.into_iter().filter_map(|t| t.assignee.as_ref()) {
        users.insert(assignee.name.clone(), assignee.display_name.clone());
    }
    users
}

/// Build, merge and aggregate every ticket. A failing ticket is reported in
/// `skipped` and contributes nothing; the others are unaffected.
pub fn reconstruct(
    tickets: &[Ticket],
    options: &TimelineOptions,
    now: DateTime<Utc>,
) -> Reconstruction {
    let mut timelines = Vec::with_capacity(tickets.len());
    let mut skipped = Vec::new();

    for ticket in tickets {
        let result = build(ticket, options, now).and_then(|set| prepend_planned(ticket, set));
        match result {
            Ok(set) => {
                tracing::debug!(ticket = %ticket.key, segments = set.len(), "reconstructed");
                timelines.push(set);
            }
            Err(err) => {
                tracing::warn!("Skipping {}", err);
                skipped.push(SkippedTicket::from(&err));
            }
        }
    }

    Reconstruction {
        segments: aggregate(timelines),
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        analyze_testing_history, at, make_ticket, make_ticket_with_events, status_change,
    };

    fn now() -> DateTime<Utc> {
        at("2024-02-01T00:00")
    }

    #[test]
    fn test_sorted_by_assignee() {
        let bob = make_ticket_with_events("PRJ-1", "Bob", analyze_testing_history());
        let alice = make_ticket_with_events("PRJ-2", "Alice", analyze_testing_history());
        let result = reconstruct(&[bob, alice], &TimelineOptions::default(), now());

        let names: Vec<&str> = result.segments.iter().map(|s| s.assignee.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Alice", "Bob", "Bob"]);
    }

    #[test]
    fn test_same_assignee_keeps_ticket_order() {
        let first = make_ticket_with_events("PRJ-9", "Carol", analyze_testing_history());
        let second = make_ticket_with_events("PRJ-3", "Carol", analyze_testing_history());
        let segments = aggregate(vec![
            build(&first, &TimelineOptions::default(), now()).unwrap(),
            build(&second, &TimelineOptions::default(), now()).unwrap(),
        ]);

        let order: Vec<(&str, &str)> = segments
            .iter()
            .map(|s| (s.task.split(' ').next().unwrap(), s.status.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("PRJ-9", "Analyze"),
                ("PRJ-9", "Testing"),
                ("PRJ-3", "Analyze"),
                ("PRJ-3", "Testing"),
            ]
        );
    }

    #[test]
    fn test_failing_ticket_is_skipped_not_fatal() {
        let good = make_ticket_with_events("PRJ-1", "Alice", analyze_testing_history());
        let mut unassigned = make_ticket_with_events("PRJ-2", "Bob", analyze_testing_history());
        unassigned.assignee = None;
        let broken = make_ticket_with_events(
            "PRJ-3",
            "Carol",
            vec![
                status_change("2024-01-05T00:00", "Backlog", "Analyze"),
                status_change("2024-01-01T00:00", "Analyze", "Testing"),
            ],
        );

        let result = reconstruct(&[good, unassigned, broken], &TimelineOptions::default(), now());

        assert_eq!(result.segments.len(), 2);
        assert!(result.segments.iter().all(|s| s.assignee == "Alice"));
        let keys: Vec<&str> = result.skipped.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["PRJ-2", "PRJ-3"]);
    }

    #[test]
    fn test_empty_ticket_contributes_nothing() {
        let empty = make_ticket("PRJ-4", "Dave");
        let result = reconstruct(&[empty], &TimelineOptions::default(), now());
        assert!(result.segments.is_empty());
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_user_index_last_write_wins() {
        let mut a = make_ticket("PRJ-1", "Alice");
        let mut b = make_ticket("PRJ-2", "Alice");
        a.assignee.as_mut().unwrap().display_name = "Alice A.".to_string();
        b.assignee.as_mut().unwrap().display_name = "Alice Anders".to_string();
        let mut c = make_ticket("PRJ-3", "Bob");
        c.assignee = None;

        let users = user_index(&[a, b, c]);
        assert_eq!(users.len(), 1);
        assert_eq!(users.get("alice").map(String::as_str), Some("Alice Anders"));
    }
}
