//! Status timeline reconstruction
//!
//! Turns a ticket's changelog into non-overlapping segments, one per status
//! the ticket held. A ticket is modelled as holding exactly one status at a
//! time, so the builder is a single-slot state machine: the current status
//! and at most one open segment. Each status transition closes the open
//! segment (when it leaves that status) and opens a new one (unless the
//! target status is excluded).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::ticket::{ChangeEvent, Ticket};

/// Statuses that never open a segment unless configured otherwise
pub const DEFAULT_EXCLUDED_STATUSES: [&str; 2] = ["Backlog", "Closed"];

/// A reconstructed interval during which a ticket held one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Assignee display name
    pub assignee: String,
    /// Ticket key followed by summary
    pub task: String,
    pub status: String,
    pub start: DateTime<Utc>,
    /// Unset while the ticket is still in this status during reconstruction
    pub end: Option<DateTime<Utc>>,
}

impl Segment {
    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }
}

/// Ordered segments for a single ticket
pub type TimelineSet = Vec<Segment>;

/// Per-ticket reconstruction failure. The ticket is skipped, the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("{key}: malformed history: {reason}")]
    MalformedHistory { key: String, reason: String },
    #[error("{key}: ticket has no assignee")]
    MissingAssignee { key: String },
}

impl TicketError {
    pub fn malformed(key: &str, reason: impl Into<String>) -> Self {
        TicketError::MalformedHistory {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            TicketError::MalformedHistory { key, .. } | TicketError::MissingAssignee { key } => key,
        }
    }
}

/// Knobs for reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineOptions {
    /// Statuses that close a preceding segment but never open one.
    /// Compared case-insensitively.
    pub excluded: BTreeSet<String>,
    /// Treat the ticket's creation time as the start of the status held
    /// before its first recorded transition
    pub seed_from_created: bool,
    /// Reject histories whose transitions don't start from the status the
    /// ticket was in. When false, the open segment is closed anyway.
    pub strict: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self::with_excluded(DEFAULT_EXCLUDED_STATUSES)
    }
}

impl TimelineOptions {
    pub fn with_excluded<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: statuses
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            seed_from_created: true,
            strict: true,
        }
    }

    pub fn is_excluded(&self, status: &str) -> bool {
        self.excluded.contains(&status.trim().to_lowercase())
    }
}

/// Reconstruct the status timeline of one ticket.
///
/// Status events are consumed in upstream order; they are never re-sorted.
/// A segment still open after the last event is closed at `now` (or at its
/// own start, if that lies after `now`).
pub fn build(
    ticket: &Ticket,
    options: &TimelineOptions,
    now: DateTime<Utc>,
) -> Result<TimelineSet, TicketError> {
    let assignee = ticket
        .assignee
        .as_ref()
        .ok_or_else(|| TicketError::MissingAssignee {
            key: ticket.key.clone(),
        })?;

    let task = ticket.task_label();
    let mut machine = StatusMachine::new(&ticket.key, &assignee.display_name, &task, options);

    let events: Vec<&ChangeEvent> = ticket.status_events().collect();

    if options.seed_from_created
        && let (Some(created), Some(first)) = (ticket.created, events.first())
    {
        machine.seed(created, first);
    }

    for event in events {
        machine.apply(event)?;
    }

    Ok(machine.finish(now))
}

/// Single-slot state machine over one ticket's status transitions
struct StatusMachine<'a> {
    key: &'a str,
    assignee: &'a str,
    task: &'a str,
    options: &'a TimelineOptions,
    /// Status the ticket currently holds, excluded or not
    current: Option<String>,
    open: Option<Segment>,
    closed: Vec<Segment>,
    /// Timestamp of the last applied transition (or the seed)
    last_at: Option<DateTime<Utc>>,
}

impl<'a> StatusMachine<'a> {
    fn new(key: &'a str, assignee: &'a str, task: &'a str, options: &'a TimelineOptions) -> Self {
        Self {
            key,
            assignee,
            task,
            options,
            current: None,
            open: None,
            closed: Vec::new(),
            last_at: None,
        }
    }

    /// Open the status the ticket was created in, taken from the first
    /// transition's `from`.
    fn seed(&mut self, created: DateTime<Utc>, first: &ChangeEvent) {
        let Some(initial) = first.from.as_deref() else {
            return;
        };
        if created > first.at {
            tracing::debug!(
                ticket = self.key,
                "creation time is after the first transition; not seeding initial status"
            );
            return;
        }
        self.current = Some(initial.to_string());
        self.last_at = Some(created);
        if !self.options.is_excluded(initial) {
            self.open = Some(self.segment(initial, created));
        }
    }

    fn apply(&mut self, event: &ChangeEvent) -> Result<(), TicketError> {
        let to = event.to.as_deref().ok_or_else(|| {
            TicketError::malformed(
                self.key,
                format!("status change at {} has no target status", event.at),
            )
        })?;
        let from = event.from.as_deref();

        if let Some(last) = self.last_at
            && event.at < last
        {
            return Err(TicketError::malformed(
                self.key,
                format!(
                    "status change at {} precedes the previous one at {}",
                    event.at, last
                ),
            ));
        }

        let mismatch = match (&self.current, from) {
            (Some(current), Some(from)) => current != from,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if mismatch {
            let reason = format!(
                "transition at {} leaves {:?} but the ticket was in {:?}",
                event.at,
                from.unwrap_or_default(),
                self.current.as_deref().unwrap_or_default()
            );
            if self.options.strict {
                return Err(TicketError::malformed(self.key, reason));
            }
            tracing::warn!(ticket = self.key, "{}; closing the open segment", reason);
            self.close(event.at);
        } else if from == Some(to) {
            // Still in the same status; the open segment carries on.
            tracing::debug!(ticket = self.key, status = to, "skipping no-op transition");
            self.last_at = Some(event.at);
            return Ok(());
        } else if self
            .open
            .as_ref()
            .is_some_and(|open| Some(open.status.as_str()) == from)
        {
            self.close(event.at);
        }

        if !self.options.is_excluded(to) {
            self.open = Some(self.segment(to, event.at));
        }
        self.current = Some(to.to_string());
        self.last_at = Some(event.at);
        Ok(())
    }

    fn close(&mut self, at: DateTime<Utc>) {
        if let Some(mut segment) = self.open.take() {
            segment.end = Some(at);
            self.closed.push(segment);
        }
    }

    fn finish(mut self, now: DateTime<Utc>) -> TimelineSet {
        if let Some(open) = &self.open {
            let end = now.max(open.start);
            self.close(end);
        }
        self.closed
    }

    fn segment(&self, status: &str, start: DateTime<Utc>) -> Segment {
        Segment {
            assignee: self.assignee.to_string(),
            task: self.task.to_string(),
            status: status.to_string(),
            start,
            end: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        analyze_testing_history, at, field_change, make_ticket, make_ticket_with_events,
        status_change,
    };

    fn now() -> DateTime<Utc> {
        at("2024-02-01T00:00")
    }

    fn statuses(set: &TimelineSet) -> Vec<&str> {
        set.iter().map(|s| s.status.as_str()).collect()
    }

    #[test]
    fn test_default_exclusions_yield_two_segments() {
        let ticket = make_ticket_with_events("PRJ-1", "Alice", analyze_testing_history());
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[0].status, "Analyze");
        assert_eq!(set[0].start, at("2024-01-02T09:00"));
        assert_eq!(set[0].end, Some(at("2024-01-05T14:30")));
        assert_eq!(set[1].status, "Testing");
        assert_eq!(set[1].start, at("2024-01-05T14:30"));
        assert_eq!(set[1].end, Some(at("2024-01-08T11:15")));
        assert_eq!(set[0].assignee, "Alice");
        assert_eq!(set[0].task, "PRJ-1 Summary of PRJ-1");
    }

    #[test]
    fn test_consecutive_segments_share_boundary() {
        let ticket = make_ticket_with_events("PRJ-1", "Alice", analyze_testing_history());
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        for pair in set.windows(2) {
            assert_eq!(pair[0].end, Some(pair[1].start));
        }
    }

    #[test]
    fn test_no_exclusions_seeds_initial_status_from_creation() {
        let mut ticket = make_ticket_with_events("PRJ-2", "Alice", analyze_testing_history());
        ticket.created = Some(at("2023-12-28T10:00"));
        let options = TimelineOptions::with_excluded(Vec::<String>::new());
        let set = build(&ticket, &options, now()).unwrap();

        assert_eq!(statuses(&set), vec!["Backlog", "Analyze", "Testing", "Closed"]);
        assert_eq!(set[0].start, at("2023-12-28T10:00"));
        assert_eq!(set[0].end, Some(at("2024-01-02T09:00")));
        // Closed is still open at reconstruction time
        assert_eq!(set[3].end, Some(now()));
    }

    #[test]
    fn test_no_exclusions_without_creation_time() {
        let ticket = make_ticket_with_events("PRJ-3", "Alice", analyze_testing_history());
        let options = TimelineOptions::with_excluded(Vec::<String>::new());
        let set = build(&ticket, &options, now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Testing", "Closed"]);
    }

    #[test]
    fn test_seeding_can_be_disabled() {
        let mut ticket = make_ticket_with_events("PRJ-4", "Alice", analyze_testing_history());
        ticket.created = Some(at("2023-12-28T10:00"));
        let mut options = TimelineOptions::with_excluded(Vec::<String>::new());
        options.seed_from_created = false;
        let set = build(&ticket, &options, now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Testing", "Closed"]);
    }

    #[test]
    fn test_excluded_seed_status_is_not_opened() {
        let mut ticket = make_ticket_with_events("PRJ-5", "Alice", analyze_testing_history());
        ticket.created = Some(at("2023-12-28T10:00"));
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Testing"]);
    }

    #[test]
    fn test_open_segment_ends_now() {
        let ticket = make_ticket_with_events(
            "PRJ-6",
            "Bob",
            vec![status_change("2024-01-10T08:00", "Backlog", "In Progress")],
        );
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].end, Some(now()));
    }

    #[test]
    fn test_future_start_is_clamped() {
        let ticket = make_ticket_with_events(
            "PRJ-7",
            "Bob",
            vec![status_change("2024-03-01T08:00", "Backlog", "In Progress")],
        );
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert_eq!(set[0].end, Some(set[0].start));
    }

    #[test]
    fn test_excluded_target_closes_without_opening() {
        let ticket = make_ticket_with_events(
            "PRJ-8",
            "Bob",
            vec![
                status_change("2024-01-02T09:00", "Backlog", "In Progress"),
                status_change("2024-01-03T09:00", "In Progress", "Backlog"),
                status_change("2024-01-04T09:00", "Backlog", "In Progress"),
            ],
        );
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert_eq!(statuses(&set), vec!["In Progress", "In Progress"]);
        assert_eq!(set[0].end, Some(at("2024-01-03T09:00")));
        assert_eq!(set[1].start, at("2024-01-04T09:00"));
    }

    #[test]
    fn test_exclusions_are_case_insensitive() {
        let options = TimelineOptions::with_excluded(["backlog", " CLOSED "]);
        assert!(options.is_excluded("Backlog"));
        assert!(options.is_excluded("Closed"));
        assert!(!options.is_excluded("Testing"));
    }

    #[test]
    fn test_non_status_events_are_ignored() {
        let mut events = analyze_testing_history();
        events.insert(1, field_change("2024-01-03T09:00", "assignee", "alice", "bob"));
        let ticket = make_ticket_with_events("PRJ-9", "Alice", events);
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Testing"]);
    }

    #[test]
    fn test_no_events_yields_empty_timeline() {
        let ticket = make_ticket("PRJ-10", "Alice");
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_assignee_is_an_error() {
        let mut ticket = make_ticket_with_events("PRJ-11", "Alice", analyze_testing_history());
        ticket.assignee = None;
        let err = build(&ticket, &TimelineOptions::default(), now()).unwrap_err();
        assert_eq!(
            err,
            TicketError::MissingAssignee {
                key: "PRJ-11".to_string()
            }
        );
        assert_eq!(err.key(), "PRJ-11");
    }

    #[test]
    fn test_no_op_transition_from_another_status_is_a_mismatch() {
        let ticket = make_ticket_with_events(
            "PRJ-13",
            "Alice",
            vec![
                status_change("2024-01-02T09:00", "Backlog", "Analyze"),
                status_change("2024-01-03T09:00", "Review", "Review"),
            ],
        );
        let err = build(&ticket, &TimelineOptions::default(), now()).unwrap_err();
        assert!(matches!(err, TicketError::MalformedHistory { ref key, .. } if key == "PRJ-13"));

        let mut lenient = TimelineOptions::default();
        lenient.strict = false;
        let set = build(&ticket, &lenient, now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Review"]);
        assert_eq!(set[0].end, Some(at("2024-01-03T09:00")));
    }

    #[test]
    fn test_no_op_transition_is_skipped() {
        let ticket = make_ticket_with_events(
            "PRJ-12",
            "Alice",
            vec![
                status_change("2024-01-02T09:00", "Backlog", "Analyze"),
                status_change("2024-01-03T09:00", "Analyze", "Analyze"),
                status_change("2024-01-04T09:00", "Analyze", "Testing"),
            ],
        );
        let set = build(&ticket, &TimelineOptions::default(), now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Testing"]);
        assert_eq!(set[0].start, at("2024-01-02T09:00"));
        assert_eq!(set[0].end, Some(at("2024-01-04T09:00")));
    }

    #[test]
    fn test_out_of_order_history_is_rejected() {
        let ticket = make_ticket_with_events(
            "PRJ-13",
            "Alice",
            vec![
                status_change("2024-01-05T09:00", "Backlog", "Analyze"),
                status_change("2024-01-02T09:00", "Analyze", "Testing"),
            ],
        );
        let err = build(&ticket, &TimelineOptions::default(), now()).unwrap_err();
        assert!(matches!(err, TicketError::MalformedHistory { .. }));
    }

    #[test]
    fn test_mismatched_transition_strict() {
        let ticket = make_ticket_with_events(
            "PRJ-14",
            "Alice",
            vec![
                status_change("2024-01-02T09:00", "Backlog", "Analyze"),
                status_change("2024-01-03T09:00", "Review", "Testing"),
            ],
        );
        let err = build(&ticket, &TimelineOptions::default(), now()).unwrap_err();
        assert!(err.to_string().contains("Review"));
    }

    #[test]
    fn test_mismatched_transition_lenient_never_overlaps() {
        let ticket = make_ticket_with_events(
            "PRJ-14",
            "Alice",
            vec![
                status_change("2024-01-02T09:00", "Backlog", "Analyze"),
                status_change("2024-01-03T09:00", "Review", "Testing"),
            ],
        );
        let mut options = TimelineOptions::default();
        options.strict = false;
        let set = build(&ticket, &options, now()).unwrap();
        assert_eq!(statuses(&set), vec!["Analyze", "Testing"]);
        assert_eq!(set[0].end, Some(set[1].start));
    }

    #[test]
    fn test_missing_target_status_is_malformed() {
        let mut event = status_change("2024-01-02T09:00", "Backlog", "Analyze");
        event.to = None;
        let ticket = make_ticket_with_events("PRJ-15", "Alice", vec![event]);
        let err = build(&ticket, &TimelineOptions::default(), now()).unwrap_err();
        assert!(matches!(err, TicketError::MalformedHistory { ref key, .. } if key == "PRJ-15"));
    }

    #[test]
    fn test_closed_count_bounded_by_events() {
        let mut ticket = make_ticket_with_events("PRJ-16", "Alice", analyze_testing_history());
        ticket.created = Some(at("2023-12-01T00:00"));
        for excluded in [vec![], vec!["Backlog"], vec!["Backlog", "Closed"]] {
            let options = TimelineOptions::with_excluded(excluded);
            let set = build(&ticket, &options, now()).unwrap();
            let closed = set.iter().filter(|s| s.is_closed()).count();
            assert!(closed <= ticket.status_events().count() + 1);
            assert!(set.iter().all(|s| s.end.is_some_and(|end| s.start <= end)));
        }
    }

    #[test]
    fn test_build_is_idempotent_apart_from_now() {
        let ticket = make_ticket_with_events(
            "PRJ-17",
            "Alice",
            vec![
                status_change("2024-01-02T09:00", "Backlog", "Analyze"),
                status_change("2024-01-05T14:30", "Analyze", "Testing"),
            ],
        );
        let options = TimelineOptions::default();
        let first = build(&ticket, &options, at("2024-02-01T00:00")).unwrap();
        let second = build(&ticket, &options, at("2024-02-09T00:00")).unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(first[0], second[0]);
        let (a, b) = (&first[1], &second[1]);
        assert_eq!((&a.status, a.start), (&b.status, b.start));
        assert_ne!(a.end, b.end);
    }
}
