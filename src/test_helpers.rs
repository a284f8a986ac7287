use crate::ticket::{Assignee, ChangeEvent, Ticket};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a minute-precision UTC timestamp such as `2024-01-02T09:30`.
pub fn at(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .unwrap_or_else(|e| panic!("bad test timestamp {:?}: {}", s, e))
        .and_utc()
}

/// A status transition at the given minute-precision timestamp.
pub fn status_change(when: &str, from: &str, to: &str) -> ChangeEvent {
    ChangeEvent {
        at: at(when),
        field: "status".to_string(),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
    }
}

/// A non-status changelog entry, ignored by reconstruction.
pub fn field_change(when: &str, field: &str, from: &str, to: &str) -> ChangeEvent {
    ChangeEvent {
        at: at(when),
        field: field.to_string(),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
    }
}

/// Create a ticket assigned to `assignee` (used as both identity and display name)
/// with all other fields defaulted.
pub fn make_ticket(key: &str, assignee: &str) -> Ticket {
    Ticket {
        key: key.to_string(),
        summary: format!("Summary of {}", key),
        assignee: Some(Assignee {
            name: assignee.to_lowercase(),
            display_name: assignee.to_string(),
        }),
        created: None,
        planned_start: None,
        planned_end: None,
        events: vec![],
    }
}

/// Create a ticket with the given status history.
pub fn make_ticket_with_events(key: &str, assignee: &str, events: Vec<ChangeEvent>) -> Ticket {
    Ticket {
        events,
        ..make_ticket(key, assignee)
    }
}

/// The three-step history used throughout the tests:
/// Backlog -> Analyze -> Testing -> Closed.
pub fn analyze_testing_history() -> Vec<ChangeEvent> {
    vec![
        status_change("2024-01-02T09:00", "Backlog", "Analyze"),
        status_change("2024-01-05T14:30", "Analyze", "Testing"),
        status_change("2024-01-08T11:15", "Testing", "Closed"),
    ]
}
