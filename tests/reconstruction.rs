//! Library-level tests of the reconstruction pipeline: validated tickets in,
//! chart rows out.

use chrono::NaiveDate;
use jira_gantt::chart::{OutputFormat, RenderOptions, render, rows};
use jira_gantt::test_helpers::{
    analyze_testing_history, at, make_ticket, make_ticket_with_events, status_change,
};
use jira_gantt::{PLANNED_STATUS, TimelineOptions, build, reconstruct};

fn now() -> chrono::DateTime<chrono::Utc> {
    at("2024-02-01T00:00")
}

#[test]
fn test_rows_are_grouped_by_assignee_in_ticket_order() {
    let tickets = vec![
        make_ticket_with_events("OPS-1", "Bob", analyze_testing_history()),
        make_ticket_with_events("OPS-2", "Alice", analyze_testing_history()),
        make_ticket_with_events(
            "OPS-3",
            "Bob",
            vec![status_change("2024-01-20T10:00", "Backlog", "In Progress")],
        ),
    ];

    let result = reconstruct(&tickets, &TimelineOptions::default(), now());
    assert!(result.skipped.is_empty());

    let order: Vec<(String, String)> = rows(&result.segments)
        .into_iter()
        .map(|r| (r.assignee, r.status))
        .collect();
    let expected = [
        ("Alice", "Analyze"),
        ("Alice", "Testing"),
        ("Bob", "Analyze"),
        ("Bob", "Testing"),
        ("Bob", "In Progress"),
    ];
    assert_eq!(
        order,
        expected
            .iter()
            .map(|(a, s)| (a.to_string(), s.to_string()))
            .collect::<Vec<_>>()
    );

    // The ticket still in progress runs until "now"
    let last = result.segments.last().unwrap();
    assert_eq!(last.end, Some(now()));
}

#[test]
fn test_planned_bar_precedes_history_and_uses_midnight() {
    let mut ticket = make_ticket_with_events("OPS-4", "Carol", analyze_testing_history());
    ticket.planned_start = NaiveDate::from_ymd_opt(2024, 1, 1);
    ticket.planned_end = NaiveDate::from_ymd_opt(2024, 1, 15);

    let result = reconstruct(&[ticket], &TimelineOptions::default(), now());
    let table = rows(&result.segments);
    assert_eq!(table.len(), 3);
    assert_eq!(table[0].status, PLANNED_STATUS);
    assert_eq!(table[0].start, "2024-01-01T00:00");
    assert_eq!(table[0].end, "2024-01-15T00:00");
    assert_eq!(table[1].start, "2024-01-02T09:00");
}

#[test]
fn test_segment_count_is_bounded_by_status_events() {
    let histories = vec![
        analyze_testing_history(),
        vec![],
        vec![status_change("2024-01-02T09:00", "Backlog", "Analyze")],
    ];
    for events in histories {
        let count = events.len();
        let mut ticket = make_ticket_with_events("OPS-5", "Dana", events);
        ticket.created = Some(at("2024-01-01T08:00"));
        let set = build(&ticket, &TimelineOptions::with_excluded(Vec::<String>::new()), now())
            .unwrap();
        assert!(set.len() <= count + 1, "{} segments for {} events", set.len(), count);
        assert!(set.iter().all(|s| s.end.is_some_and(|end| end >= s.start)));
    }
}

#[test]
fn test_rebuild_differs_only_in_open_segment_end() {
    let ticket = make_ticket_with_events(
        "OPS-6",
        "Erin",
        vec![
            status_change("2024-01-02T09:00", "Backlog", "Analyze"),
            status_change("2024-01-03T09:00", "Analyze", "Testing"),
        ],
    );
    let options = TimelineOptions::default();
    let first = build(&ticket, &options, now()).unwrap();
    let later = build(&ticket, &options, at("2024-03-01T00:00")).unwrap();

    assert_eq!(first[0], later[0]);
    assert_eq!(first[1].start, later[1].start);
    assert_eq!(first[1].end, Some(now()));
    assert_eq!(later[1].end, Some(at("2024-03-01T00:00")));
}

#[test]
fn test_unassigned_ticket_is_reported_and_others_render() {
    let mut orphan = make_ticket_with_events("OPS-7", "Nobody", analyze_testing_history());
    orphan.assignee = None;
    let tickets = vec![orphan, make_ticket("OPS-8", "Frank")];

    let result = reconstruct(&tickets, &TimelineOptions::default(), now());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].key, "OPS-7");
    assert!(result.segments.is_empty());

    let mut options = RenderOptions::new(now());
    options.highlight = false;
    let chart = render(&result.segments, OutputFormat::Mermaid, &options).unwrap();
    assert!(chart.starts_with("gantt"));
    assert!(!chart.contains("section"));
}
