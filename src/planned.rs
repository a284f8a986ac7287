//! Planned-schedule segments
//!
//! A ticket carrying both a planned start and a planned end gets one extra
//! segment ahead of its reconstructed history. It is informational only and
//! never takes part in status matching.

use chrono::{DateTime, NaiveDate, Utc};

use crate::ticket::Ticket;
use crate::timeline::{Segment, TicketError, TimelineSet};

/// Status label of the synthetic planned segment
pub const PLANNED_STATUS: &str = "Planned";

/// Midnight UTC on the given date
fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Build the planned segment for a ticket, if both planned dates are set.
pub fn merge_planned(ticket: &Ticket) -> Result<Option<Segment>, TicketError> {
    let (Some(start), Some(end)) = (ticket.planned_start, ticket.planned_end) else {
        return Ok(None);
    };
    let assignee = ticket
        .assignee
        .as_ref()
        .ok_or_else(|| TicketError::MissingAssignee {
            key: ticket.key.clone(),
        })?;
    if end < start {
        return Err(TicketError::malformed(
            &ticket.key,
            format!("planned end {} is before planned start {}", end, start),
        ));
    }

    Ok(Some(Segment {
        assignee: assignee.display_name.clone(),
        task: ticket.task_label(),
        status: PLANNED_STATUS.to_string(),
        start: day_start(start),
        end: Some(day_start(end)),
    }))
}

/// Put the planned segment (if any) in front of the reconstructed timeline.
pub fn prepend_planned(ticket: &Ticket, timeline: TimelineSet) -> Result<TimelineSet, TicketError> {
    match merge_planned(ticket)? {
        Some(planned) => {
            let mut merged = Vec::with_capacity(timeline.len() + 1);
            merged.push(planned);
            merged.extend(timeline);
            Ok(merged)
        }
        None => Ok(timeline),
    }
}
