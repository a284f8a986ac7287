use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Changelog field name carrying status transitions
pub const STATUS_FIELD: &str = "status";

/// The user a ticket is assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Stable user identity (login name or account id)
    pub name: String,
    pub display_name: String,
}

/// One recorded field mutation from a ticket's changelog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub at: DateTime<Utc>,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl ChangeEvent {
    pub fn is_status(&self) -> bool {
        self.field.eq_ignore_ascii_case(STATUS_FIELD)
    }
}

/// A tracked unit of work, validated into a fixed shape at the fetch boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub key: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Assignee>,
    /// Creation timestamp, used to seed the status held before the first transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_end: Option<NaiveDate>,
    /// Changelog entries in upstream (chronological) order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ChangeEvent>,
}

impl Ticket {
    /// Label used for the chart row: key followed by summary
    pub fn task_label(&self) -> String {
        if self.summary.is_empty() {
            self.key.clone()
        } else {
            format!("{} {}", self.key, self.summary)
        }
    }

    /// Status transitions only, in upstream order
    pub fn status_events(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.events.iter().filter(|e| e.is_status())
    }
}
