pub mod aggregate;
pub mod chart;
pub mod config;
pub mod jira;
pub mod planned;
pub mod ticket;
pub mod timeline;

#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

pub use aggregate::{Reconstruction, SkippedTicket, aggregate, reconstruct, user_index};
pub use chart::{ChartRow, OutputFormat, RenderOptions, render};
pub use config::{Config, FetchConfig, FieldsConfig, JiraConfig};
pub use jira::{
    Credentials, FetchError, FetchOptions, FetchOutcome, FileSource, IssueSource, JiraClient,
    fetch_issues, fetch_tickets,
};
pub use planned::{PLANNED_STATUS, merge_planned, prepend_planned};
pub use ticket::{Assignee, ChangeEvent, Ticket};
pub use timeline::{Segment, TicketError, TimelineOptions, TimelineSet, build};
