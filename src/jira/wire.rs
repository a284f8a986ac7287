//! Wire records from the Jira REST API and their validation into [`Ticket`]s.
//!
//! Only the fields the pipeline consumes are modelled. Values whose type
//! varies across Jira versions (or is simply wrong) are kept as raw JSON and
//! checked in [`RawIssue::to_ticket`], so a badly shaped issue surfaces as a
//! per-ticket [`TicketError::MalformedHistory`] instead of failing the page.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::FieldsConfig;
use crate::ticket::{Assignee, ChangeEvent, Ticket};
use crate::timeline::TicketError;

/// One page of `/rest/api/2/search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub max_results: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    #[serde(default)]
    pub fields: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<RawChangelog>,
}

/// Changelog embedded by `expand=changelog`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChangelog {
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub max_results: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub histories: Vec<RawHistory>,
}

impl RawChangelog {
    /// The embedded changelog holds fewer histories than the server reports
    pub fn is_truncated(&self) -> bool {
        self.total > self.histories.len() as u64
    }
}

/// One page of `/rest/api/2/issue/{key}/changelog`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogPage {
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub max_results: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default, alias = "histories")]
    pub values: Vec<RawHistory>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Value>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Value>,
    #[serde(rename = "fromString", default, skip_serializing_if = "Option::is_none")]
    pub from_value: Option<Value>,
    #[serde(rename = "toString", default, skip_serializing_if = "Option::is_none")]
    pub to_value: Option<Value>,
}

/// Key used in reports for an issue that arrived without a usable one
const UNKNOWN_KEY: &str = "<no key>";

/// Parse a Jira timestamp (`2024-01-02T10:15:30.000+0000`), RFC 3339, or a
/// bare minute-precision UTC timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

/// Parse a date field. Accepts a plain date or any timestamp [`parse_timestamp`] accepts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|dt| dt.date_naive()))
}

/// `None` for absent or null, the text for a string, `Err` for anything else
fn as_text(value: Option<&Value>) -> Result<Option<&str>, &Value> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(other),
    }
}

impl RawIssue {
    /// The issue key, if it is a string
    pub fn key(&self) -> Option<&str> {
        self.key.as_ref().and_then(Value::as_str)
    }

    pub fn key_or_placeholder(&self) -> &str {
        self.key().unwrap_or(UNKNOWN_KEY)
    }

    /// Validate into a fixed-shape ticket.
    pub fn to_ticket(&self, fields: &FieldsConfig) -> Result<Ticket, TicketError> {
        let key = match as_text(self.key.as_ref()).map(|k| k.map(str::trim)) {
            Ok(Some(key)) if !key.is_empty() => key.to_string(),
            Ok(_) => return Err(TicketError::malformed(UNKNOWN_KEY, "issue has no key")),
            Err(other) => {
                return Err(TicketError::malformed(
                    UNKNOWN_KEY,
                    format!("issue key is not a string: {}", other),
                ));
            }
        };
        let malformed = |reason: String| TicketError::malformed(&key, reason);

        match &self.fields {
            Value::Object(_) | Value::Null => {}
            other => return Err(malformed(format!("fields is not an object: {}", other))),
        }

        let summary = as_text(self.fields.get("summary"))
            .map_err(|other| malformed(format!("summary is not a string: {}", other)))?
            .unwrap_or_default()
            .to_string();

        let assignee = match self.fields.get("assignee") {
            None | Some(Value::Null) => None,
            Some(Value::Object(user)) => Some(parse_assignee(user).ok_or_else(|| {
                malformed("assignee has neither name nor accountId".to_string())
            })?),
            Some(other) => return Err(malformed(format!("assignee is not an object: {}", other))),
        };

        let created = optional_str(&self.fields, "created")
            .map_err(&malformed)?
            .map(|raw| {
                parse_timestamp(raw).ok_or_else(|| malformed(format!("bad created timestamp {:?}", raw)))
            })
            .transpose()?;

        let planned_start = planned_date(&self.fields, &fields.planned_start).map_err(&malformed)?;
        let planned_end = planned_date(&self.fields, &fields.planned_end).map_err(&malformed)?;

        let mut events = Vec::new();
        for history in self.changelog.iter().flat_map(|c| c.histories.iter()) {
            let raw_at = as_text(history.created.as_ref())
                .map_err(|other| malformed(format!("changelog timestamp is not a string: {}", other)))?
                .ok_or_else(|| malformed("changelog entry has no timestamp".to_string()))?;
            let at = parse_timestamp(raw_at)
                .ok_or_else(|| malformed(format!("bad changelog timestamp {:?}", raw_at)))?;
            for item in &history.items {
                events.push(item.to_event(at, raw_at).map_err(&malformed)?);
            }
        }

        Ok(Ticket {
            key,
            summary,
            assignee,
            created,
            planned_start,
            planned_end,
            events,
        })
    }
}

impl RawItem {
    /// Status values must be strings. Other fields carry whatever Jira
    /// reports, rendered as text when it isn't one.
    fn to_event(&self, at: DateTime<Utc>, raw_at: &str) -> Result<ChangeEvent, String> {
        let field = as_text(self.field.as_ref())
            .map_err(|other| format!("changelog field name at {} is not a string: {}", raw_at, other))?
            .ok_or_else(|| format!("changelog item at {} has no field", raw_at))?
            .to_string();
        let mut event = ChangeEvent {
            at,
            field,
            from: None,
            to: None,
        };
        let strict = event.is_status();
        let value = |raw: Option<&Value>| -> Result<Option<String>, String> {
            match as_text(raw) {
                Ok(text) => Ok(text.map(str::to_string)),
                Err(other) if strict => Err(format!(
                    "non-string status value at {}: {}",
                    raw_at, other
                )),
                Err(other) => Ok(Some(other.to_string())),
            }
        };
        event.from = value(self.from_value.as_ref())?;
        event.to = value(self.to_value.as_ref())?;
        Ok(event)
    }
}

fn parse_assignee(user: &Map<String, Value>) -> Option<Assignee> {
    let identity = ["name", "accountId", "key", "emailAddress"]
        .iter()
        .find_map(|k| user.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))?;
    let display_name = user
        .get("displayName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(identity);
    Some(Assignee {
        name: identity.to_string(),
        display_name: display_name.to_string(),
    })
}

fn optional_str<'a>(fields: &'a Value, name: &str) -> Result<Option<&'a str>, String> {
    match as_text(fields.get(name)) {
        Ok(Some(s)) if s.trim().is_empty() => Ok(None),
        Ok(text) => Ok(text),
        Err(other) => Err(format!("{} is not a string: {}", name, other)),
    }
}

fn planned_date(fields: &Value, name: &str) -> Result<Option<NaiveDate>, String> {
    if name.is_empty() {
        return Ok(None);
    }
    optional_str(fields, name)?
        .map(|raw| parse_date(raw).ok_or_else(|| format!("bad date in {}: {:?}", name, raw)))
        .transpose()
}
