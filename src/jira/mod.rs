//! Jira issue fetching
//!
//! Provides:
//! - [`JiraClient`]: blocking HTTP client for the REST search and changelog endpoints
//! - [`FileSource`]: offline source backed by a saved search dump
//! - [`fetch_issues`] / [`fetch_tickets`]: pagination over any [`IssueSource`]
//!
//! Fetch failures are fatal and surface unmodified. Individual issues that
//! fail validation are returned alongside the good ones instead.

pub mod wire;

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::{FetchConfig, FieldsConfig};
use crate::ticket::Ticket;
use crate::timeline::TicketError;

pub use wire::{ChangelogPage, RawChangelog, RawHistory, RawIssue, RawItem, SearchPage};

/// Fatal fetch failure
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Authentication failed (HTTP {status}). Check the Jira credentials.")]
    Auth { status: u16 },
    #[error("Jira rejected the query: {0}")]
    Query(String),
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Stopped after {0} pages; narrow the query or raise fetch.max_pages")]
    PageLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can answer paged issue searches
pub trait IssueSource {
    fn search(&self, jql: &str, start_at: u64, max_results: u64) -> Result<SearchPage, FetchError>;

    fn changelog(
        &self,
        key: &str,
        start_at: u64,
        max_results: u64,
    ) -> Result<ChangelogPage, FetchError>;
}

/// Credentials sent with every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Parse the `username:secret` form used on the command line.
    pub fn from_pair(pair: &str) -> Option<Self> {
        let (username, password) = pair.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Blocking client for one Jira server, scoped to a single run
pub struct JiraClient {
    http: HttpClient,
    base_url: String,
    credentials: Credentials,
    /// Comma-separated `fields` parameter for search requests
    requested_fields: String,
}

impl JiraClient {
    pub fn new(
        server: &str,
        credentials: Credentials,
        fetch: &FetchConfig,
        fields: &FieldsConfig,
    ) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_server(server),
            credentials,
            requested_fields: requested_fields(fields),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tracing::debug!(url, "GET");
        let request = self.http.get(url).header(ACCEPT, "application/json");
        let request = match &self.credentials {
            Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Anonymous => request,
        };

        let resp = request.send()?;
        let status = resp.status();
        let body = if status.is_success() {
            resp.text()?
        } else {
            resp.text().unwrap_or_default()
        };

        classify(status.as_u16(), url, &body)?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Map a response status onto the fetch error it stands for
fn classify(status: u16, url: &str, body: &str) -> Result<(), FetchError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(FetchError::Auth { status }),
        400 => Err(FetchError::Query(error_messages(body))),
        _ => Err(FetchError::Http {
            status,
            url: url.to_string(),
            body: body.trim().to_string(),
        }),
    }
}

impl IssueSource for JiraClient {
    fn search(&self, jql: &str, start_at: u64, max_results: u64) -> Result<SearchPage, FetchError> {
        let url = format!(
            "{}/rest/api/2/search?jql={}&startAt={}&maxResults={}&expand=changelog&fields={}",
            self.base_url,
            urlencoding::encode(jql),
            start_at,
            max_results,
            urlencoding::encode(&self.requested_fields)
        );
        self.get(&url)
    }

    fn changelog(
        &self,
        key: &str,
        start_at: u64,
        max_results: u64,
    ) -> Result<ChangelogPage, FetchError> {
        let url = format!(
            "{}/rest/api/2/issue/{}/changelog?startAt={}&maxResults={}",
            self.base_url,
            urlencoding::encode(key),
            start_at,
            max_results
        );
        self.get(&url)
    }
}

/// `jira.example.com` -> `https://jira.example.com`, trailing slashes dropped
fn normalize_server(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}

fn requested_fields(fields: &FieldsConfig) -> String {
    let mut names = vec!["summary", "assignee", "created", "status"];
    for extra in [&fields.planned_start, &fields.planned_end] {
        if !extra.is_empty() && !names.contains(&extra.as_str()) {
            names.push(extra);
        }
    }
    names.join(",")
}

/// Pull `errorMessages` out of a Jira error body, falling back to the raw text
fn error_messages(body: &str) -> String {
    let messages: Vec<String> = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errorMessages").cloned())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    if messages.is_empty() {
        body.trim().to_string()
    } else {
        messages.join("; ")
    }
}

/// Offline source over issues saved by `jgantt fetch --save`.
///
/// Accepts a search response (`{"issues": [...]}`) or a bare array of issues.
/// The JQL is not evaluated; every stored issue matches.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    issues: Vec<RawIssue>,
}

impl FileSource {
    pub fn new(issues: Vec<RawIssue>) -> Self {
        Self { issues }
    }

    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let issues = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            other => serde_json::from_value::<SearchPage>(other)?.issues,
        };
        Ok(Self { issues })
    }
}

impl IssueSource for FileSource {
    fn search(&self, jql: &str, start_at: u64, max_results: u64) -> Result<SearchPage, FetchError> {
        if !jql.is_empty() {
            tracing::debug!(jql, "offline source ignores the query");
        }
        let start = (start_at as usize).min(self.issues.len());
        let end = start.saturating_add(max_results as usize).min(self.issues.len());
        Ok(SearchPage {
            start_at,
            max_results,
            total: self.issues.len() as u64,
            issues: self.issues[start..end].to_vec(),
        })
    }

    fn changelog(
        &self,
        key: &str,
        start_at: u64,
        max_results: u64,
    ) -> Result<ChangelogPage, FetchError> {
        let histories = self
            .issues
            .iter()
            .find(|i| i.key() == Some(key))
            .and_then(|i| i.changelog.as_ref())
            .map(|c| c.histories.as_slice())
            .unwrap_or_default();
        let start = (start_at as usize).min(histories.len());
        let end = start.saturating_add(max_results as usize).min(histories.len());
        Ok(ChangelogPage {
            start_at,
            max_results,
            total: histories.len() as u64,
            values: histories[start..end].to_vec(),
        })
    }
}

/// Paging limits for a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: u64,
    pub max_pages: usize,
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

/// Issues that validated into tickets, plus the ones that didn't
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub tickets: Vec<Ticket>,
    pub rejected: Vec<TicketError>,
}

/// Collect every issue matching `jql`, with complete changelogs.
///
/// Pages are requested while the running offset is below the reported total.
/// The offset advances by the number of issues actually returned, since the
/// server may cap the page size below what was asked for.
pub fn fetch_issues(
    source: &dyn IssueSource,
    jql: &str,
    options: &FetchOptions,
) -> Result<Vec<RawIssue>, FetchError> {
    let mut issues = Vec::new();
    let mut offset = 0u64;
    let mut pages = 0usize;

    loop {
        if pages >= options.max_pages {
            return Err(FetchError::PageLimit(pages));
        }
        let page = source.search(jql, offset, options.page_size)?;
        pages += 1;

        let received = page.issues.len() as u64;
        issues.extend(page.issues);
        offset += received;
        tracing::debug!(page = pages, received, offset, total = page.total, "search page");

        if received == 0 || offset >= page.total {
            break;
        }
    }

    for issue in &mut issues {
        complete_changelog(source, issue, options)?;
    }

    tracing::info!(issues = issues.len(), pages, "fetched issues");
    Ok(issues)
}

/// Replace a truncated embedded changelog with the full per-issue history.
fn complete_changelog(
    source: &dyn IssueSource,
    issue: &mut RawIssue,
    options: &FetchOptions,
) -> Result<(), FetchError> {
    let (Some(key), Some(changelog)) = (
        issue.key.as_ref().and_then(Value::as_str),
        issue.changelog.as_mut(),
    ) else {
        return Ok(());
    };
    if !changelog.is_truncated() {
        return Ok(());
    }

    tracing::debug!(
        ticket = key,
        embedded = changelog.histories.len(),
        total = changelog.total,
        "changelog truncated, paging the rest"
    );

    let mut histories = Vec::new();
    let mut offset = 0u64;
    let mut pages = 0usize;
    loop {
        if pages >= options.max_pages {
            return Err(FetchError::PageLimit(pages));
        }
        let page = source.changelog(key, offset, options.page_size)?;
        pages += 1;
        let received = page.values.len() as u64;
        histories.extend(page.values);
        offset += received;
        if received == 0 || offset >= page.total {
            break;
        }
    }

    if histories.len() >= changelog.histories.len() {
        changelog.total = histories.len() as u64;
        changelog.max_results = changelog.total;
        changelog.start_at = 0;
        changelog.histories = histories;
    }
    Ok(())
}

/// Validate raw issues, keeping invalid ones as per-ticket errors.
pub fn validate(issues: &[RawIssue], fields: &FieldsConfig) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    for issue in issues {
        match issue.to_ticket(fields) {
            Ok(ticket) => outcome.tickets.push(ticket),
            Err(err) => {
                tracing::warn!("Rejected {}", err);
                outcome.rejected.push(err);
            }
        }
    }
    outcome
}

/// Fetch and validate in one step.
pub fn fetch_tickets(
    source: &dyn IssueSource,
    jql: &str,
    options: &FetchOptions,
    fields: &FieldsConfig,
) -> Result<FetchOutcome, FetchError> {
    let issues = fetch_issues(source, jql, options)?;
    Ok(validate(&issues, fields))
}

/// Write issues as a search-shaped dump readable by [`FileSource::load`].
pub fn save_dump(path: &Path, issues: &[RawIssue]) -> Result<(), FetchError> {
    let total = issues.len() as u64;
    let page = SearchPage {
        start_at: 0,
        max_results: total,
        total,
        issues: issues.to_vec(),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&page)?)?;
    Ok(())
}
