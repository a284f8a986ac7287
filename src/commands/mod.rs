pub mod chart;
pub mod config_cmd;
pub mod fetch;
pub mod users;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use jira_gantt::config::{Config, JiraConfig};
use jira_gantt::jira::{
    Credentials, FetchOptions, FetchOutcome, FileSource, IssueSource, JiraClient, RawIssue,
    fetch_issues, validate,
};

/// Where issues come from: a live Jira server or a saved dump
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// JQL filter expression
    #[arg(long, conflicts_with = "label")]
    pub jql: Option<String>,

    /// Shorthand for --jql 'labels = "<LABEL>"'
    #[arg(long, short = 'l')]
    pub label: Option<String>,

    /// Read issues from a dump written by `jgantt fetch --save` instead of Jira
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Jira server (e.g. jira.example.com)
    #[arg(long, short = 'j', env = "JIRA_URL")]
    pub jira_url: Option<String>,

    /// Basic auth credentials as username:password
    #[arg(long, short = 'c', env = "JIRA_CREDENTIALS", hide_env_values = true)]
    pub credentials: Option<String>,

    /// Personal access token (bearer auth)
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true, conflicts_with = "credentials")]
    pub token: Option<String>,
}

impl SourceArgs {
    /// The JQL to search with. Required unless reading from a dump.
    pub fn jql(&self) -> Result<String> {
        if let Some(jql) = &self.jql {
            return Ok(jql.clone());
        }
        if let Some(label) = &self.label {
            return Ok(label_jql(label));
        }
        if self.input.is_some() {
            return Ok(String::new());
        }
        anyhow::bail!("No filter given. Pass --jql <expr> or --label <name>.")
    }

    /// Human-readable description of the filter, used as chart title
    pub fn describe(&self) -> Option<String> {
        self.jql
            .clone()
            .or_else(|| self.label.as_ref().map(|l| label_jql(l)))
    }

    fn credentials(&self, jira: &JiraConfig) -> Result<Credentials> {
        if let Some(token) = &self.token {
            return Ok(Credentials::Bearer(token.clone()));
        }
        if let Some(pair) = &self.credentials {
            return Credentials::from_pair(pair)
                .context("--credentials must be in the form username:password");
        }
        if let Some(token) = &jira.token {
            return Ok(Credentials::Bearer(token.clone()));
        }
        if let (Some(username), Some(password)) = (&jira.username, &jira.password) {
            return Ok(Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            });
        }
        tracing::warn!("No Jira credentials configured; sending anonymous requests");
        Ok(Credentials::Anonymous)
    }

    /// Open the issue source for this run
    pub fn open(&self, config: &Config) -> Result<Box<dyn IssueSource>> {
        if let Some(path) = &self.input {
            let source = FileSource::load(path)
                .with_context(|| format!("Failed to load issue dump {}", path.display()))?;
            return Ok(Box::new(source));
        }

        let jira = JiraConfig::load()?;
        let server = self
            .jira_url
            .clone()
            .or_else(|| jira.server.clone())
            .context(
                "No Jira server configured. Pass --jira-url or set server in ~/.config/jgantt/jira.toml",
            )?;
        let credentials = self.credentials(&jira)?;
        let client = JiraClient::new(&server, credentials, &config.fetch, &config.fields)?;
        tracing::info!(server = client.base_url(), "connecting to Jira");
        Ok(Box::new(client))
    }
}

/// JQL matching every issue carrying `label`
pub fn label_jql(label: &str) -> String {
    format!("labels = \"{}\"", label.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Fetch raw issues with complete changelogs
pub fn load_issues(source_args: &SourceArgs, config: &Config) -> Result<Vec<RawIssue>> {
    let jql = source_args.jql()?;
    let source = source_args.open(config)?;
    let issues = fetch_issues(source.as_ref(), &jql, &FetchOptions::from(&config.fetch))?;
    Ok(issues)
}

/// Fetch and validate issues into tickets
pub fn load_tickets(source_args: &SourceArgs, config: &Config) -> Result<FetchOutcome> {
    let issues = load_issues(source_args, config)?;
    Ok(validate(&issues, &config.fields))
}
