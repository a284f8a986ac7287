//! Configuration management commands

use anyhow::Result;
use std::path::Path;

use jira_gantt::config::{Config, JiraConfig};

/// Show current configuration
pub fn show(config_path: &Path, json: bool) -> Result<()> {
    let config = Config::load(config_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        "defaults".to_string()
    };
    println!("jgantt configuration ({})", source);
    println!("========================");
    println!();
    println!("[chart]");
    println!("  excluded_statuses = {:?}", config.chart.excluded_statuses);
    if let Some(ref format) = config.chart.format {
        println!("  format = \"{}\"", format);
    }
    println!("  highlight = {}", config.chart.highlight);
    println!();
    println!("[fetch]");
    println!("  page_size = {}", config.fetch.page_size);
    println!("  max_pages = {}", config.fetch.max_pages);
    println!("  timeout_secs = {}", config.fetch.timeout_secs);
    println!();
    println!("[fields]");
    println!("  planned_start = \"{}\"", config.fields.planned_start);
    println!("  planned_end = \"{}\"", config.fields.planned_end);
    println!();
    println!("[timeline]");
    println!("  seed_from_created = {}", config.timeline.seed_from_created);
    println!("  strict = {}", config.timeline.strict);

    Ok(())
}

/// Initialize default config file
pub fn init(config_path: &Path) -> Result<()> {
    if Config::init(config_path)? {
        println!("Created default configuration at {}", config_path.display());
    } else {
        println!("Configuration already exists at {}", config_path.display());
    }
    Ok(())
}

/// Show Jira connection settings, with secrets masked
pub fn show_jira(json: bool) -> Result<()> {
    let config = JiraConfig::load()?;
    let config_path = JiraConfig::config_path()?;

    let mask = |value: &Option<String>| if value.is_some() { "(set)" } else { "(not set)" };

    if json {
        let output = serde_json::json!({
            "config_path": config_path.display().to_string(),
            "server": config.server,
            "username": config.username,
            "password": mask(&config.password),
            "token": mask(&config.token),
            "has_credentials": config.has_credentials(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Jira configuration ({})", config_path.display());
    println!();
    println!("  server   = {}", config.server.as_deref().unwrap_or("(not set)"));
    println!("  username = {}", config.username.as_deref().unwrap_or("(not set)"));
    println!("  password = {}", mask(&config.password));
    println!("  token    = {}", mask(&config.token));
    if !config.has_credentials() {
        println!();
        println!("Credentials incomplete. Pass --jira-url with --credentials or --token,");
        println!("or fill in {}.", config_path.display());
    }

    Ok(())
}
