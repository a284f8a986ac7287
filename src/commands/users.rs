use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use jira_gantt::aggregate::user_index;
use jira_gantt::config::Config;

use super::{SourceArgs, load_tickets};

#[derive(Debug, Serialize)]
struct UserEntry {
    name: String,
    display_name: String,
}

pub fn run(config_path: &Path, source: &SourceArgs, json: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let outcome = load_tickets(source, &config)?;
    let users = user_index(&outcome.tickets);
    let unassigned = outcome
        .tickets
        .iter()
        .filter(|t| t.assignee.is_none())
        .count();

    if json {
        let entries: Vec<UserEntry> = users
            .into_iter()
            .map(|(name, display_name)| UserEntry { name, display_name })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if users.is_empty() {
        println!("No assignees found.");
    } else {
        let width = users.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        println!("Assignees ({}):\n", users.len());
        for (name, display_name) in &users {
            println!("  {:<width$}  {}", name, display_name, width = width);
        }
    }
    if unassigned > 0 {
        println!(
            "\n{} unassigned ticket{}",
            unassigned,
            if unassigned == 1 { "" } else { "s" }
        );
    }

    Ok(())
}
