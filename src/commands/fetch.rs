use anyhow::{Context, Result};
use std::path::Path;

use jira_gantt::config::Config;
use jira_gantt::jira::{save_dump, validate};

use super::{SourceArgs, load_issues};

/// Fetch matching issues and save them for offline charting
pub fn run(config_path: &Path, source: &SourceArgs, save: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let issues = load_issues(source, &config)?;

    save_dump(save, &issues).with_context(|| format!("Failed to save {}", save.display()))?;

    let outcome = validate(&issues, &config.fields);
    println!("Saved {} issues to {}", issues.len(), save.display());
    if !outcome.rejected.is_empty() {
        println!(
            "  {} of them failed validation and will be skipped when charting",
            outcome.rejected.len()
        );
    }

    Ok(())
}
