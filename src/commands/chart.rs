use anyhow::{Context, Result};
use chrono::Utc;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use jira_gantt::aggregate::reconstruct;
use jira_gantt::chart::{OutputFormat, RenderOptions, render};
use jira_gantt::config::Config;

use super::{SourceArgs, load_tickets};

/// Options for the chart command
#[derive(Debug, Default)]
pub struct ChartOptions {
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    /// Overrides chart.excluded_statuses
    pub exclude: Option<Vec<String>>,
    pub no_highlight: bool,
    pub lenient: bool,
    pub no_seed: bool,
    pub title: Option<String>,
}

/// Image formats produced through the Mermaid CLI
fn image_extension(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_lowercase().as_str() {
        "svg" => Some("svg"),
        "png" => Some("png"),
        "pdf" => Some("pdf"),
        _ => None,
    }
}

fn resolve_format(options: &ChartOptions, config: &Config, json: bool) -> Result<OutputFormat> {
    if let Some(path) = &options.output
        && image_extension(path).is_some()
    {
        if options.format.is_some_and(|f| f != OutputFormat::Mermaid) {
            anyhow::bail!("Image output requires --format mermaid");
        }
        return Ok(OutputFormat::Mermaid);
    }
    if let Some(format) = options.format {
        return Ok(format);
    }
    if json {
        return Ok(OutputFormat::Json);
    }
    if let Some(configured) = &config.chart.format {
        return configured
            .parse()
            .map_err(|e: String| anyhow::anyhow!("chart.format: {}", e));
    }
    Ok(if options.output.is_none() && std::io::stdout().is_terminal() {
        OutputFormat::Ascii
    } else {
        OutputFormat::Mermaid
    })
}

fn terminal_width() -> Option<usize> {
    std::env::var("COLUMNS").ok()?.trim().parse().ok()
}

pub fn run(
    config_path: &Path,
    source: &SourceArgs,
    options: ChartOptions,
    json: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let format = resolve_format(&options, &config, json)?;

    let outcome = load_tickets(source, &config)?;

    let mut timeline = config.timeline_options(options.exclude.as_deref());
    if options.lenient {
        timeline.strict = false;
    }
    if options.no_seed {
        timeline.seed_from_created = false;
    }

    let now = Utc::now();
    let result = reconstruct(&outcome.tickets, &timeline, now);

    let skipped = outcome.rejected.len() + result.skipped.len();
    tracing::info!(
        tickets = outcome.tickets.len(),
        segments = result.segments.len(),
        skipped,
        "reconstructed timelines"
    );
    if skipped > 0 {
        eprintln!(
            "Warning: skipped {} ticket{} (see warnings above)",
            skipped,
            if skipped == 1 { "" } else { "s" }
        );
    }

    let mut render_options = RenderOptions::new(now);
    render_options.title = options.title.clone().or_else(|| source.describe());
    render_options.highlight = config.chart.highlight && !options.no_highlight;
    if let Some(width) = terminal_width() {
        render_options.width = width;
    }

    let output = render(&result.segments, format, &render_options)?;

    match options.output {
        Some(ref path) if image_extension(path).is_some() => {
            render_image(&output, path)?;
            println!("Rendered chart to {}", path.display());
        }
        Some(ref path) => {
            std::fs::write(path, format!("{}\n", output))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote chart to {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Render Mermaid text to an image with the Mermaid CLI (`mmdc`)
fn render_image(mermaid: &str, output_path: &Path) -> Result<()> {
    let mut child = Command::new("mmdc")
        .arg("--input")
        .arg("-")
        .arg("--output")
        .arg(output_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .context("Failed to run 'mmdc' command. Is @mermaid-js/mermaid-cli installed?")?;

    if let Some(mut stdin) = child.stdin.take() {
        use std::io::Write;
        stdin
            .write_all(mermaid.as_bytes())
            .context("Failed to write to mmdc stdin")?;
    }

    let status = child.wait().context("Failed to wait for mmdc process")?;

    if !status.success() {
        anyhow::bail!("mmdc command failed with status: {}", status);
    }

    Ok(())
}
