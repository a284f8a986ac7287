use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use jira_gantt::chart::OutputFormat;
use jira_gantt::config::Config;

mod commands;

use commands::SourceArgs;

#[derive(Parser)]
#[command(name = "jgantt")]
#[command(about = "Plot per-assignee Gantt charts from Jira status history")]
#[command(version)]
struct Cli {
    /// Path to the project config (default: ./jgantt.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON for machine consumption
    #[arg(long, global = true)]
    json: bool,

    /// Log debug details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct status timelines and render the Gantt chart
    Chart {
        #[command(flatten)]
        source: SourceArgs,

        /// Statuses that never start a bar (default: chart.excluded_statuses, else Backlog,Closed)
        #[arg(long, short = 'x', value_delimiter = ',', num_args = 1..)]
        exclude: Option<Vec<String>>,

        /// Output format: mermaid, ascii, json, yaml
        #[arg(long, short = 'f')]
        format: Option<OutputFormat>,

        /// Write to a file instead of stdout (.svg/.png/.pdf are rendered with mmdc)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Chart title (default: the filter expression)
        #[arg(long)]
        title: Option<String>,

        /// Omit the today marker and current-month band
        #[arg(long)]
        no_highlight: bool,

        /// Close mismatched transitions instead of skipping the ticket
        #[arg(long)]
        lenient: bool,

        /// Don't open the initial status at the ticket's creation time
        #[arg(long)]
        no_seed: bool,
    },

    /// List assignees (identity and display name) of matching tickets
    Users {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Fetch matching tickets and save them for offline use with --input
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// Where to write the issue dump
        #[arg(long, short = 's')]
        save: PathBuf,
    },

    /// View or initialize configuration
    Config {
        /// Show current configuration (the default)
        #[arg(long, conflicts_with_all = ["init", "jira"])]
        show: bool,

        /// Write a default config file
        #[arg(long, conflicts_with = "jira")]
        init: bool,

        /// Show Jira connection settings from ~/.config/jgantt/jira.toml
        #[arg(long)]
        jira: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("JGANTT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "jira_gantt=debug,jgantt=debug,warn"
        } else {
            "warn"
        })
    });

    let format = env::var("JGANTT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(
                    fmt::layer()
                        .compact()
                        .without_time()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = Config::resolve_path(cli.config.as_deref());

    match cli.command {
        Commands::Chart {
            source,
            exclude,
            format,
            output,
            title,
            no_highlight,
            lenient,
            no_seed,
        } => commands::chart::run(
            &config_path,
            &source,
            commands::chart::ChartOptions {
                format,
                output,
                exclude,
                no_highlight,
                lenient,
                no_seed,
                title,
            },
            cli.json,
        ),
        Commands::Users { source } => commands::users::run(&config_path, &source, cli.json),
        Commands::Fetch { source, save } => commands::fetch::run(&config_path, &source, &save),
        Commands::Config { show, init, jira } => match (show, init, jira) {
            (_, true, _) => commands::config_cmd::init(&config_path),
            (_, _, true) => commands::config_cmd::show_jira(cli.json),
            (true, _, _) | (false, false, false) => {
                commands::config_cmd::show(&config_path, cli.json)
            }
        },
    }
}
