//! Gantt rendering of aggregated segments
//!
//! Every renderer consumes the same flat, assignee-sorted segment list and
//! the fixed row shape `{assignee, task, status, start, end}`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::planned::PLANNED_STATUS;
use crate::timeline::Segment;

/// Minute-precision timestamp format for exported rows
pub const ROW_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

const MERMAID_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const DEFAULT_WIDTH: usize = 100;
const LABEL_WIDTH: usize = 44;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Output format for the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mermaid,
    Ascii,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mermaid" | "mmd" => Ok(OutputFormat::Mermaid),
            "ascii" | "text" => Ok(OutputFormat::Ascii),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown format: {}. Use 'mermaid', 'ascii', 'json', or 'yaml'.",
                s
            )),
        }
    }
}

/// One exported chart row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRow {
    pub assignee: String,
    pub task: String,
    pub status: String,
    pub start: String,
    pub end: String,
}

impl From<&Segment> for ChartRow {
    fn from(segment: &Segment) -> Self {
        Self {
            assignee: segment.assignee.clone(),
            task: segment.task.clone(),
            status: segment.status.clone(),
            start: segment.start.format(ROW_TIME_FORMAT).to_string(),
            end: segment_end(segment).format(ROW_TIME_FORMAT).to_string(),
        }
    }
}

/// Rendering options
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: Option<String>,
    /// Draw the "today" marker and current-month band
    pub highlight: bool,
    pub now: DateTime<Utc>,
    /// Total line width for ASCII output
    pub width: usize,
}

impl RenderOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            title: None,
            highlight: true,
            now,
            width: DEFAULT_WIDTH,
        }
    }
}

/// First day of the month containing `now`, and first day of the next one
pub fn current_month(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let first = today.with_day(1).unwrap_or(today);
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .unwrap_or(first);
    (first, next)
}

fn segment_end(segment: &Segment) -> DateTime<Utc> {
    segment.end.unwrap_or(segment.start)
}

pub fn rows(segments: &[Segment]) -> Vec<ChartRow> {
    segments.iter().map(ChartRow::from).collect()
}

pub fn render(
    segments: &[Segment],
    format: OutputFormat,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    Ok(match format {
        OutputFormat::Mermaid => generate_mermaid(segments, options),
        OutputFormat::Ascii => generate_ascii(segments, options),
        OutputFormat::Json => serde_json::to_string_pretty(&rows(segments))?,
        OutputFormat::Yaml => serde_yaml::to_string(&rows(segments))?,
    })
}

/// Mermaid task names may not contain `:`, `#` or `;`
fn mermaid_label(text: &str) -> String {
    text.replace(':', " -")
        .replace('#', "")
        .replace(';', ",")
        .trim()
        .to_string()
}

pub fn generate_mermaid(segments: &[Segment], options: &RenderOptions) -> String {
    let mut lines = Vec::new();

    lines.push("gantt".to_string());
    if let Some(title) = &options.title {
        lines.push(format!("    title {}", mermaid_label(title)));
    }
    lines.push("    dateFormat YYYY-MM-DD HH:mm".to_string());
    lines.push("    axisFormat %Y-%m-%d".to_string());
    lines.push(format!(
        "    todayMarker {}",
        if options.highlight { "on" } else { "off" }
    ));

    if options.highlight {
        let (first, next) = current_month(options.now);
        lines.push(String::new());
        lines.push("    section Current month".to_string());
        lines.push(format!(
            "    {} :active, month, {} 00:00, {} 00:00",
            first.format("%B %Y"),
            first.format("%Y-%m-%d"),
            next.format("%Y-%m-%d")
        ));
    }

    let mut current_section: Option<&str> = None;
    for (index, segment) in segments.iter().enumerate() {
        if current_section != Some(segment.assignee.as_str()) {
            lines.push(String::new());
            lines.push(format!("    section {}", mermaid_label(&segment.assignee)));
            current_section = Some(segment.assignee.as_str());
        }

        let tag = if segment.status == PLANNED_STATUS {
            "done, "
        } else {
            ""
        };
        lines.push(format!(
            "    {} ({}) :{}s{}, {}, {}",
            mermaid_label(&segment.task),
            mermaid_label(&segment.status),
            tag,
            index + 1,
            segment.start.format(MERMAID_TIME_FORMAT),
            segment_end(segment).format(MERMAID_TIME_FORMAT)
        ));
    }

    lines.join("\n")
}

/// Time window covered by an ASCII chart, mapped onto `columns` cells
struct Scale {
    lo: DateTime<Utc>,
    span_secs: i64,
    columns: usize,
}

impl Scale {
    fn new(segments: &[Segment], columns: usize) -> Option<Self> {
        let lo = segments.iter().map(|s| s.start).min()?;
        let hi = segments.iter().map(segment_end).max()?;
        Some(Self {
            lo,
            span_secs: (hi - lo).num_seconds().max(60),
            columns: columns.max(1),
        })
    }

    fn hi(&self) -> DateTime<Utc> {
        self.lo + Duration::seconds(self.span_secs)
    }

    /// Column holding `at`, or None when it lies outside the window
    fn column(&self, at: DateTime<Utc>) -> Option<usize> {
        let offset = (at - self.lo).num_seconds();
        if offset < 0 || offset > self.span_secs {
            return None;
        }
        let col = (offset as i128 * self.columns as i128 / self.span_secs as i128) as usize;
        Some(col.min(self.columns - 1))
    }

    fn clamped_column(&self, at: DateTime<Utc>) -> usize {
        if at < self.lo {
            0
        } else {
            self.column(at).unwrap_or(self.columns - 1)
        }
    }
}

fn fit_label(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        format!("{}{}", text, " ".repeat(width - count))
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

/// Background cells: `|` for today, `.` for the current month
fn background(scale: &Scale, options: &RenderOptions) -> Vec<char> {
    let mut cells = vec![' '; scale.columns];
    if !options.highlight {
        return cells;
    }
    let (first, next) = current_month(options.now);
    let month_start = first.and_time(chrono::NaiveTime::MIN).and_utc();
    let month_end = next.and_time(chrono::NaiveTime::MIN).and_utc();
    if month_start <= scale.hi() && month_end >= scale.lo {
        let from = scale.clamped_column(month_start);
        let to = scale.clamped_column(month_end);
        for cell in &mut cells[from..=to] {
            *cell = '.';
        }
    }
    if let Some(col) = scale.column(options.now) {
        cells[col] = '|';
    }
    cells
}

pub fn generate_ascii(segments: &[Segment], options: &RenderOptions) -> String {
    let columns = options.width.saturating_sub(LABEL_WIDTH + 1).max(10);
    let Some(scale) = Scale::new(segments, columns) else {
        return "No segments to chart.".to_string();
    };
    let backdrop = background(&scale, options);

    let mut lines = Vec::new();
    if let Some(title) = &options.title {
        lines.push(title.clone());
    }

    let lo_label = scale.lo.format("%Y-%m-%d").to_string();
    let hi_label = scale.hi().format("%Y-%m-%d").to_string();
    let gap = columns.saturating_sub(lo_label.len() + hi_label.len()).max(1);
    lines.push(format!(
        "{} {}{}{}",
        " ".repeat(LABEL_WIDTH),
        lo_label,
        " ".repeat(gap),
        hi_label
    ));

    let mut current_section: Option<&str> = None;
    for segment in segments {
        if current_section != Some(segment.assignee.as_str()) {
            lines.push(String::new());
            lines.push(segment.assignee.clone());
            current_section = Some(segment.assignee.as_str());
        }

        let fill = if segment.status == PLANNED_STATUS { '=' } else { '#' };
        let from = scale.clamped_column(segment.start);
        let to = scale.clamped_column(segment_end(segment)).max(from);
        let bar: String = backdrop
            .iter()
            .enumerate()
            .map(|(col, &bg)| if (from..=to).contains(&col) { fill } else { bg })
            .collect();

        let label = fit_label(&format!("  {} [{}]", segment.task, segment.status), LABEL_WIDTH);
        lines.push(format!("{} {}", label, bar.trim_end()));
    }

    lines.join("\n")
}
