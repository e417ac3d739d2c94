use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow, ensure};
use chrono::NaiveDate;

use crate::datetime::format_local_date;
use crate::task::{Task, status_label};

pub const CSV_HEADERS: [&str; 6] = [
    "Title",
    "Description",
    "Priority",
    "Status",
    "Due Date",
    "Created At",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
        }
    }

    pub fn default_filename(self) -> String {
        format!("tasks.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "markdown",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            other => Err(anyhow!("unknown export format: {other} (json, csv, markdown)")),
        }
    }
}

/// Renders `tasks` in the requested format. `today` stamps the Markdown
/// header.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn export(tasks: &[Task], format: ExportFormat, today: NaiveDate) -> anyhow::Result<String> {
    match format {
        ExportFormat::Json => to_json(tasks),
        ExportFormat::Csv => {
            ensure!(!tasks.is_empty(), "No tasks to export");
            to_csv(tasks)
        }
        ExportFormat::Markdown => Ok(to_markdown(tasks, today)),
    }
}

pub fn to_json(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string_pretty(tasks).context("failed to serialize tasks as JSON")
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

/// Quotes a single value the way the CSV export does.
pub fn escape_csv(value: &str) -> anyhow::Result<String> {
    let mut writer = csv_writer();
    writer.write_record([value])?;
    finish_csv(writer)
}

pub fn to_csv(tasks: &[Task]) -> anyhow::Result<String> {
    let mut writer = csv_writer();
    writer.write_record(CSV_HEADERS)?;
    for task in tasks {
        let due = task.due_date.map(format_local_date).unwrap_or_default();
        let created = format_local_date(task.created_at);
        writer.write_record([
            task.title.as_str(),
            task.description.as_str(),
            task.priority.as_str(),
            status_label(task.completed),
            due.as_str(),
            created.as_str(),
        ])?;
    }
    finish_csv(writer)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("failed to flush CSV: {}", err.error()))?;
    let mut text = String::from_utf8(bytes).context("CSV output is not UTF-8")?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

pub fn to_markdown(tasks: &[Task], today: NaiveDate) -> String {
    let mut blocks = vec![
        "# My Tasks\n".to_string(),
        format!("*Exported on {}*\n", today.format("%Y-%m-%d")),
        "---\n".to_string(),
    ];
    for task in tasks {
        let checkbox = if task.completed { "[x]" } else { "[ ]" };
        let mut block = format!("## {checkbox} {}", task.title);
        if !task.description.is_empty() {
            block.push_str(&format!("\n{}\n", task.description));
        }
        block.push_str(&format!("\n**Priority:** {}", task.priority.as_str()));
        block.push(' ');
        if let Some(due) = task.due_date {
            block.push_str(&format!("**Due:** {}", format_local_date(due)));
        }
        block.push_str("\n---\n");
        blocks.push(block);
    }
    blocks.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use crate::task::fixtures::task;

    #[test]
    fn csv_quotes_only_when_needed() {
        let quoted = |value: &str| escape_csv(value).expect("csv field");
        assert_eq!(quoted("plain"), "plain");
        assert_eq!(quoted("Meeting, \"Q1\""), "\"Meeting, \"\"Q1\"\"\"");
        assert_eq!(quoted("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_has_fixed_columns() {
        let mut t = task("1", "Meeting, \"Q1\"");
        t.priority = Priority::High;
        t.completed = true;
        let csv = to_csv(&[t]).expect("csv");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Title,Description,Priority,Status,Due Date,Created At")
        );
        let row = lines.next().expect("row");
        assert!(row.starts_with("\"Meeting, \"\"Q1\"\"\",,high,Completed,,"));
        assert_eq!(lines.next(), None);
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn csv_refuses_empty_selection() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 17).expect("date");
        assert!(export(&[], ExportFormat::Csv, today).is_err());
        assert_eq!(
            export(&[], ExportFormat::Json, today).expect("json"),
            "[]"
        );
    }

    #[test]
    fn markdown_uses_checkbox_headings() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 17).expect("date");
        let mut done = task("1", "Ship release");
        done.completed = true;
        done.description = "Tag and publish".to_string();
        let open = task("2", "Write notes");

        let md = to_markdown(&[done, open], today);
        assert!(md.starts_with("# My Tasks\n\n*Exported on 2026-02-17*\n\n---\n"));
        assert!(md.contains("## [x] Ship release\nTag and publish\n\n**Priority:** medium "));
        assert!(md.contains("## [ ] Write notes\n**Priority:** medium \n---\n"));
    }

    #[test]
    fn json_is_a_pretty_array() {
        let json = to_json(&[task("1", "Plan week")]).expect("json");
        assert!(json.starts_with("[\n  {"));
        assert!(json.contains("\"_id\": \"1\""));
    }

    #[test]
    fn format_names() {
        assert_eq!("md".parse::<ExportFormat>().expect("md"), ExportFormat::Markdown);
        assert_eq!(ExportFormat::Csv.default_filename(), "tasks.csv");
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
