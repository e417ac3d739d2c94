use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Duration, Utc};
use taskdeck_shared::User;
use unicode_width::UnicodeWidthStr;

use crate::bulk::BatchReport;
use crate::config::Config;
use crate::datetime::format_local_date;
use crate::stats::{ExportStats, TaskStats};
use crate::task::{Priority, Task, Todo, is_due_soon, is_overdue, status_label};
use crate::templates::TaskTemplate;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

/// A task plus its position in the collection, which is what row numbers
/// on the command line refer to.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub number: usize,
    pub task: &'a Task,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, rows, now))]
    pub fn write_task_table<W: Write>(
        &self,
        out: W,
        rows: &[Row<'_>],
        now: DateTime<Utc>,
        due_soon_window: Duration,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Title".to_string(),
            "ID".to_string(),
        ];

        let mut table = Vec::with_capacity(rows.len());
        for row in rows {
            let task = row.task;
            let number = self.paint(&row.number.to_string(), "33");
            let done = if task.completed { "[x]" } else { "[ ]" }.to_string();
            let priority = match task.priority {
                Priority::High => self.paint(task.priority.label(), "31"),
                _ => task.priority.label().to_string(),
            };

            let mut due = task.due_date.map(format_local_date).unwrap_or_default();
            if let Some(time) = task.due_time.as_deref() {
                due = format!("{due} {time}");
            }
            let due = if is_overdue(task, now) {
                self.paint(&due, "31")
            } else if is_due_soon(task, now, due_soon_window) {
                self.paint(&due, "33")
            } else {
                due
            };

            let title = if task.completed {
                self.paint(&task.title, "2")
            } else {
                task.title.clone()
            };

            table.push(vec![number, done, priority, due, title, task.id.clone()]);
        }

        write_table(out, headers, table)
    }

    pub fn print_task_table(
        &self,
        rows: &[Row<'_>],
        now: DateTime<Utc>,
        due_soon_window: Duration,
    ) -> anyhow::Result<()> {
        self.write_task_table(io::stdout().lock(), rows, now, due_soon_window)
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "status      {}", status_label(task.completed))?;
        writeln!(out, "priority    {}", task.priority.label())?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_local_date(due))?;
        }
        if let Some(time) = task.due_time.as_deref() {
            writeln!(out, "due time    {time}")?;
        }
        writeln!(out, "created     {}", task.created_at.format("%Y-%m-%dT%H:%M:%SZ"))?;
        if let Some(updated) = task.updated_at {
            writeln!(out, "updated     {}", updated.format("%Y-%m-%dT%H:%M:%SZ"))?;
        }
        if !task.description.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", task.description)?;
        }

        Ok(())
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(out, "Total           {}", stats.total)?;
        writeln!(out, "Completed       {}", stats.completed)?;
        writeln!(out, "Pending         {}", stats.pending)?;
        writeln!(
            out,
            "Overdue         {}",
            self.paint_count(stats.overdue, "31")
        )?;
        writeln!(
            out,
            "Due soon        {}",
            self.paint_count(stats.due_soon, "33")
        )?;
        writeln!(out, "High priority   {}", stats.high_priority)?;
        writeln!(out, "Completion      {}%", stats.completion_rate)?;
        Ok(())
    }

    pub fn print_stats(&self, stats: &TaskStats) -> anyhow::Result<()> {
        self.write_stats(io::stdout().lock(), stats)
    }

    /// Export summaries go to stderr so stdout stays the exported document.
    pub fn print_export_stats(&self, stats: &ExportStats) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(
            err,
            "exporting {} tasks ({} completed, {} pending; high {}, medium {}, low {}; {} overdue)",
            stats.total,
            stats.completed,
            stats.pending,
            stats.high,
            stats.medium,
            stats.low,
            stats.overdue
        )?;
        Ok(())
    }

    pub fn write_todos<W: Write>(&self, out: W, todos: &[Todo]) -> anyhow::Result<()> {
        let headers = vec!["#".to_string(), "Done".to_string(), "Text".to_string()];
        let rows = todos
            .iter()
            .enumerate()
            .map(|(idx, todo)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "35"),
                    if todo.completed { "[x]" } else { "[ ]" }.to_string(),
                    todo.text.clone(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn print_todos(&self, todos: &[Todo]) -> anyhow::Result<()> {
        self.write_todos(io::stdout().lock(), todos)
    }

    pub fn print_user(&self, user: &User) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{} <{}>", user.name, user.email)?;
        if let Some(created) = user.created_at {
            writeln!(out, "member since {}", format_local_date(created))?;
        }
        Ok(())
    }

    pub fn print_templates(&self, templates: &[TaskTemplate]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for template in templates {
            writeln!(
                out,
                "{}  {} ({})",
                self.paint(template.id, "36"),
                template.summary,
                template.category
            )?;
            for variation in template.variations {
                writeln!(
                    out,
                    "    - {} [{}]",
                    variation.name,
                    variation.priority.as_str()
                )?;
            }
        }
        Ok(())
    }

    pub fn print_batch_report(&self, action: &str, report: &BatchReport) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "{action}: {} of {} succeeded",
            report.succeeded.len(),
            report.total()
        )?;
        for (id, err) in &report.failed {
            writeln!(out, "  {} {id}: {}", self.paint("failed", "31"), err.message())?;
        }
        Ok(())
    }

    pub fn celebrate(&self, task: &Task) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{} {}", self.paint("Nice work!", "32"), task.title);
    }

    fn paint_count(&self, count: usize, code: &str) -> String {
        if count == 0 {
            return count.to_string();
        }
        self.paint(&count.to_string(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let last = column_count.saturating_sub(1);
    for (idx, header) in headers.iter().enumerate() {
        if idx == last {
            write!(writer, "{header}")?;
        } else {
            write!(writer, "{:width$} ", header, width = widths[idx])?;
        }
    }
    writeln!(writer)?;

    for (idx, width) in widths.iter().enumerate() {
        write!(writer, "{:-<width$}", "", width = *width)?;
        if idx != last {
            write!(writer, " ")?;
        }
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            if idx == last {
                write!(writer, "{cell}")?;
                continue;
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
