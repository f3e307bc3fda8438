use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::board::Notice;
use crate::config::Config;
use crate::datetime::DueBucket;
use crate::projection::TaskView;
use crate::stats::CategorySummary;
use crate::task::Priority;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self::with_color(color && io::stdout().is_terminal()))
    }

    pub fn with_color(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip_all, fields(rows = view.rows.len()))]
    pub fn print_view<W: Write>(&self, mut out: W, view: &TaskView) -> anyhow::Result<()> {
        if view.is_empty() {
            let message = if view.search.is_empty() {
                "No tasks found"
            } else {
                "No tasks match your search"
            };
            writeln!(out, "{message}")?;
        } else {
            let headers = ["ID", "Pri", "Title", "Category", "Due"]
                .map(str::to_string)
                .to_vec();

            let rows = view
                .rows
                .iter()
                .map(|row| {
                    let task = &row.task;
                    let title = if task.completed {
                        format!("[x] {}", task.title)
                    } else {
                        format!("[ ] {}", task.title)
                    };
                    let due = match &row.due {
                        DueBucket::None => String::new(),
                        bucket if bucket.is_urgent() && !task.completed => self.paint(bucket.label(), "31"),
                        bucket => bucket.label().to_string(),
                    };
                    vec![
                        self.paint(&task.id, "33"),
                        self.paint(task.priority.as_str(), priority_code(task.priority)),
                        title,
                        row.category_name.clone().unwrap_or_else(|| task.category_id.clone()),
                        due,
                    ]
                })
                .collect();

            write_table(&mut out, headers, rows)?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "{}/{} done ({}%)",
            view.completed, view.total, view.completion_percentage
        )?;
        Ok(())
    }

    pub fn print_categories<W: Write>(&self, mut out: W, categories: &[CategorySummary], all_count: usize) -> anyhow::Result<()> {
        let mut rows = vec![vec!["all".to_string(), "All Tasks".to_string(), all_count.to_string()]];
        rows.extend(categories.iter().map(|c| {
            let name = if c.selected { self.paint(&c.name, "1") } else { c.name.clone() };
            vec![c.id.clone(), name, c.count.to_string()]
        }));

        let headers = ["ID", "Name", "Tasks"].map(str::to_string).to_vec();
        write_table(&mut out, headers, rows)
    }

    pub fn print_stats<W: Write>(&self, mut out: W, view: &TaskView) -> anyhow::Result<()> {
        writeln!(out, "total      {}", view.total)?;
        writeln!(out, "completed  {}", view.completed)?;
        writeln!(out, "pending    {}", view.total - view.completed)?;
        writeln!(out, "progress   {}%", view.completion_percentage)?;
        Ok(())
    }

    /// Notices go to stderr-style output; errors are painted red.
    pub fn print_notices<W: Write>(&self, mut out: W, notices: &[Notice]) -> anyhow::Result<()> {
        for notice in notices {
            let text = match notice {
                Notice::Success(m) => self.paint(m, "32"),
                Notice::Error(m) => self.paint(m, "31"),
            };
            writeln!(out, "{text}")?;
        }
        Ok(())
    }

    pub fn print_config<W: Write>(&self, mut out: W, cfg: &Config) -> anyhow::Result<()> {
        let rows = cfg
            .entries()
            .map(|(key, value, origin)| {
                let shown = if key == "api.key" && !value.is_empty() { "********" } else { value };
                vec![key.to_string(), shown.to_string(), origin.to_string()]
            })
            .collect();
        let headers = ["Key", "Value", "Source"].map(str::to_string).to_vec();
        write_table(&mut out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn priority_code(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "31",
        Priority::Medium => "33",
        Priority::Low => "36",
        Priority::Unknown => "90",
    }
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
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
