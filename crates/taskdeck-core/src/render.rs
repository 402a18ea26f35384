use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarCell, CalendarGrid, WEEKDAY_LABELS};
use crate::config::Config;
use crate::summary::AggregateSummary;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Status".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&short_id(task), "33");
            let status = task
                .status_kind()
                .map(|s| s.as_str().to_string())
                .or_else(|| task.status.clone())
                .unwrap_or_default();
            let priority = task
                .priority_kind()
                .map(|p| p.as_str().to_string())
                .or_else(|| task.priority.clone())
                .unwrap_or_default();
            let due = task.due_date.clone().unwrap_or_default();

            rows.push(vec![id, task.title.clone(), status, priority, due]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, summary))]
    pub fn print_summary(&mut self, summary: &AggregateSummary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "total        {}", summary.total)?;
        writeln!(out, "not-started  {}", summary.not_started)?;
        writeln!(out, "in-progress  {}", summary.in_progress)?;
        writeln!(out, "completed    {}", summary.completed)?;
        writeln!(out)?;
        writeln!(out, "low          {}", summary.low)?;
        writeln!(out, "medium       {}", summary.medium)?;
        writeln!(out, "high         {}", summary.high)?;

        Ok(())
    }

    #[tracing::instrument(skip(self, grid))]
    pub fn print_grid(&mut self, grid: &CalendarGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        match grid {
            CalendarGrid::Monthly { weeks } => {
                if let Some(anchor) = weeks.iter().flatten().find(|c| c.in_current_period) {
                    writeln!(
                        out,
                        "{} {}",
                        month_name(anchor.date.month()),
                        anchor.date.year()
                    )?;
                }
                self.write_week_header(&mut out)?;
                for week in weeks {
                    self.write_week_row(&mut out, week)?;
                }
            }
            CalendarGrid::Weekly { days } => {
                if let (Some(first), Some(last)) = (days.first(), days.last()) {
                    writeln!(out, "Week of {} - {}", first.date, last.date)?;
                }
                self.write_week_header(&mut out)?;
                self.write_week_row(&mut out, days)?;
            }
            CalendarGrid::Daily { date, hours } => {
                writeln!(out, "{} {}", WEEKDAY_LABELS[date.weekday().num_days_from_sunday() as usize], date)?;
                let mut any = false;
                for slot in hours {
                    for task in &slot.tasks {
                        any = true;
                        writeln!(out, "  {:02}:00  {}", slot.hour, task.title)?;
                    }
                }
                if !any {
                    writeln!(out, "  nothing scheduled")?;
                }
            }
        }

        Ok(())
    }

    fn write_week_header<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        for label in WEEKDAY_LABELS {
            write!(out, "{label:>7}")?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn write_week_row<W: Write>(&self, out: &mut W, cells: &[CalendarCell]) -> anyhow::Result<()> {
        for cell in cells {
            let text = if cell.tasks.is_empty() {
                format!("{:>2}    ", cell.date.day())
            } else {
                format!("{:>2} ({})", cell.date.day(), cell.tasks.len())
            };
            if cell.in_current_period {
                write!(out, " {text}")?;
            } else {
                // Lead/trail days render faint.
                write!(out, " {}", self.paint(&text, "2"))?;
            }
        }
        writeln!(out)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// First UUID segment; enough to address tasks interactively.
pub fn short_id(task: &Task) -> String {
    let id = task.id.to_string();
    id.split('-').next().unwrap_or(&id).to_string()
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "?",
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
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
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

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn short_id_is_first_uuid_segment() {
        let task = Task::new("t".to_string(), Utc::now());
        let short = short_id(&task);
        assert_eq!(short.len(), 8);
        assert!(task.id.to_string().starts_with(&short));
    }

    #[test]
    fn table_pads_to_widest_cell() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["wide cell".to_string(), "x".to_string()]],
        )
        .expect("write table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("A"));
        assert!(lines[2].starts_with("wide cell"));
    }
}
