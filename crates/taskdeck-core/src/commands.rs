use std::io::{self, Read};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{Direction, Granularity};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::duedate;
use crate::filter::StatusFilter;
use crate::projection;
use crate::render::{Renderer, short_id};
use crate::task::{Priority, Status, Task};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "modify",
        "done",
        "delete",
        "calendar",
        "summary",
        "export",
        "import",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(command, args = ?inv.args, "dispatching command");

    match command {
        "add" => cmd_add(store, &inv.args, now),
        "list" => cmd_list(store, renderer, &inv.args),
        "modify" => cmd_modify(store, &inv.args, now),
        "done" => cmd_done(store, &inv.args, now),
        "delete" => cmd_delete(store, &inv.args),
        "calendar" => cmd_calendar(store, cfg, renderer, &inv.args),
        "summary" => cmd_summary(store, renderer),
        "export" => cmd_export(store),
        "import" => cmd_import(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Token modifiers in the `key:value` / `key=value` style. Anything that is
/// not a modifier joins the title.
#[derive(Debug, Clone)]
enum Mod {
    Due(String),
    Priority(Priority),
    Status(Status),
    Description(String),
}

#[instrument(skip(args))]
fn parse_title_and_mods(args: &[String]) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut title_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg)? {
            mods.push(one_mod);
            continue;
        }

        title_parts.push(arg.clone());
    }

    Ok((title_parts.join(" "), mods))
}

fn parse_one_mod(tok: &str) -> anyhow::Result<Option<Mod>> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "due" => {
            // User input is validated strictly; only malformed data arriving
            // from the store is degraded silently.
            if duedate::normalize(value).is_none() {
                return Err(anyhow!(
                    "unrecognized due date: {value} (expected YYYY-MM-DD, \
                     YYYY-MM-DDTHH:MM:SS.mmmZ, or YYYY-MM-DD HH:MM:SS+OO)"
                ));
            }
            Ok(Some(Mod::Due(value.to_string())))
        }
        "pri" | "priority" => {
            let priority = Priority::parse(value)
                .ok_or_else(|| anyhow!("unrecognized priority: {value}"))?;
            Ok(Some(Mod::Priority(priority)))
        }
        "status" => {
            let status =
                Status::parse(value).ok_or_else(|| anyhow!("unrecognized status: {value}"))?;
            Ok(Some(Mod::Status(status)))
        }
        "desc" | "description" => Ok(Some(Mod::Description(value.to_string()))),
        _ => Ok(None),
    }
}

fn apply_mods(task: &mut Task, mods: &[Mod]) {
    for one_mod in mods {
        match one_mod {
            Mod::Due(raw) => task.due_date = Some(raw.clone()),
            Mod::Priority(priority) => task.priority = Some(priority.as_str().to_string()),
            Mod::Status(status) => task.status = Some(status.as_str().to_string()),
            Mod::Description(text) => task.description = Some(text.clone()),
        }
    }
}

/// Resolves a task by unique id prefix (as printed in the list view).
fn select_task_index(tasks: &[Task], prefix: &str) -> anyhow::Result<usize> {
    let needle = prefix.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("a task id (or id prefix) is required"));
    }

    let mut matches = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| task.id.to_string().starts_with(&needle));

    let Some((idx, _)) = matches.next() else {
        return Err(anyhow!("no task matches id prefix: {prefix}"));
    };
    if matches.next().is_some() {
        return Err(anyhow!("id prefix is ambiguous: {prefix}"));
    }

    Ok(idx)
}

#[instrument(skip(store, args, now))]
fn cmd_add(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    let (title, mods) = parse_title_and_mods(args)?;
    if title.is_empty() {
        return Err(anyhow!("add: a task title is required"));
    }

    let mut task = Task::new(title, now);
    apply_mods(&mut task, &mods);

    let tasks = store.load_tasks()?;
    store.add_task(tasks, task.clone())?;

    info!(id = %task.id, title = %task.title, "added task");
    println!("Added task {} ({})", short_id(&task), task.title);
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_list(store: &mut DataStore, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let filter = match args.first() {
        Some(raw) => StatusFilter::parse(raw)
            .ok_or_else(|| anyhow!("unknown status tab: {raw} (all, not-started, in-progress, completed)"))?,
        None => StatusFilter::All,
    };

    let tasks = store.load_tasks()?;
    let visible = crate::filter::visible_tasks(filter, &tasks);
    debug!(tab = filter.as_str(), shown = visible.len(), total = tasks.len(), "listing tasks");
    renderer.print_task_table(&visible)
}

#[instrument(skip(store, args, now))]
fn cmd_modify(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    let Some((prefix, rest)) = args.split_first() else {
        return Err(anyhow!("modify: a task id is required"));
    };

    let (title, mods) = parse_title_and_mods(rest)?;
    if title.is_empty() && mods.is_empty() {
        return Err(anyhow!("modify: nothing to change"));
    }

    let mut tasks = store.load_tasks()?;
    let idx = select_task_index(&tasks, prefix)?;

    if !title.is_empty() {
        tasks[idx].title = title;
    }
    apply_mods(&mut tasks[idx], &mods);
    tasks[idx].touch(now);

    info!(id = %tasks[idx].id, "modified task");
    println!("Modified task {}", short_id(&tasks[idx]));
    store.save_tasks(&tasks)
}

#[instrument(skip(store, args, now))]
fn cmd_done(store: &mut DataStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    let Some(prefix) = args.first() else {
        return Err(anyhow!("done: a task id is required"));
    };

    let mut tasks = store.load_tasks()?;
    let idx = select_task_index(&tasks, prefix)?;

    tasks[idx].status = Some(Status::Completed.as_str().to_string());
    tasks[idx].touch(now);

    info!(id = %tasks[idx].id, "completed task");
    println!("Completed task {} ({})", short_id(&tasks[idx]), tasks[idx].title);
    store.save_tasks(&tasks)
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut DataStore, args: &[String]) -> anyhow::Result<()> {
    let Some(prefix) = args.first() else {
        return Err(anyhow!("delete: a task id is required"));
    };

    let tasks = store.load_tasks()?;
    let idx = select_task_index(&tasks, prefix)?;
    let removed = store.remove_task(tasks[idx].id)?;

    info!(id = %removed.id, "deleted task");
    println!("Deleted task {} ({})", short_id(&removed), removed.title);
    Ok(())
}

/// `calendar [monthly|weekly|daily] [date:YYYY-MM-DD] [next|prev ...]`
///
/// The reference date starts at today (or `date:`), then each `next`/`prev`
/// token shifts it by one unit of the selected granularity.
#[instrument(skip(store, cfg, renderer, args))]
fn cmd_calendar(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let mut granularity = cfg
        .get("default.view")
        .as_deref()
        .and_then(Granularity::parse)
        .unwrap_or(Granularity::Monthly);
    let mut reference = Local::now().date_naive();
    let mut shifts: Vec<Direction> = Vec::new();

    for arg in args {
        if let Some(parsed) = Granularity::parse(arg) {
            granularity = parsed;
            continue;
        }
        if let Some(value) = arg.strip_prefix("date:") {
            reference = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .with_context(|| format!("unrecognized reference date: {value}"))?;
            continue;
        }
        match arg.to_ascii_lowercase().as_str() {
            "next" => shifts.push(Direction::Forward),
            "prev" | "previous" => shifts.push(Direction::Back),
            other => {
                warn!(token = %other, "ignoring unrecognized calendar token");
            }
        }
    }

    for direction in shifts {
        reference = projection::advance(reference, granularity, direction);
    }

    let tasks = store.load_tasks()?;
    let view = projection::project(&tasks, reference, granularity, StatusFilter::All)?;
    renderer.print_grid(&view.grid)
}

#[instrument(skip(store, renderer))]
fn cmd_summary(store: &mut DataStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    let tasks = store.load_tasks()?;
    let summary = crate::summary::summarize(&tasks);
    renderer.print_summary(&summary)
}

#[instrument(skip(store))]
fn cmd_export(store: &mut DataStore) -> anyhow::Result<()> {
    let tasks = store.load_tasks()?;
    let payload = serde_json::to_string_pretty(&tasks).context("failed to serialize tasks")?;
    println!("{payload}");
    Ok(())
}

/// Accepts a JSON array or JSONL on stdin. Records keep their raw status,
/// priority and due strings; the store boundary never rejects unknown values.
#[instrument(skip(store))]
fn cmd_import(store: &mut DataStore) -> anyhow::Result<()> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read stdin")?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: stdin was empty"));
    }

    let incoming: Vec<Task> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("failed to parse JSON task array")?
    } else {
        let mut tasks = Vec::new();
        for (idx, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let task: Task = serde_json::from_str(line)
                .with_context(|| format!("failed parsing stdin line {}", idx + 1))?;
            tasks.push(task);
        }
        tasks
    };

    let count = store.merge_tasks(incoming)?;
    info!(count, "imported tasks");
    println!("Imported {count} task(s)");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("taskdeck commands:");
    println!("  add <title> [due:<date>] [priority:<p>] [status:<s>] [desc:<text>]");
    println!("  list [all|not-started|in-progress|completed]");
    println!("  modify <id> [modifiers] [new title]");
    println!("  done <id>");
    println!("  delete <id>");
    println!("  calendar [monthly|weekly|daily] [date:YYYY-MM-DD] [next|prev ...]");
    println!("  summary");
    println!("  export | import");
    println!("  help | version");
    Ok(())
}
