use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::task::Task;

/// Local task store: one JSONL file, rewritten atomically on every change.
/// Its records follow the remote store's wire format (snake_case fields,
/// string-typed dates), so imports and exports pass through unchanged.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    #[tracing::instrument(skip(self, tasks, task), fields(id = %task.id))]
    pub fn add_task(&self, mut tasks: Vec<Task>, task: Task) -> anyhow::Result<Vec<Task>> {
        tasks.push(task);
        self.save_tasks(&tasks)?;
        Ok(tasks)
    }

    /// Upserts by id: imported records replace stored ones with the same id,
    /// new ids append in input order.
    #[tracing::instrument(skip(self, incoming))]
    pub fn merge_tasks(&self, incoming: Vec<Task>) -> anyhow::Result<usize> {
        let mut tasks = self.load_tasks()?;
        let count = incoming.len();

        for task in incoming {
            match tasks.iter_mut().find(|existing| existing.id == task.id) {
                Some(existing) => *existing = task,
                None => tasks.push(task),
            }
        }

        self.save_tasks(&tasks)?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn remove_task(&self, id: Uuid) -> anyhow::Result<Task> {
        let mut tasks = self.load_tasks()?;
        let idx = tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| anyhow!("task not found: {id}"))?;
        let removed = tasks.remove(idx);
        self.save_tasks(&tasks)?;
        Ok(removed)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn roundtrips_raw_wire_fields() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");

        let mut task = Task::new("Quarterly report".to_string(), Utc::now());
        task.due_date = Some("2025-10-07 18:03:00+00".to_string());
        task.status = Some("somehow-paused".to_string());

        store.add_task(vec![], task.clone()).expect("add task");
        let loaded = store.load_tasks().expect("load tasks");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, task.id);
        assert_eq!(loaded[0].due_date.as_deref(), Some("2025-10-07 18:03:00+00"));
        // Unknown status survives the roundtrip untouched.
        assert_eq!(loaded[0].status.as_deref(), Some("somehow-paused"));
    }

    #[test]
    fn merge_replaces_by_id_and_appends_new() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");

        let mut original = Task::new("original".to_string(), Utc::now());
        store.add_task(vec![], original.clone()).expect("add");

        original.title = "edited".to_string();
        let fresh = Task::new("fresh".to_string(), Utc::now());
        store
            .merge_tasks(vec![original.clone(), fresh.clone()])
            .expect("merge");

        let loaded = store.load_tasks().expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "edited");
        assert_eq!(loaded[1].id, fresh.id);
    }

    #[test]
    fn remove_missing_task_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        assert!(store.remove_task(Uuid::new_v4()).is_err());
    }
}
