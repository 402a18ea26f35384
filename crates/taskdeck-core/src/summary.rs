use crate::task::{Priority, Status, Task};

/// Derived counts over the full, unfiltered collection. Never stored;
/// recomputed from scratch on every projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub total: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl AggregateSummary {
    pub fn status_count(&self, status: Status) -> usize {
        match status {
            Status::NotStarted => self.not_started,
            Status::InProgress => self.in_progress,
            Status::Completed => self.completed,
        }
    }

    pub fn priority_count(&self, priority: Priority) -> usize {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }
}

/// Unknown or absent status/priority values land in no bucket but still
/// count toward `total`.
pub fn summarize(tasks: &[Task]) -> AggregateSummary {
    let mut summary = AggregateSummary {
        total: tasks.len(),
        ..AggregateSummary::default()
    };

    for task in tasks {
        match task.status_kind() {
            Some(Status::NotStarted) => summary.not_started += 1,
            Some(Status::InProgress) => summary.in_progress += 1,
            Some(Status::Completed) => summary.completed += 1,
            None => {}
        }
        match task.priority_kind() {
            Some(Priority::Low) => summary.low += 1,
            Some(Priority::Medium) => summary.medium += 1,
            Some(Priority::High) => summary.high += 1,
            None => {}
        }
    }

    summary
}
