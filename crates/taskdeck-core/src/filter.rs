use crate::task::{Status, Task};

/// The active status tab: everything, or one status of the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        Status::parse(raw).map(Self::Only)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(status) => status.as_str(),
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => task.status_kind() == Some(status),
        }
    }
}

/// Order-preserving subset of the collection for the selected tab.
pub fn visible_tasks(filter: StatusFilter, tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect()
}
