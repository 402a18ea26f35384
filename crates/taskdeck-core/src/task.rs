use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed status set. Anything else coming over the wire stays a raw string
/// on the task and simply parses to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::NotStarted, Status::InProgress, Status::Completed];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not-started" | "not_started" => Some(Self::NotStarted),
            "in-progress" | "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A task record as the remote store emits it: snake_case fields, string-typed
/// dates. `status`, `priority` and `due_date` are kept raw because the store
/// boundary is untrusted; unrecognized values must round-trip instead of
/// failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Task {
    pub fn new(title: String, now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339();
        Self {
            id: Uuid::new_v4(),
            title,
            description: None,
            status: Some(Status::NotStarted.as_str().to_string()),
            priority: Some(Priority::Medium.as_str().to_string()),
            due_date: None,
            created_at: Some(stamp.clone()),
            updated_at: Some(stamp),
        }
    }

    /// The task's status within the closed set, or `None` for unknown/absent.
    pub fn status_kind(&self) -> Option<Status> {
        self.status.as_deref().and_then(Status::parse)
    }

    pub fn priority_kind(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(Priority::parse)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now.to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_status_set() {
        assert_eq!(Status::parse("not-started"), Some(Status::NotStarted));
        assert_eq!(Status::parse("in_progress"), Some(Status::InProgress));
        assert_eq!(Status::parse(" Completed "), Some(Status::Completed));
        assert_eq!(Status::parse("archived"), None);
    }

    #[test]
    fn unknown_wire_values_parse_to_none() {
        let mut task = Task::new("x".to_string(), Utc::now());
        task.status = Some("paused".to_string());
        task.priority = Some("urgent".to_string());
        assert_eq!(task.status_kind(), None);
        assert_eq!(task.priority_kind(), None);
    }

    #[test]
    fn new_task_defaults() {
        let task = Task::new("Write report".to_string(), Utc::now());
        assert_eq!(task.status_kind(), Some(Status::NotStarted));
        assert_eq!(task.priority_kind(), Some(Priority::Medium));
        assert!(task.due_date.is_none());
    }
}
