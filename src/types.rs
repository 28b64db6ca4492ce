use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i64;
pub type CategoryId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub category: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Body of `POST /tasks/` and `PUT /tasks/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    /// `None` leaves the field out of the body; `Some(None)` clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<CategoryId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CategoryDraft {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserIdentity {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum CompletionFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl CompletionFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionFilter::All => "all",
            CompletionFilter::Completed => "completed",
            CompletionFilter::Incomplete => "incomplete",
        }
    }

    /// Value of the `is_completed` query parameter, `None` when unfiltered.
    pub fn as_query_value(self) -> Option<bool> {
        match self {
            CompletionFilter::All => None,
            CompletionFilter::Completed => Some(true),
            CompletionFilter::Incomplete => Some(false),
        }
    }
}

impl FromStr for CompletionFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "completed" | "done" | "true" => Ok(Self::Completed),
            "incomplete" | "pending" | "open" | "false" => Ok(Self::Incomplete),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_filter_parses_aliases() {
        assert_eq!(CompletionFilter::from_str(""), Ok(CompletionFilter::All));
        assert_eq!(
            CompletionFilter::from_str("  Done "),
            Ok(CompletionFilter::Completed)
        );
        assert_eq!(
            CompletionFilter::from_str("pending"),
            Ok(CompletionFilter::Incomplete)
        );
        assert_eq!(CompletionFilter::from_str("someday"), Err(()));
    }

    #[test]
    fn completion_filter_query_value() {
        assert_eq!(CompletionFilter::All.as_query_value(), None);
        assert_eq!(CompletionFilter::Completed.as_query_value(), Some(true));
        assert_eq!(CompletionFilter::Incomplete.as_query_value(), Some(false));
    }

    #[test]
    fn task_deserializes_server_payload_and_ignores_owner_fields() {
        let raw = r#"{
            "id": 7,
            "title": "Write report",
            "description": "",
            "is_completed": true,
            "category": 3,
            "created_at": "2024-05-01T10:00:00.123456Z",
            "completed_at": "2024-05-02T08:30:00+00:00",
            "user": 1,
            "shared_with": []
        }"#;

        let task: Task = serde_json::from_str(raw).expect("task should deserialize");
        assert_eq!(task.id, 7);
        assert_eq!(task.category, Some(3));
        assert!(task.is_completed);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn task_draft_distinguishes_cleared_and_omitted_category() {
        let mut draft = TaskDraft {
            title: "Plan".to_string(),
            description: String::new(),
            category: Some(None),
        };
        let cleared = serde_json::to_value(&draft).expect("draft should serialize");
        assert_eq!(cleared.get("category"), Some(&serde_json::Value::Null));

        draft.category = None;
        let omitted = serde_json::to_value(&draft).expect("draft should serialize");
        assert_eq!(omitted.get("category"), None);

        draft.category = Some(Some(4));
        let assigned = serde_json::to_value(&draft).expect("draft should serialize");
        assert_eq!(assigned["category"], 4);
    }
}
