//! Typed access to the remote task service.
//!
//! [`ApiGateway`] is the seam every controller talks through; [`HttpGateway`]
//! is the production implementation over HTTP.

mod http;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Category, CategoryDraft, CategoryId, Task, TaskDraft, TaskId, UserIdentity};

pub use http::{GatewayConfig, HttpGateway};

/// Key under which errors not tied to a single field are collected.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("credential missing, expired, or rejected")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error("server rejected the submitted fields: {0}")]
    ValidationFailed(FieldErrors),
    #[error("service unreachable: {0}")]
    Unreachable(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::Unreachable(_) => "UNREACHABLE",
        }
    }
}

/// Field-keyed validation messages, used both for client-side validation and
/// for errors reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replaces the messages of every field present in `other`, keeping the rest.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.insert(field, messages);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect::<Vec<_>>();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TaskQuery {
    pub is_completed: Option<bool>,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskPage {
    pub results: Vec<Task>,
    pub count: u64,
}

/// Supplies the credential attached to outgoing requests.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<String>;
}

#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<TaskPage>;
    async fn get_task(&self, id: TaskId) -> ApiResult<Task>;
    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task>;
    async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> ApiResult<Task>;
    async fn set_task_completion(&self, id: TaskId, is_completed: bool) -> ApiResult<Task>;
    async fn delete_task(&self, id: TaskId) -> ApiResult<()>;

    async fn list_categories(&self) -> ApiResult<Vec<Category>>;
    async fn create_category(&self, draft: &CategoryDraft) -> ApiResult<Category>;
    async fn update_category(&self, id: CategoryId, draft: &CategoryDraft)
    -> ApiResult<Category>;
    async fn delete_category(&self, id: CategoryId) -> ApiResult<()>;

    async fn login(&self, username: &str, password: &str) -> ApiResult<UserIdentity>;
    /// Returns the identity when the service authenticates on registration,
    /// `None` when it only created the account.
    async fn register(&self, username: &str, password: &str)
    -> ApiResult<Option<UserIdentity>>;
}
