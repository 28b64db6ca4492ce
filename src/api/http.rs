use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    ApiError, ApiGateway, ApiResult, CredentialSource, FieldErrors, NON_FIELD_ERRORS, TaskPage,
    TaskQuery,
};
use crate::types::{Category, CategoryDraft, CategoryId, Task, TaskDraft, TaskId, UserIdentity};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub auth_scheme: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            request_timeout: Duration::from_secs(10),
            auth_scheme: "Bearer".to_string(),
        }
    }
}

pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpGateway {
    pub fn new(
        config: GatewayConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build HTTP client: {err}"))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<Vec<u8>> {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");

        if let Some(token) = self.credentials.credential() {
            request = request.header(AUTHORIZATION, format!("{} {token}", self.config.auth_scheme));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|err| {
            warn!(%method, url = %url, error = %err, "request failed before a response arrived");
            ApiError::Unreachable(transport_message(&err))
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::Unreachable(format!("failed to read response body: {err}")))?;

        debug!(%method, url = %url, status = status.as_u16(), "request completed");

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        Err(classify_status(status, &bytes))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let bytes = self.send(method, path, body).await?;
        decode(&bytes)
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect: {err}")
    } else {
        err.to_string()
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|err| ApiError::Unreachable(format!("unexpected response body: {err}")))
}

pub(crate) fn classify_status(status: StatusCode, body: &[u8]) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ApiError::ValidationFailed(parse_field_errors(body))
        }
        other => ApiError::Unreachable(format!("service answered HTTP {}", other.as_u16())),
    }
}

/// Reads `{"field": ["msg", ...], "detail": "msg"}` style bodies.
pub(crate) fn parse_field_errors(body: &[u8]) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let value = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);

    match value {
        Value::Object(map) => {
            for (field, raw) in map {
                let field = if field == "detail" {
                    NON_FIELD_ERRORS.to_string()
                } else {
                    field
                };
                for message in flatten_messages(raw) {
                    errors.add(field.clone(), message);
                }
            }
        }
        Value::Null => {}
        other => {
            for message in flatten_messages(other) {
                errors.add(NON_FIELD_ERRORS, message);
            }
        }
    }

    if errors.is_empty() {
        errors.add(NON_FIELD_ERRORS, "the submitted data was rejected");
    }
    errors
}

fn flatten_messages(value: Value) -> Vec<String> {
    match value {
        Value::String(message) => vec![message],
        Value::Array(items) => items.into_iter().flat_map(flatten_messages).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn task_list_path(query: &TaskQuery) -> String {
    let mut pairs = Vec::with_capacity(3);
    if let Some(is_completed) = query.is_completed {
        pairs.push(format!("is_completed={is_completed}"));
    }
    pairs.push(format!("page={}", query.page));
    pairs.push(format!("page_size={}", query.page_size));
    format!("/tasks/?{}", pairs.join("&"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryListing {
    Plain(Vec<Category>),
    Paged { results: Vec<Category> },
}

#[derive(Debug, Default, Deserialize)]
struct AuthResponse {
    #[serde(default, alias = "access", alias = "key")]
    token: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    username: String,
}

impl AuthResponse {
    fn into_identity(self, fallback_username: &str) -> Option<UserIdentity> {
        let token = self.token.filter(|token| !token.trim().is_empty())?;
        let username = self
            .user
            .map(|user| user.username)
            .or(self.username)
            .unwrap_or_else(|| fallback_username.to_string());
        Some(UserIdentity { username, token })
    }
}

fn credentials_body(username: &str, password: &str) -> Value {
    json!({ "username": username, "password": password })
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<TaskPage> {
        self.send_json(Method::GET, &task_list_path(query), None)
            .await
    }

    async fn get_task(&self, id: TaskId) -> ApiResult<Task> {
        self.send_json(Method::GET, &format!("/tasks/{id}/"), None)
            .await
    }

    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
        self.send_json(Method::POST, "/tasks/", Some(json!(draft)))
            .await
    }

    async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> ApiResult<Task> {
        self.send_json(Method::PUT, &format!("/tasks/{id}/"), Some(json!(draft)))
            .await
    }

    async fn set_task_completion(&self, id: TaskId, is_completed: bool) -> ApiResult<Task> {
        self.send_json(
            Method::PATCH,
            &format!("/tasks/{id}/"),
            Some(json!({ "is_completed": is_completed })),
        )
        .await
    }

    async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("/tasks/{id}/"), None)
            .await
            .map(|_| ())
    }

    async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        let listing: CategoryListing = self.send_json(Method::GET, "/categories/", None).await?;
        Ok(match listing {
            CategoryListing::Plain(categories) => categories,
            CategoryListing::Paged { results } => results,
        })
    }

    async fn create_category(&self, draft: &CategoryDraft) -> ApiResult<Category> {
        self.send_json(Method::POST, "/categories/", Some(json!(draft)))
            .await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        draft: &CategoryDraft,
    ) -> ApiResult<Category> {
        self.send_json(Method::PUT, &format!("/categories/{id}/"), Some(json!(draft)))
            .await
    }

    async fn delete_category(&self, id: CategoryId) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("/categories/{id}/"), None)
            .await
            .map(|_| ())
    }

    async fn login(&self, username: &str, password: &str) -> ApiResult<UserIdentity> {
        let response: AuthResponse = self
            .send_json(
                Method::POST,
                "/login",
                Some(credentials_body(username, password)),
            )
            .await?;

        response.into_identity(username).ok_or_else(|| {
            ApiError::Unreachable("login response did not include a credential".to_string())
        })
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> ApiResult<Option<UserIdentity>> {
        let bytes = self
            .send(
                Method::POST,
                "/register",
                Some(credentials_body(username, password)),
            )
            .await?;

        let response = serde_json::from_slice::<AuthResponse>(&bytes).unwrap_or_default();
        Ok(response.into_identity(username))
    }
}
