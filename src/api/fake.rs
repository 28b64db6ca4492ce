//! In-memory stand-in for the remote service, used by controller tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ApiError, ApiGateway, ApiResult, TaskPage, TaskQuery};
use crate::types::{Category, CategoryDraft, CategoryId, Task, TaskDraft, TaskId, UserIdentity};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub(crate) enum Op {
    ListTasks,
    GetTask,
    CreateTask,
    UpdateTask,
    SetCompletion,
    DeleteTask,
    ListCategories,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    Login,
    Register,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListTasks(TaskQuery),
    GetTask(TaskId),
    CreateTask(TaskDraft),
    UpdateTask(TaskId, TaskDraft),
    SetCompletion(TaskId, bool),
    DeleteTask(TaskId),
    ListCategories,
    CreateCategory(CategoryDraft),
    UpdateCategory(CategoryId, CategoryDraft),
    DeleteCategory(CategoryId),
    Login(String),
    Register(String),
}

#[derive(Default)]
struct FakeState {
    tasks: BTreeMap<TaskId, Task>,
    categories: BTreeMap<CategoryId, Category>,
    users: HashMap<String, String>,
    next_id: i64,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<ApiError>>,
    register_returns_token: bool,
}

/// Paginates like a page-number paginated REST list: pages past the end of a
/// non-empty first page answer `NotFound`.
#[derive(Default)]
pub(crate) struct FakeGateway {
    state: Mutex<FakeState>,
}

fn timestamp(seed: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seed, 0).unwrap_or_default()
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        let gateway = Self::default();
        gateway.lock().next_id = 1;
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn with_tasks(self, count: usize) -> Self {
        for index in 0..count {
            self.seed_task(&format!("Task {}", index + 1), index % 3 == 0);
        }
        self
    }

    pub(crate) fn seed_task(&self, title: &str, is_completed: bool) -> Task {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let task = Task {
            id,
            title: title.to_string(),
            description: String::new(),
            is_completed,
            category: None,
            created_at: timestamp(id),
            completed_at: is_completed.then(|| timestamp(id + 1)),
        };
        state.tasks.insert(id, task.clone());
        task
    }

    pub(crate) fn seed_category(&self, name: &str) -> Category {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let category = Category {
            id,
            name: name.to_string(),
        };
        state.categories.insert(id, category.clone());
        category
    }

    pub(crate) fn add_user(&self, username: &str, password: &str) {
        self.lock()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub(crate) fn set_register_returns_token(&self, value: bool) {
        self.lock().register_returns_token = value;
    }

    /// Removes a task behind the client's back, as another session would.
    pub(crate) fn remove_task(&self, id: TaskId) {
        self.lock().tasks.remove(&id);
    }

    pub(crate) fn task(&self, id: TaskId) -> Option<Task> {
        self.lock().tasks.get(&id).cloned()
    }

    pub(crate) fn task_ids(&self) -> Vec<TaskId> {
        self.lock().tasks.keys().copied().collect()
    }

    pub(crate) fn fail_next(&self, op: Op, error: ApiError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn begin(&self, op: Op, call: Call) -> ApiResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(error) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl ApiGateway for FakeGateway {
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<TaskPage> {
        let state = self.begin(Op::ListTasks, Call::ListTasks(*query))?;
        let matching = state
            .tasks
            .values()
            .filter(|task| query.is_completed.is_none_or(|done| task.is_completed == done))
            .cloned()
            .collect::<Vec<_>>();

        let page_size = query.page_size.max(1) as usize;
        let start = (query.page.max(1) as usize - 1) * page_size;
        if query.page > 1 && start >= matching.len() {
            return Err(ApiError::NotFound);
        }

        Ok(TaskPage {
            count: matching.len() as u64,
            results: matching.into_iter().skip(start).take(page_size).collect(),
        })
    }

    async fn get_task(&self, id: TaskId) -> ApiResult<Task> {
        let state = self.begin(Op::GetTask, Call::GetTask(id))?;
        state.tasks.get(&id).cloned().ok_or(ApiError::NotFound)
    }

    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
        let mut state = self.begin(Op::CreateTask, Call::CreateTask(draft.clone()))?;
        let id = state.next_id;
        state.next_id += 1;
        let task = Task {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            is_completed: false,
            category: draft.category.flatten(),
            created_at: timestamp(id),
            completed_at: None,
        };
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> ApiResult<Task> {
        let mut state = self.begin(Op::UpdateTask, Call::UpdateTask(id, draft.clone()))?;
        let task = state.tasks.get_mut(&id).ok_or(ApiError::NotFound)?;
        task.title = draft.title.clone();
        task.description = draft.description.clone();
        if let Some(category) = draft.category {
            task.category = category;
        }
        Ok(task.clone())
    }

    async fn set_task_completion(&self, id: TaskId, is_completed: bool) -> ApiResult<Task> {
        let mut state = self.begin(Op::SetCompletion, Call::SetCompletion(id, is_completed))?;
        let task = state.tasks.get_mut(&id).ok_or(ApiError::NotFound)?;
        task.is_completed = is_completed;
        task.completed_at = is_completed.then(|| timestamp(id + 1_000));
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        let mut state = self.begin(Op::DeleteTask, Call::DeleteTask(id))?;
        state.tasks.remove(&id).map(|_| ()).ok_or(ApiError::NotFound)
    }

    async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        let state = self.begin(Op::ListCategories, Call::ListCategories)?;
        Ok(state.categories.values().cloned().collect())
    }

    async fn create_category(&self, draft: &CategoryDraft) -> ApiResult<Category> {
        let mut state = self.begin(Op::CreateCategory, Call::CreateCategory(draft.clone()))?;
        let id = state.next_id;
        state.next_id += 1;
        let category = Category {
            id,
            name: draft.name.clone(),
        };
        state.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        draft: &CategoryDraft,
    ) -> ApiResult<Category> {
        let mut state =
            self.begin(Op::UpdateCategory, Call::UpdateCategory(id, draft.clone()))?;
        let category = state.categories.get_mut(&id).ok_or(ApiError::NotFound)?;
        category.name = draft.name.clone();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> ApiResult<()> {
        let mut state = self.begin(Op::DeleteCategory, Call::DeleteCategory(id))?;
        state
            .categories
            .remove(&id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn login(&self, username: &str, password: &str) -> ApiResult<UserIdentity> {
        let state = self.begin(Op::Login, Call::Login(username.to_string()))?;
        match state.users.get(username) {
            Some(expected) if expected == password => Ok(UserIdentity {
                username: username.to_string(),
                token: format!("token-{username}"),
            }),
            _ => Err(ApiError::Unauthorized),
        }
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> ApiResult<Option<UserIdentity>> {
        let mut state = self.begin(Op::Register, Call::Register(username.to_string()))?;
        if state.users.contains_key(username) {
            let mut errors = super::FieldErrors::new();
            errors.add("username", "A user with that username already exists.");
            return Err(ApiError::ValidationFailed(errors));
        }
        state
            .users
            .insert(username.to_string(), password.to_string());

        Ok(state.register_returns_token.then(|| UserIdentity {
            username: username.to_string(),
            token: format!("token-{username}"),
        }))
    }
}
