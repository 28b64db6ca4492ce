use tracing::{debug, info, warn};

use super::{DESCRIPTION_MAX, TITLE_MAX, TITLE_MIN, check_length};
use crate::api::{ApiError, FieldErrors};
use crate::notice::Notice;
use crate::router::Route;
use crate::screen::{ScreenContext, ScreenError};
use crate::types::{Category, CategoryId, Task, TaskDraft, TaskId};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FormMode {
    Create,
    Edit(TaskId),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormStatus {
    /// Waiting for the record being edited.
    Loading,
    Editing,
    /// The record could not be loaded; submission is refused.
    Unavailable,
    Submitted,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CategoryOptions {
    NotLoaded,
    Loaded(Vec<Category>),
    /// Listing failed; the selector stays disabled.
    Unavailable(String),
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TaskFormBuffer {
    pub title: String,
    pub description: String,
    pub category: Option<CategoryId>,
    pub errors: FieldErrors,
}

impl TaskFormBuffer {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category,
            errors: FieldErrors::new(),
        }
    }
}

pub struct TaskFormController {
    ctx: ScreenContext,
    mode: FormMode,
    status: FormStatus,
    buffer: TaskFormBuffer,
    categories: CategoryOptions,
    saved: Option<Task>,
}

impl TaskFormController {
    pub fn create(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            mode: FormMode::Create,
            status: FormStatus::Editing,
            buffer: TaskFormBuffer::default(),
            categories: CategoryOptions::NotLoaded,
            saved: None,
        }
    }

    pub fn edit(ctx: ScreenContext, id: TaskId) -> Self {
        Self {
            ctx,
            mode: FormMode::Edit(id),
            status: FormStatus::Loading,
            buffer: TaskFormBuffer::default(),
            categories: CategoryOptions::NotLoaded,
            saved: None,
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    pub fn buffer(&self) -> &TaskFormBuffer {
        &self.buffer
    }

    /// The record as the service returned it after the last successful submit.
    pub fn saved(&self) -> Option<&Task> {
        self.saved.as_ref()
    }

    pub fn categories(&self) -> &CategoryOptions {
        &self.categories
    }

    pub fn category_field_enabled(&self) -> bool {
        matches!(self.categories, CategoryOptions::Loaded(_))
    }

    pub fn can_submit(&self) -> bool {
        self.status == FormStatus::Editing
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.buffer.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.buffer.description = description.into();
    }

    pub fn select_category(&mut self, category: Option<CategoryId>) {
        self.buffer.category = category;
    }

    /// Loads the selector options and, when editing, the record itself.
    pub async fn open(&mut self) -> Result<(), ScreenError> {
        self.load_categories().await?;
        if let FormMode::Edit(id) = self.mode {
            self.load_for_edit(id).await?;
        }
        Ok(())
    }

    /// A failed listing disables the selector rather than failing the form;
    /// only a rejected session is returned as an error.
    pub async fn load_categories(&mut self) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.ctx.api.list_categories().await {
            Ok(categories) => {
                debug!(count = categories.len(), "category options loaded");
                self.categories = CategoryOptions::Loaded(categories);
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(self.ctx.escalate(ApiError::Unauthorized)),
            Err(err) => {
                warn!(error = %err, "category options unavailable; disabling selector");
                self.categories = CategoryOptions::Unavailable(err.to_string());
                self.ctx.report(Notice::transient(
                    "categories could not be loaded; the category field is disabled",
                ));
                Ok(())
            }
        }
    }

    pub async fn load_for_edit(&mut self, id: TaskId) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;
        self.mode = FormMode::Edit(id);

        match self.ctx.api.get_task(id).await {
            Ok(task) => {
                self.buffer = TaskFormBuffer::from_task(&task);
                self.status = FormStatus::Editing;
                Ok(())
            }
            Err(ApiError::NotFound) => {
                self.status = FormStatus::Unavailable;
                self.ctx
                    .report(Notice::fatal(format!("task {id} was not found")));
                Err(ScreenError::Api(ApiError::NotFound))
            }
            Err(err) => Err(self.ctx.escalate(err)),
        }
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_length(
            &mut errors,
            "title",
            "Title",
            self.buffer.title.trim(),
            TITLE_MIN,
            TITLE_MAX,
        );
        check_length(
            &mut errors,
            "description",
            "Description",
            &self.buffer.description,
            0,
            DESCRIPTION_MAX,
        );

        if let (CategoryOptions::Loaded(options), Some(selected)) =
            (&self.categories, self.buffer.category)
            && !options.iter().any(|category| category.id == selected)
        {
            errors.add("category", "Select one of the available categories.");
        }

        errors
    }

    fn draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.buffer.title.trim().to_string(),
            description: self.buffer.description.clone(),
            category: self
                .category_field_enabled()
                .then_some(self.buffer.category),
        }
    }

    /// Creates or updates the record and returns the list route to go back to.
    pub async fn submit(&mut self) -> Result<Route, ScreenError> {
        if !self.can_submit() {
            return Err(ScreenError::SubmissionDisabled);
        }

        let errors = self.validate();
        if !errors.is_empty() {
            self.buffer.errors = errors.clone();
            return Err(ScreenError::Invalid(errors));
        }
        self.buffer.errors.clear();

        self.ctx.ensure_authenticated()?;

        let draft = self.draft();
        let result = match self.mode {
            FormMode::Create => self.ctx.api.create_task(&draft).await,
            FormMode::Edit(id) => self.ctx.api.update_task(id, &draft).await,
        };

        match result {
            Ok(task) => {
                info!(task_id = task.id, mode = ?self.mode, "task saved");
                self.buffer = TaskFormBuffer::default();
                self.status = FormStatus::Submitted;
                self.saved = Some(task);
                Ok(Route::TaskList)
            }
            Err(ApiError::ValidationFailed(server_errors)) => {
                self.buffer.errors.merge(server_errors);
                Err(ScreenError::Invalid(self.buffer.errors.clone()))
            }
            Err(ApiError::NotFound) if matches!(self.mode, FormMode::Edit(_)) => {
                self.status = FormStatus::Unavailable;
                self.ctx
                    .report(Notice::fatal("the task was deleted while being edited"));
                Err(ScreenError::Api(ApiError::NotFound))
            }
            Err(err) => Err(self.ctx.escalate(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{Call, FakeGateway, Op};
    use crate::screen::testing::Harness;

    #[tokio::test]
    async fn one_character_title_fails_without_request() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let mut form = TaskFormController::create(harness.context.clone());
        form.set_title("A");

        let err = form.submit().await.expect_err("validation should fail");

        match err {
            ScreenError::Invalid(errors) => assert!(errors.contains("title")),
            other => panic!("expected validation errors, got {other:?}"),
        }
        assert!(form.buffer().errors.contains("title"));
        assert_eq!(harness.api.call_count(), 0);
    }

    #[tokio::test]
    async fn overlong_description_is_rejected() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let mut form = TaskFormController::create(harness.context.clone());
        form.set_title("Valid title");
        form.set_description("x".repeat(501));

        form.submit().await.expect_err("validation should fail");

        assert!(form.buffer().errors.contains("description"));
        assert!(!form.buffer().errors.contains("title"));
        assert_eq!(harness.api.call_count(), 0);
    }

    #[tokio::test]
    async fn create_submits_and_clears_buffer() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let category = harness.api.seed_category("Home");
        let mut form = TaskFormController::create(harness.context.clone());
        form.open().await.expect("form should open");
        form.set_title("  Buy milk ");
        form.select_category(Some(category.id));

        let route = form.submit().await.expect("submit should succeed");

        assert_eq!(route, Route::TaskList);
        assert_eq!(form.status(), &FormStatus::Submitted);
        assert_eq!(form.buffer(), &TaskFormBuffer::default());
        assert_eq!(form.saved().map(|task| task.category), Some(Some(category.id)));
        assert!(harness.api.calls().contains(&Call::CreateTask(TaskDraft {
            title: "Buy milk".to_string(),
            description: String::new(),
            category: Some(Some(category.id)),
        })));
    }

    #[tokio::test]
    async fn category_must_reference_loaded_option() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        harness.api.seed_category("Work");
        let mut form = TaskFormController::create(harness.context.clone());
        form.open().await.expect("form should open");
        form.set_title("Prepare slides");
        form.select_category(Some(9_999));
        harness.api.clear_calls();

        form.submit().await.expect_err("unknown category should fail");

        assert!(form.buffer().errors.contains("category"));
        assert_eq!(harness.api.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_category_listing_disables_field_and_omits_category() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let task = harness.api.seed_task("Existing", false);
        harness
            .api
            .fail_next(Op::ListCategories, ApiError::Unreachable("timeout".into()));
        let mut form = TaskFormController::edit(harness.context.clone(), task.id);

        form.open().await.expect("form should still open");
        assert!(!form.category_field_enabled());
        form.select_category(Some(77));
        form.submit().await.expect("submit should succeed");

        let update = harness
            .api
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::UpdateTask(id, draft) => Some((id, draft)),
                _ => None,
            })
            .expect("update should be sent");
        assert_eq!(update.0, task.id);
        assert_eq!(update.1.category, None);
    }

    #[tokio::test]
    async fn edit_loads_existing_values() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let task = harness.api.seed_task("Call the bank", false);
        let mut form = TaskFormController::edit(harness.context.clone(), task.id);

        form.open().await.expect("form should open");

        assert_eq!(form.status(), &FormStatus::Editing);
        assert_eq!(form.buffer().title, "Call the bank");
    }

    #[tokio::test]
    async fn edit_of_missing_task_disables_submission() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let mut form = TaskFormController::edit(harness.context.clone(), 404);

        form.open().await.expect_err("missing task should fail");
        form.set_title("Anything");
        harness.api.clear_calls();

        assert_eq!(
            form.submit().await,
            Err(ScreenError::SubmissionDisabled)
        );
        assert_eq!(harness.api.call_count(), 0);
    }

    #[tokio::test]
    async fn server_validation_errors_merge_without_clearing_input() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let mut form = TaskFormController::create(harness.context.clone());
        form.set_title("Duplicate title");
        form.set_description("details");
        let mut server = FieldErrors::new();
        server.add("title", "Task with this title already exists.");
        harness
            .api
            .fail_next(Op::CreateTask, ApiError::ValidationFailed(server));

        let err = form.submit().await.expect_err("server should reject");

        assert!(matches!(err, ScreenError::Invalid(_)));
        assert_eq!(
            form.buffer().errors.first("title"),
            Some("Task with this title already exists.")
        );
        assert_eq!(form.buffer().title, "Duplicate title");
        assert_eq!(form.buffer().description, "details");
        assert_eq!(form.status(), &FormStatus::Editing);
    }

    #[tokio::test]
    async fn unauthorized_submit_expires_session() {
        let harness = Harness::signed_in(FakeGateway::new()).await;
        let mut form = TaskFormController::create(harness.context.clone());
        form.set_title("Needs auth");
        harness.api.fail_next(Op::CreateTask, ApiError::Unauthorized);

        let err = form.submit().await.expect_err("server should reject");

        assert_eq!(err, ScreenError::SessionRequired);
        assert!(!harness.session.is_authenticated());
        assert!(!form.buffer().errors.contains("title"));
    }

    #[tokio::test]
    async fn anonymous_form_makes_no_request() {
        let harness = Harness::new(FakeGateway::new());
        let mut form = TaskFormController::create(harness.context.clone());
        form.set_title("Valid title");

        assert_eq!(form.open().await, Err(ScreenError::SessionRequired));
        assert_eq!(form.submit().await, Err(ScreenError::SessionRequired));
        assert_eq!(harness.api.call_count(), 0);
    }
}
