use tracing::{debug, info};

use crate::api::ApiError;
use crate::notice::Notice;
use crate::router::Route;
use crate::screen::{ScreenContext, ScreenError};
use crate::types::{Task, TaskId};

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Loaded(Task),
    Missing,
}

/// A single task viewed on its own screen.
pub struct TaskDetailController {
    ctx: ScreenContext,
    id: TaskId,
    state: DetailState,
}

impl TaskDetailController {
    pub fn new(ctx: ScreenContext, id: TaskId) -> Self {
        Self {
            ctx,
            id,
            state: DetailState::Loading,
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn task(&self) -> Option<&Task> {
        match &self.state {
            DetailState::Loaded(task) => Some(task),
            _ => None,
        }
    }

    pub async fn load(&mut self) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.ctx.api.get_task(self.id).await {
            Ok(task) => {
                self.state = DetailState::Loaded(task);
                Ok(())
            }
            Err(ApiError::NotFound) => {
                self.state = DetailState::Missing;
                self.ctx
                    .report(Notice::fatal(format!("task {} was not found", self.id)));
                Err(ScreenError::Api(ApiError::NotFound))
            }
            Err(err) => Err(self.ctx.escalate(err)),
        }
    }

    pub async fn toggle_completion(&mut self) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        let DetailState::Loaded(task) = &self.state else {
            return Err(ScreenError::UnknownTask(self.id));
        };
        let target = !task.is_completed;

        let updated = self
            .ctx
            .api
            .set_task_completion(self.id, target)
            .await
            .map_err(|err| self.ctx.escalate(err))?;

        if let DetailState::Loaded(task) = &mut self.state {
            task.is_completed = target;
            task.completed_at = updated.completed_at.filter(|_| target);
        }
        debug!(task_id = self.id, is_completed = target, "task completion toggled");
        Ok(())
    }

    /// Deletes the task and returns the route to go back to.
    pub async fn delete(&mut self) -> Result<Route, ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.ctx.api.delete_task(self.id).await {
            Ok(()) => info!(task_id = self.id, "task deleted"),
            Err(ApiError::NotFound) => debug!(task_id = self.id, "task was already deleted"),
            Err(err) => return Err(self.ctx.escalate(err)),
        }

        self.state = DetailState::Missing;
        Ok(Route::TaskList)
    }

    pub fn edit_route(&self) -> Route {
        Route::TaskEdit(self.id)
    }
}
