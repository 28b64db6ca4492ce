//! The paginated, filtered task list and the mutations made from it.

use tracing::{debug, info};

use crate::api::{ApiError, TaskPage, TaskQuery};
use crate::screen::{ScreenContext, ScreenError};
use crate::types::{CompletionFilter, Task, TaskId};

pub const PAGE_SIZE: u32 = 10;

/// Upper bound on list requests made by one refresh while chasing a valid page.
const MAX_PAGE_ATTEMPTS: usize = 3;

pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
    page.clamp(1, total_pages.max(1))
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Freshness {
    Fresh,
    /// The last refresh failed; `items` are from an earlier successful one.
    Stale(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub items: Vec<Task>,
    pub filter: CompletionFilter,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub freshness: Freshness,
    pub loaded: bool,
}

impl Default for PageView {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            filter: CompletionFilter::All,
            page: 1,
            page_size: PAGE_SIZE,
            total_pages: 1,
            total_count: 0,
            freshness: Freshness::Fresh,
            loaded: false,
        }
    }
}

impl PageView {
    pub fn can_go_previous(&self) -> bool {
        self.page > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale(_))
    }

    pub fn find(&self, id: TaskId) -> Option<&Task> {
        self.items.iter().find(|task| task.id == id)
    }
}

pub struct TaskListController {
    ctx: ScreenContext,
    view: PageView,
}

impl TaskListController {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            view: PageView::default(),
        }
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub async fn refresh(&mut self) -> Result<(), ScreenError> {
        self.load(self.view.filter, self.view.page).await
    }

    pub async fn set_filter(&mut self, filter: CompletionFilter) -> Result<(), ScreenError> {
        self.load(filter, 1).await
    }

    pub async fn set_page(&mut self, page: u32) -> Result<(), ScreenError> {
        self.load(self.view.filter, clamp_page(page, self.view.total_pages))
            .await
    }

    pub async fn next_page(&mut self) -> Result<(), ScreenError> {
        self.set_page(self.view.page.saturating_add(1)).await
    }

    pub async fn previous_page(&mut self) -> Result<(), ScreenError> {
        self.set_page(self.view.page.saturating_sub(1)).await
    }

    pub async fn delete_task(&mut self, id: TaskId) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.ctx.api.delete_task(id).await {
            Ok(()) => info!(task_id = id, "task deleted"),
            Err(ApiError::NotFound) => debug!(task_id = id, "task was already deleted"),
            Err(err) => return Err(self.ctx.escalate(err)),
        }

        self.refresh().await
    }

    /// Flips completion remotely and patches only the matching row.
    pub async fn toggle_completion(&mut self, id: TaskId) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        let Some(index) = self.view.items.iter().position(|task| task.id == id) else {
            return Err(ScreenError::UnknownTask(id));
        };
        let target = !self.view.items[index].is_completed;

        let updated = self
            .ctx
            .api
            .set_task_completion(id, target)
            .await
            .map_err(|err| self.ctx.escalate(err))?;

        let entry = &mut self.view.items[index];
        entry.is_completed = target;
        entry.completed_at = if updated.is_completed == target {
            updated.completed_at
        } else {
            None
        };
        debug!(task_id = id, is_completed = target, "task completion toggled");
        Ok(())
    }

    /// Filter and page are committed to the view only once their rows arrive.
    async fn load(&mut self, filter: CompletionFilter, page: u32) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.fetch_clamped(filter, page).await {
            Ok((page, listing)) => {
                self.apply(filter, page, listing);
                Ok(())
            }
            Err(err) => {
                if let ApiError::Unreachable(message) = &err {
                    self.view.freshness = Freshness::Stale(message.clone());
                }
                Err(self.ctx.escalate(err))
            }
        }
    }

    fn query(&self, filter: CompletionFilter, page: u32) -> TaskQuery {
        TaskQuery {
            is_completed: filter.as_query_value(),
            page,
            page_size: self.view.page_size,
        }
    }

    /// Fetches `requested`, moving to the nearest existing page when the list
    /// shrank underneath the view.
    async fn fetch_clamped(
        &self,
        filter: CompletionFilter,
        requested: u32,
    ) -> Result<(u32, TaskPage), ApiError> {
        let mut target = requested.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.ctx.api.list_tasks(&self.query(filter, target)).await {
                Ok(listing) => {
                    let wanted = clamp_page(
                        requested,
                        total_pages(listing.count, self.view.page_size),
                    );
                    if wanted == target || attempts >= MAX_PAGE_ATTEMPTS {
                        return Ok((target, listing));
                    }
                    debug!(from = target, to = wanted, "page out of range; clamping");
                    target = wanted;
                }
                Err(ApiError::NotFound) if target > 1 && attempts < MAX_PAGE_ATTEMPTS => {
                    debug!(page = target, "page no longer exists; re-reading first page");
                    target = 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn apply(&mut self, filter: CompletionFilter, page: u32, listing: TaskPage) {
        self.view.filter = filter;
        self.view.total_count = listing.count;
        self.view.total_pages = total_pages(listing.count, self.view.page_size);
        self.view.page = clamp_page(page, self.view.total_pages);
        self.view.items = listing.results;
        self.view.freshness = Freshness::Fresh;
        self.view.loaded = true;
    }
}
