use tracing::{debug, info};

use super::{CATEGORY_NAME_MAX, CATEGORY_NAME_MIN, check_length};
use crate::api::{ApiError, FieldErrors};
use crate::screen::{ScreenContext, ScreenError};
use crate::types::{Category, CategoryDraft, CategoryId};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CategoryListState {
    NotLoaded,
    Loaded(Vec<Category>),
    /// The last listing failed; the previous rows, if any, are kept.
    Stale(Vec<Category>, String),
}

impl CategoryListState {
    pub fn categories(&self) -> &[Category] {
        match self {
            CategoryListState::NotLoaded => &[],
            CategoryListState::Loaded(rows) | CategoryListState::Stale(rows, _) => rows,
        }
    }
}

/// The category management screen: the list plus one name buffer used for
/// both creating and renaming.
pub struct CategoryManager {
    ctx: ScreenContext,
    list: CategoryListState,
    editing: Option<CategoryId>,
    name: String,
    errors: FieldErrors,
}

impl CategoryManager {
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            list: CategoryListState::NotLoaded,
            editing: None,
            name: String::new(),
            errors: FieldErrors::new(),
        }
    }

    pub fn list(&self) -> &CategoryListState {
        &self.list
    }

    pub fn categories(&self) -> &[Category] {
        self.list.categories()
    }

    pub fn editing(&self) -> Option<CategoryId> {
        self.editing
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub async fn load(&mut self) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.ctx.api.list_categories().await {
            Ok(rows) => {
                debug!(count = rows.len(), "categories loaded");
                self.list = CategoryListState::Loaded(rows);
                Ok(())
            }
            Err(err) => {
                let previous = self.list.categories().to_vec();
                let err = self.ctx.escalate(err);
                if !matches!(err, ScreenError::SessionRequired) {
                    self.list = CategoryListState::Stale(previous, err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Puts an existing category's name into the buffer for renaming.
    pub fn begin_edit(&mut self, id: CategoryId) -> Result<(), ScreenError> {
        let category = self
            .categories()
            .iter()
            .find(|category| category.id == id)
            .cloned()
            .ok_or(ScreenError::UnknownCategory(id))?;

        self.editing = Some(category.id);
        self.name = category.name;
        self.errors.clear();
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
        self.name.clear();
        self.errors.clear();
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_length(
            &mut errors,
            "name",
            "Name",
            self.name.trim(),
            CATEGORY_NAME_MIN,
            CATEGORY_NAME_MAX,
        );
        errors
    }

    /// Creates a category, or renames the one being edited, then re-lists.
    pub async fn submit(&mut self) -> Result<Category, ScreenError> {
        let errors = self.validate();
        if !errors.is_empty() {
            self.errors = errors.clone();
            return Err(ScreenError::Invalid(errors));
        }
        self.errors.clear();

        self.ctx.ensure_authenticated()?;

        let draft = CategoryDraft {
            name: self.name.trim().to_string(),
        };
        let result = match self.editing {
            Some(id) => self.ctx.api.update_category(id, &draft).await,
            None => self.ctx.api.create_category(&draft).await,
        };

        let saved = match result {
            Ok(saved) => saved,
            Err(ApiError::ValidationFailed(server_errors)) => {
                self.errors.merge(server_errors);
                return Err(ScreenError::Invalid(self.errors.clone()));
            }
            Err(err) => return Err(self.ctx.escalate(err)),
        };

        info!(category_id = saved.id, name = %saved.name, "category saved");
        self.cancel_edit();
        self.relist().await?;
        Ok(saved)
    }

    pub async fn delete(&mut self, id: CategoryId) -> Result<(), ScreenError> {
        self.ctx.ensure_authenticated()?;

        match self.ctx.api.delete_category(id).await {
            Ok(()) => info!(category_id = id, "category deleted"),
            Err(ApiError::NotFound) => debug!(category_id = id, "category was already deleted"),
            Err(err) => return Err(self.ctx.escalate(err)),
        }

        if self.editing == Some(id) {
            self.cancel_edit();
        }
        self.relist().await
    }

    /// Re-lists after a write that already succeeded. A failed listing leaves
    /// the rows stale with a notice; only a lost session is an error.
    async fn relist(&mut self) -> Result<(), ScreenError> {
        match self.load().await {
            Err(ScreenError::SessionRequired) => Err(ScreenError::SessionRequired),
            Err(err) => {
                debug!(error = %err, "category list left stale after write");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}
