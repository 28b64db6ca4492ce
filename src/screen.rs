//! Plumbing shared by the controllers: the injected collaborators and the
//! single place where service failures are translated for a screen.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::api::{ApiError, ApiGateway, FieldErrors};
use crate::notice::{ErrorReporter, Notice};
use crate::router::Route;
use crate::session::SessionStore;
use crate::types::{CategoryId, TaskId};

pub type SharedGateway = Arc<dyn ApiGateway>;
pub type SharedReporter = Arc<dyn ErrorReporter>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScreenError {
    #[error("sign in required")]
    SessionRequired,
    #[error(transparent)]
    Api(ApiError),
    #[error("invalid input: {0}")]
    Invalid(FieldErrors),
    #[error("task {0} is not in the current view")]
    UnknownTask(TaskId),
    #[error("category {0} is not in the current list")]
    UnknownCategory(CategoryId),
    #[error("the record could not be loaded, so it cannot be submitted")]
    SubmissionDisabled,
}

impl ScreenError {
    /// Where the presentation layer must go instead of staying on the screen.
    pub fn redirect(&self) -> Option<Route> {
        match self {
            ScreenError::SessionRequired => Some(Route::Login),
            _ => None,
        }
    }
}

/// Collaborators injected into every controller of one session.
#[derive(Clone)]
pub struct ScreenContext {
    pub api: SharedGateway,
    pub session: SessionStore,
    pub reporter: SharedReporter,
}

impl ScreenContext {
    pub fn new(api: SharedGateway, session: SessionStore, reporter: SharedReporter) -> Self {
        Self {
            api,
            session,
            reporter,
        }
    }

    /// Refuses protected work before any request is issued.
    pub fn ensure_authenticated(&self) -> Result<(), ScreenError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            debug!("refusing protected operation without a session");
            Err(ScreenError::SessionRequired)
        }
    }

    pub fn report(&self, notice: Notice) {
        self.reporter.report(notice);
    }

    /// Default handling for a failure that the calling operation does not
    /// resolve itself.
    pub fn escalate(&self, err: ApiError) -> ScreenError {
        match err {
            ApiError::Unauthorized => {
                self.session.expire();
                ScreenError::SessionRequired
            }
            ApiError::Unreachable(ref message) => {
                self.report(Notice::transient(format!(
                    "could not reach the service ({message}); try again"
                )));
                ScreenError::Api(err)
            }
            ApiError::NotFound => {
                self.report(Notice::fatal("the requested record no longer exists"));
                ScreenError::Api(err)
            }
            ApiError::ValidationFailed(ref errors) => {
                self.report(Notice::transient(format!("request rejected: {errors}")));
                ScreenError::Api(err)
            }
        }
    }
}
