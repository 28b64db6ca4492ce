//! Entry points exposed to the presentation layer and the guard that keeps
//! protected ones behind a login.

use std::fmt;

use crate::session::SessionState;
use crate::types::TaskId;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Route {
    Login,
    Register,
    TaskList,
    TaskCreate,
    TaskEdit(TaskId),
    TaskDetail(TaskId),
    Categories,
}

impl Route {
    pub const DEFAULT: Route = Route::TaskList;

    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }

    pub fn path(self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::TaskList => "/tasks".to_string(),
            Route::TaskCreate => "/tasks/create".to_string(),
            Route::TaskEdit(id) => format!("/tasks/edit/{id}"),
            Route::TaskDetail(id) => format!("/tasks/{id}"),
            Route::Categories => "/tasks/category/create".to_string(),
        }
    }

    /// Resolves a path; anything unrecognised maps to the default entry point.
    pub fn parse(path: &str) -> Route {
        let trimmed = path.split(['?', '#']).next().unwrap_or_default();
        let segments = trimmed
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();

        match segments.as_slice() {
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            [] | ["tasks"] => Route::TaskList,
            ["tasks", "create"] => Route::TaskCreate,
            ["tasks", "category", "create"] => Route::Categories,
            ["tasks", "edit", id] => parse_id(id).map_or(Route::DEFAULT, Route::TaskEdit),
            ["tasks", id] => parse_id(id).map_or(Route::DEFAULT, Route::TaskDetail),
            _ => Route::DEFAULT,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn parse_id(raw: &str) -> Option<TaskId> {
    raw.parse::<TaskId>().ok().filter(|id| *id > 0)
}

/// The route that should actually render for `requested` given `session`.
pub fn guard(requested: Route, session: &SessionState) -> Route {
    if requested.is_protected() && !session.is_authenticated() {
        Route::Login
    } else {
        requested
    }
}

/// Parses and guards in one step.
pub fn resolve(path: &str, session: &SessionState) -> Route {
    guard(Route::parse(path), session)
}
