//! Single-record editing: tasks, categories, and the credential forms.

pub mod category;
pub mod credentials;
pub mod task;

use crate::api::FieldErrors;

pub use category::{CategoryListState, CategoryManager};
pub use credentials::{LoginForm, RegisterForm};
pub use task::{CategoryOptions, FormMode, FormStatus, TaskFormBuffer, TaskFormController};

pub const TITLE_MIN: usize = 2;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;
pub const CATEGORY_NAME_MIN: usize = 2;
pub const CATEGORY_NAME_MAX: usize = 100;

/// Records a message on `field` when `value` falls outside `min..=max`
/// characters. An empty value with `min > 0` is reported as missing.
pub(crate) fn check_length(
    errors: &mut FieldErrors,
    field: &str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let length = value.chars().count();
    if length == 0 && min > 0 {
        errors.add(field, format!("{label} is required."));
    } else if length < min {
        errors.add(field, format!("{label} must be at least {min} characters."));
    } else if length > max {
        errors.add(field, format!("{label} must be at most {max} characters."));
    }
}
