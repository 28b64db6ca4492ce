use super::check_length;
use crate::api::{ApiGateway, FieldErrors};
use crate::router::Route;
use crate::session::{AuthError, SessionStore};

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 100;

fn check_credentials(errors: &mut FieldErrors, username: &str, password: &str) {
    check_length(
        errors,
        "username",
        "Username",
        username.trim(),
        USERNAME_MIN,
        USERNAME_MAX,
    );
    check_length(
        errors,
        "password",
        "Password",
        password,
        PASSWORD_MIN,
        PASSWORD_MAX,
    );
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    message: Option<String>,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            message: None,
        }
    }

    /// The last failure, ready to show above the form.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_credentials(&mut errors, &self.username, &self.password);
        errors
    }

    /// Signs in and returns the default route. On failure the caller stays on
    /// the login route and [`LoginForm::message`] explains why.
    pub async fn submit(
        &mut self,
        session: &SessionStore,
        api: &dyn ApiGateway,
    ) -> Result<Route, AuthError> {
        let errors = self.validate();
        if !errors.is_empty() {
            self.message = Some(errors.to_string());
            return Err(AuthError::Invalid(errors));
        }

        match session.login(api, self.username.trim(), &self.password).await {
            Ok(_) => {
                self.message = None;
                self.password.clear();
                Ok(Route::DEFAULT)
            }
            Err(err) => {
                self.message = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    message: Option<String>,
}

impl RegisterForm {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
            message: None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_credentials(&mut errors, &self.username, &self.password);
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match.");
        }
        errors
    }

    pub async fn submit(
        &mut self,
        session: &SessionStore,
        api: &dyn ApiGateway,
    ) -> Result<Route, AuthError> {
        let errors = self.validate();
        if !errors.is_empty() {
            self.message = Some(errors.to_string());
            return Err(AuthError::Invalid(errors));
        }

        match session
            .register(api, self.username.trim(), &self.password)
            .await
        {
            Ok(_) => {
                self.message = None;
                self.password.clear();
                self.confirm_password.clear();
                Ok(Route::DEFAULT)
            }
            Err(err) => {
                self.message = Some(err.to_string());
                Err(err)
            }
        }
    }
}
