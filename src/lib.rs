pub mod api;
pub mod cli;
pub mod collection;
pub mod detail;
pub mod form;
pub mod logging;
pub mod notice;
pub mod router;
pub mod screen;
pub mod session;
pub mod settings;
pub mod types;
