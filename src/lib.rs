pub mod dashboard;
pub mod logging;
pub mod settings;
pub mod store;
pub mod toast_log;
