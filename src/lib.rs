pub mod config;
pub mod notifications;
pub mod scheduler;
pub mod settings;
pub mod shell;
pub mod store;
pub mod weather;
