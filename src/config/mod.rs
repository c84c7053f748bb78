//! Configuration loading, merging, and dot-path mutation.

pub mod manager;
pub mod models;

pub use manager::ConfigManager;
pub use models::{AuthConfig, AuthType, ProbeConfig, Strategy};
