//! Passive API-discovery engine.
//!
//! Given only a base URL, [`orchestrator::Orchestrator`] drives a fixed
//! sequence of discovery strategies — specification scan, wordlist probing,
//! pattern expansion, method probing, schema extraction, and response-driven
//! link following — over a rate-limited [`http::HttpWorker`], recording
//! everything it learns into a durable [`store::Store`].

pub mod budget;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod http;
pub mod link_follower;
pub mod method_prober;
pub mod orchestrator;
pub mod pattern_prober;
pub mod robots;
pub mod schema;
pub mod service_name;
pub mod spec_scanner;
pub mod store;
pub mod wordlist_prober;

pub use error::{Error, Result};
