//! Link Audit - link health auditing service
//!
//! A namespaced TTL cache, a rate-limited batch validator, event-driven cache
//! invalidation and a priority job scheduler, wired together by [`AppContext`].

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod invalidation;
pub mod models;
pub mod ports;
pub mod probe;
pub mod scheduler;
pub mod tasks;
pub mod validator;

pub use config::Config;
pub use context::{AppContext, Collaborators};
pub use error::{AuditError, Result};
pub use tasks::spawn_maintenance_driver;
