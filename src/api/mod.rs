//! API Module
//!
//! HTTP trigger and status surface.
//!
//! # Endpoints
//! - `GET /health` - Health check
//! - `GET /cache/stats` - Cache statistics
//! - `POST /jobs`, `GET /jobs` - Schedule a job, queue status
//! - `GET /jobs/:id`, `DELETE /jobs/:id` - Job lookup and cancellation
//! - `POST /invalidation/events` - Submit an invalidation event
//! - `GET /invalidation/stats?days=N` - Invalidation statistics
//! - `GET /invalidation/rules`, `POST /invalidation/rules` - Rule management
//! - `POST /validate` - Validate links on demand
//! - `GET /validator/stats` - Validation statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
