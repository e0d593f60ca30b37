//! HTTP REST API
//!
//! - `common`: error body and validated JSON extractor
//! - `modules`: handlers per resource plus request-id and metrics middleware
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod modules;
pub mod router;

pub use router::{create_api_router, health_state, ApiDoc};
