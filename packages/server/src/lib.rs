//! Agent task engine core.
//!
//! The durable task lifecycle, the two long-running pipelines it drives
//! (a browser-backed job-board scraper and a batched resume-to-job matcher),
//! and the composite job-agent pipeline that chains them, exposed over a
//! small REST surface.
//!
//! Layering follows the kernel/domains split:
//! - [`kernel`] - infrastructure seams (page fetching, resume scoring) with
//!   no business logic
//! - [`domains`] - task and resume models, the store gateway, the pipelines,
//!   and the task engine
//! - [`server`] - axum wiring, middleware, routes

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
