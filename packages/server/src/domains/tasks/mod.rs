//! Agent task domain: the durable task lifecycle and its pipelines.
//!
//! # Architecture
//!
//! ```text
//! Client request
//!     │
//!     └─► routes ──► TaskEngine.execute()
//!                        │
//!                        ├─► TaskStore.create_task (pending)
//!                        └─► spawned worker
//!                                ├─► per-user slot wait
//!                                ├─► pending -> running (started_at)
//!                                ├─► pipeline (scraper / matcher / job agent)
//!                                │       └─► TaskStore writes (found jobs, scores)
//!                                └─► terminal transition + execution_result
//! ```
//!
//! Pipelines poll a `CancellationToken` between suspension points; the
//! engine enforces per-type wall-clock budgets and a per-user cap on
//! concurrently running tasks.

pub mod agent;
pub mod engine;
pub mod error;
pub mod instructions;
pub mod matcher;
pub mod models;
pub mod routes;
pub mod schemas;
pub mod scraper;
pub mod store;

pub use engine::{EngineConfig, TaskEngine};
pub use error::WorkerError;
pub use models::{AgentFoundJob, AgentTask, TaskStatus, TaskType};
