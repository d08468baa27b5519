//! Resume read model.
//!
//! Resumes are an input to the matching pipelines; CRUD lives elsewhere.

mod models;

pub use models::Resume;
