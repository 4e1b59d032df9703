//! Autoapply: unattended, policy-gated job application runs.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod evidence;
pub mod jobboard;
pub mod llm;
pub mod model;
pub mod safety;
pub mod scoring;
pub mod store;
pub mod workflow;
