//! Priority-fee-aware transaction submission pipeline.
//!
//! The crate wires together a health-checked endpoint connection pool, a
//! bounded result cache, an off-thread signing worker pool, and a clamped
//! linear fee estimator behind a single [`pipeline::SubmissionPipeline`]
//! that drives one submission end to end: acquire connection, aggregate
//! input data, sign, price, send.
//!
//! Transaction payloads are opaque bytes; their wire format and the source
//! of the congestion signal belong to upstream collaborators and enter the
//! pipeline through the [`connection::Transport`] and
//! [`pipeline::CongestionSource`] seams.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod connection;
pub mod endpoints;
pub mod error;
pub mod fee;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod signing;
pub mod types;

pub use error::PipelineError;
pub use pipeline::{SubmissionPipeline, SubmissionReport, SubmissionRequest};
pub use types::{SignedTransaction, Transaction};
