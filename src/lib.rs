//! gatehouse - a local LLM gateway
//!
//! This library fronts exactly one active local inference backend process at a
//! time (a CPU/GPU engine or an NPU engine) behind an OpenAI-compatible HTTP
//! API, and owns the model catalog, the content-addressed artifact cache, and
//! the process supervision needed to bring a backend up and down safely.

pub mod adapter;
pub mod api;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod streaming;
pub mod supervisor;
pub mod telemetry;
