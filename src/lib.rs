//! Card Intel: a trading-card release intelligence pipeline.
//!
//! Fetches a tiered registry of release sources, extracts set and product
//! candidates (deterministically where page shapes are known, via an LLM
//! elsewhere), reconciles them across sources by trust, and persists
//! canonical releases with field-level change history. A small admin HTTP
//! surface triggers and observes runs; a fixed-hour scheduler keeps the data
//! fresh.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
