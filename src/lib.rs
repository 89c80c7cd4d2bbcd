//! Lead Research Pipeline Library
//!
//! Discovers prospective B2B leads from several data sources, merges duplicates into
//! canonical records, verifies email deliverability, enriches company context, scores
//! every lead against an ideal customer profile and returns a ranked list.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `circuit_breaker`: Circuit breaker for gateway calls.
//! - `config`: Configuration management and pipeline tunables.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres lead store.
//! - `dedup`: Deduplication and merge engine.
//! - `errors`: Error handling types.
//! - `fixtures`: Deterministic capability implementations.
//! - `gateway_client`: JSON-over-HTTP capability implementations.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `normalize`: Field normalization and string similarity.
//! - `pipeline`: Research coordinator.
//! - `providers`: Capability traits for external collaborators.
//! - `quality`: Data quality assessment.
//! - `rate_limiter`: Shared call limiter.
//! - `scoring`: Lead scoring and prioritization.
//! - `verification`: Email verification aggregator.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and other binaries
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod dedup;
pub mod errors;
pub mod fixtures;
pub mod gateway_client;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod quality;
pub mod rate_limiter;
pub mod scoring;
pub mod verification;
